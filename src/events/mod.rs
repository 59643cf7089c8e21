//! Event pipeline: bus, priority queue, and the built-in handlers
//!
//! Events flow in two tiers. The [`bus`] is a fan-out primitive: publishing
//! invokes every subscribed handler in its own task and reports per-handler
//! outcomes, never failing the publisher. The [`queue`] sits in front of the
//! bus for work that must not be lost: items are delivered in priority
//! order, retried with exponential backoff, and dead-lettered after the
//! retry budget is spent.

pub mod bus;
pub mod handlers;
pub mod queue;

pub use bus::{EventBus, EventHandler, HandlerOutcome, SubscriptionId};
pub use handlers::{CardEventHandler, SettlementHandler, TransactionEventHandler};
pub use queue::{BatchReport, EventQueue, QueueConfig, QueueItem, QueueItemStatus};
