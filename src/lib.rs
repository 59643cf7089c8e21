//! Card platform core: real-time authorization and event processing
//!
//! This crate implements the two latency-sensitive subsystems of a
//! card-issuing platform:
//!
//! - **JIT funding authorization** ([`engine`]): the synchronous
//!   approve/decline decision made while a cardholder waits at the
//!   terminal. Checks run cheapest-first (user, card, balance, spending
//!   limits, merchant rules) and infrastructure failures decline
//!   fail-closed rather than approving unverified spend.
//! - **Event processing** ([`events`]): a priority queue with retry,
//!   backoff, and dead-lettering in front of a fan-out bus whose handlers
//!   run isolated from one another, feeding an append-only audit trail.
//!
//! The [`budget`] module derives budget usage from the transaction log on
//! read and fires threshold alerts through the bus. Storage sits behind the
//! traits in [`store`], with concurrent in-memory implementations shipped
//! for each.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rust_decimal::Decimal;
//! use jit_funding_engine::engine::AuthorizationEngine;
//! use jit_funding_engine::store::{
//!     AccountStore, CardStore, InMemoryAccountStore, InMemoryCardStore,
//!     InMemoryTransactionStore, SpendingCache,
//! };
//! use jit_funding_engine::types::{AuthorizationRequest, Card, UserAccount};
//!
//! let accounts = Arc::new(InMemoryAccountStore::new());
//! let cards = Arc::new(InMemoryCardStore::new());
//! accounts
//!     .put(UserAccount::with_balance("user_1", Decimal::new(100000, 2)))
//!     .unwrap();
//! cards.put(Card::new("card_1", "user_1")).unwrap();
//!
//! let engine = AuthorizationEngine::new(
//!     accounts,
//!     cards,
//!     Arc::new(InMemoryTransactionStore::new()),
//!     Arc::new(SpendingCache::new()),
//! );
//!
//! let decision = engine.authorize(&AuthorizationRequest {
//!     user_id: "user_1".into(),
//!     card_id: "card_1".into(),
//!     amount: Decimal::new(2500, 2),
//!     merchant: "Costco".into(),
//!     merchant_category: None,
//! });
//! assert!(decision.approved);
//! ```

pub mod budget;
pub mod engine;
pub mod events;
pub mod store;
pub mod types;

pub use budget::{BudgetAlert, BudgetMonitor, BudgetNotifier, EventBusNotifier};
pub use engine::AuthorizationEngine;
pub use events::{
    BatchReport, CardEventHandler, EventBus, EventHandler, EventQueue, HandlerOutcome,
    QueueConfig, QueueItem, QueueItemStatus, SettlementHandler, SubscriptionId,
    TransactionEventHandler,
};
pub use store::{
    AccountStore, AuditFilters, AuditLogEntry, AuditLogStore, BudgetStore, CardStore,
    InMemoryAccountStore, InMemoryAuditLog, InMemoryBudgetStore, InMemoryCardStore,
    InMemoryTransactionStore, SpendingCache, SpendingTotals, TransactionStore,
};
pub use types::{
    ActorContext, AuthorizationRequest, Budget, BudgetDraft, BudgetPeriod, BudgetScope,
    BudgetUsage, Card, CardStatus, Decision, DecisionReason, MerchantRules, PlatformError,
    PlatformEvent, SpendingLimits, StageTimings, Transaction, TransactionStatus,
    TransactionWebhook, UserAccount,
};
