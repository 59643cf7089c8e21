//! Core data types for the JIT funding engine
//!
//! This module defines the domain types shared across the authorization
//! engine, the event pipeline, and the budget monitor.

pub mod account;
pub mod budget;
pub mod card;
pub mod decision;
pub mod error;
pub mod event;
pub mod transaction;

pub use account::UserAccount;
pub use budget::{Budget, BudgetDraft, BudgetPeriod, BudgetScope, BudgetUsage};
pub use card::{Card, CardStatus, MerchantRules, SpendingLimits};
pub use decision::{Decision, DecisionReason, StageTimings};
pub use error::PlatformError;
pub use event::{ActorContext, PlatformEvent};
pub use transaction::{AuthorizationRequest, Transaction, TransactionStatus, TransactionWebhook};
