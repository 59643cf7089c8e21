//! Storage abstractions and in-memory implementations
//!
//! The engine and the budget monitor talk to storage exclusively through the
//! traits in [`traits`], so tests can substitute failing or pre-seeded
//! backends. The shipped implementations in [`memory`] are concurrent
//! in-process stores built on `DashMap`.

pub mod audit_log;
pub mod memory;
pub mod spending_cache;
pub mod traits;

pub use audit_log::{AuditFilters, AuditLogEntry, InMemoryAuditLog};
pub use memory::{
    InMemoryAccountStore, InMemoryBudgetStore, InMemoryCardStore, InMemoryTransactionStore,
};
pub use spending_cache::{CachedTotals, SpendingCache};
pub use traits::{AccountStore, AuditLogStore, BudgetStore, CardStore, SpendingTotals, TransactionStore};
