//! Store traits for accounts, cards, transactions, budgets, and audit logs
//!
//! These traits are the seams between business logic and storage. They are
//! object-safe so the engine can hold `Arc<dyn Store>` and tests can inject
//! failing backends to exercise fail-closed behavior.
//!
//! Every method returns `Result`: an `Err` means the store itself failed,
//! never a business outcome. "Not found" is `Ok(None)`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{Budget, Card, CardStatus, PlatformError, Transaction, UserAccount};

use super::audit_log::{AuditFilters, AuditLogEntry};

/// Settled spend totals for a card within the current limit windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpendingTotals {
    /// Spend settled since the start of the current UTC day
    pub daily: Decimal,

    /// Spend settled since the start of the current UTC month
    pub monthly: Decimal,
}

/// Storage for user accounts and balances
pub trait AccountStore: Send + Sync {
    /// Look up an account by user id
    fn get(&self, user_id: &str) -> Result<Option<UserAccount>, PlatformError>;

    /// Insert or replace an account
    fn put(&self, account: UserAccount) -> Result<(), PlatformError>;

    /// Debit `amount` from the account's balance
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::AccountNotFound`] when no account exists and
    /// [`PlatformError::ArithmeticUnderflow`] when the subtraction would
    /// underflow. The balance is allowed to go negative: settlement is a
    /// record of money already moved, not a check.
    fn debit(&self, user_id: &str, amount: Decimal) -> Result<(), PlatformError>;
}

/// Storage for issued cards
pub trait CardStore: Send + Sync {
    /// Look up a card by card id
    fn get(&self, card_id: &str) -> Result<Option<Card>, PlatformError>;

    /// Insert or replace a card
    fn put(&self, card: Card) -> Result<(), PlatformError>;

    /// Transition a card's lifecycle status, enforcing the state machine
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::CardNotFound`] for an unknown card and
    /// [`PlatformError::InvalidCardTransition`] when the move is not allowed
    /// (terminated is terminal, self-transitions are rejected).
    fn set_status(&self, card_id: &str, status: CardStatus) -> Result<Card, PlatformError>;
}

/// Storage for transactions and the per-card settled spend counters
pub trait TransactionStore: Send + Sync {
    /// Look up a transaction by id
    fn get(&self, id: &str) -> Result<Option<Transaction>, PlatformError>;

    /// Insert a new transaction
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::DuplicateTransaction`] when a transaction
    /// with this id already exists.
    fn insert(&self, transaction: Transaction) -> Result<(), PlatformError>;

    /// Insert or replace a transaction, returning the previous record
    fn upsert(&self, transaction: Transaction) -> Result<Option<Transaction>, PlatformError>;

    /// Settled daily/monthly totals for a card, with windows rolled to `now`
    fn spending_totals(&self, card_id: &str, now: DateTime<Utc>)
        -> Result<SpendingTotals, PlatformError>;

    /// Add a settled amount to a card's counters, keyed by transaction id
    ///
    /// Idempotent: the first call for a given transaction id applies the
    /// amount and returns `Ok(true)`; every later call is a no-op returning
    /// `Ok(false)`. Webhook redelivery must never double-count.
    fn apply_settlement(
        &self,
        transaction_id: &str,
        card_id: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool, PlatformError>;

    /// Approved transactions created inside `[start, end)`
    ///
    /// `end` of `None` means no upper bound. Used by the budget monitor to
    /// derive usage on read.
    fn approved_in_window(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, PlatformError>;
}

/// Storage for budgets and their alert history
pub trait BudgetStore: Send + Sync {
    /// Look up a budget by id
    fn get(&self, id: &str) -> Result<Option<Budget>, PlatformError>;

    /// Insert or replace a budget
    fn put(&self, budget: Budget) -> Result<(), PlatformError>;

    /// All budgets owned by a company
    fn list_for_company(&self, company_id: &str) -> Result<Vec<Budget>, PlatformError>;

    /// Record that an alert fired for a threshold rung
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::StoreUnavailable`] wrapping an unknown
    /// budget id; callers hold the budget they just read, so this indicates
    /// concurrent deletion.
    fn record_alert(
        &self,
        budget_id: &str,
        threshold: u8,
        at: DateTime<Utc>,
    ) -> Result<(), PlatformError>;
}

/// Append-only audit trail of processed events
pub trait AuditLogStore: Send + Sync {
    /// Append one entry
    fn append(&self, entry: AuditLogEntry) -> Result<(), PlatformError>;

    /// Newest-first history, capped at 100 entries, AND-filtered
    fn event_history(&self, filters: &AuditFilters) -> Result<Vec<AuditLogEntry>, PlatformError>;
}
