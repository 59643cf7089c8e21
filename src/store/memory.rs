//! Concurrent in-memory store implementations
//!
//! All stores are built on `DashMap` for fine-grained per-key locking, so
//! authorizations for different cards never contend. Each store is cheap to
//! share behind an `Arc` and safe to call from any thread.
//!
//! Spend counters live here rather than being recomputed from the
//! transaction log: the authorization hot path reads two numbers instead of
//! scanning history. The counters are advanced only by [`apply_settlement`],
//! which dedupes on transaction id so webhook redelivery cannot double-count.
//!
//! [`apply_settlement`]: crate::store::TransactionStore::apply_settlement

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use crate::types::{Budget, Card, CardStatus, PlatformError, Transaction, UserAccount};

use super::traits::{AccountStore, BudgetStore, CardStore, SpendingTotals, TransactionStore};

/// In-memory account storage
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<String, UserAccount>,
}

impl InMemoryAccountStore {
    /// Create an empty account store
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn get(&self, user_id: &str) -> Result<Option<UserAccount>, PlatformError> {
        Ok(self.accounts.get(user_id).map(|entry| entry.clone()))
    }

    fn put(&self, account: UserAccount) -> Result<(), PlatformError> {
        self.accounts.insert(account.user_id.clone(), account);
        Ok(())
    }

    fn debit(&self, user_id: &str, amount: Decimal) -> Result<(), PlatformError> {
        let mut entry = self
            .accounts
            .get_mut(user_id)
            .ok_or_else(|| PlatformError::account_not_found(user_id, "debit"))?;
        entry.balance = entry
            .balance
            .checked_sub(amount)
            .ok_or_else(|| PlatformError::arithmetic_underflow("debit", user_id))?;
        Ok(())
    }
}

/// In-memory card storage
#[derive(Debug, Default)]
pub struct InMemoryCardStore {
    cards: DashMap<String, Card>,
}

impl InMemoryCardStore {
    /// Create an empty card store
    pub fn new() -> Self {
        Self::default()
    }
}

impl CardStore for InMemoryCardStore {
    fn get(&self, card_id: &str) -> Result<Option<Card>, PlatformError> {
        Ok(self.cards.get(card_id).map(|entry| entry.clone()))
    }

    fn put(&self, card: Card) -> Result<(), PlatformError> {
        self.cards.insert(card.card_id.clone(), card);
        Ok(())
    }

    fn set_status(&self, card_id: &str, status: CardStatus) -> Result<Card, PlatformError> {
        let mut entry = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| PlatformError::card_not_found(card_id, "set_status"))?;
        if !entry.status.can_transition_to(status) {
            return Err(PlatformError::invalid_card_transition(
                card_id,
                entry.status.as_str(),
                status.as_str(),
            ));
        }
        entry.status = status;
        Ok(entry.clone())
    }
}

/// Per-card settled spend counters with their window keys
///
/// Windows roll lazily: a counter whose stored day or month no longer
/// matches `now` reads as zero until the next settlement resets it.
#[derive(Debug, Clone, Copy)]
struct SpendingCounters {
    day: NaiveDate,
    daily: Decimal,
    month: (i32, u32),
    monthly: Decimal,
}

impl SpendingCounters {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            daily: Decimal::ZERO,
            month: (now.year(), now.month()),
            monthly: Decimal::ZERO,
        }
    }

    fn totals(&self, now: DateTime<Utc>) -> SpendingTotals {
        SpendingTotals {
            daily: if self.day == now.date_naive() {
                self.daily
            } else {
                Decimal::ZERO
            },
            monthly: if self.month == (now.year(), now.month()) {
                self.monthly
            } else {
                Decimal::ZERO
            },
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if self.day != now.date_naive() {
            self.day = now.date_naive();
            self.daily = Decimal::ZERO;
        }
        if self.month != (now.year(), now.month()) {
            self.month = (now.year(), now.month());
            self.monthly = Decimal::ZERO;
        }
    }
}

/// In-memory transaction storage with settled spend counters
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    transactions: DashMap<String, Transaction>,
    counters: DashMap<String, SpendingCounters>,
    settlements: DashMap<String, ()>,
}

impl InMemoryTransactionStore {
    /// Create an empty transaction store
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn get(&self, id: &str) -> Result<Option<Transaction>, PlatformError> {
        Ok(self.transactions.get(id).map(|entry| entry.clone()))
    }

    fn insert(&self, transaction: Transaction) -> Result<(), PlatformError> {
        let id = transaction.id.clone();
        if let Some(previous) = self.transactions.insert(id.clone(), transaction) {
            // Restore the original record before reporting the duplicate
            self.transactions.insert(id.clone(), previous);
            return Err(PlatformError::duplicate_transaction(&id));
        }
        Ok(())
    }

    fn upsert(&self, transaction: Transaction) -> Result<Option<Transaction>, PlatformError> {
        Ok(self.transactions.insert(transaction.id.clone(), transaction))
    }

    fn spending_totals(
        &self,
        card_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SpendingTotals, PlatformError> {
        Ok(self
            .counters
            .get(card_id)
            .map(|entry| entry.totals(now))
            .unwrap_or_default())
    }

    fn apply_settlement(
        &self,
        transaction_id: &str,
        card_id: &str,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool, PlatformError> {
        // Claim the transaction id before touching the counters. Whichever
        // of two concurrent deliveries wins the insert does the counting.
        if self
            .settlements
            .insert(transaction_id.to_string(), ())
            .is_some()
        {
            return Ok(false);
        }

        let result = {
            let mut entry = self
                .counters
                .entry(card_id.to_string())
                .or_insert_with(|| SpendingCounters::new(now));
            entry.roll(now);
            let daily = entry.daily.checked_add(amount);
            let monthly = entry.monthly.checked_add(amount);
            match (daily, monthly) {
                (Some(daily), Some(monthly)) => {
                    entry.daily = daily;
                    entry.monthly = monthly;
                    Ok(true)
                }
                _ => Err(PlatformError::arithmetic_overflow("settlement", card_id)),
            }
        };

        if result.is_err() {
            // Release the claim so a corrected redelivery can still settle
            self.settlements.remove(transaction_id);
        }
        result
    }

    fn approved_in_window(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Transaction>, PlatformError> {
        Ok(self
            .transactions
            .iter()
            .filter(|entry| {
                let tx = entry.value();
                tx.status.is_approved()
                    && tx.created_at >= start
                    && end.map(|end| tx.created_at < end).unwrap_or(true)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// In-memory budget storage
#[derive(Debug, Default)]
pub struct InMemoryBudgetStore {
    budgets: DashMap<String, Budget>,
}

impl InMemoryBudgetStore {
    /// Create an empty budget store
    pub fn new() -> Self {
        Self::default()
    }
}

impl BudgetStore for InMemoryBudgetStore {
    fn get(&self, id: &str) -> Result<Option<Budget>, PlatformError> {
        Ok(self.budgets.get(id).map(|entry| entry.clone()))
    }

    fn put(&self, budget: Budget) -> Result<(), PlatformError> {
        self.budgets.insert(budget.id.clone(), budget);
        Ok(())
    }

    fn list_for_company(&self, company_id: &str) -> Result<Vec<Budget>, PlatformError> {
        Ok(self
            .budgets
            .iter()
            .filter(|entry| entry.value().company_id == company_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn record_alert(
        &self,
        budget_id: &str,
        threshold: u8,
        at: DateTime<Utc>,
    ) -> Result<(), PlatformError> {
        let mut entry = self.budgets.get_mut(budget_id).ok_or_else(|| {
            PlatformError::store_unavailable(
                "budgets",
                format!("budget {budget_id} missing during alert record"),
            )
        })?;
        entry.alert_history.insert(threshold, at);
        Ok(())
    }
}
