//! Real-time authorization engine
//!
//! The engine answers the card network's fund/no-fund question while the
//! cardholder waits. Checks run in a fixed order, cheapest first, and the
//! first failing check short-circuits the rest:
//!
//! 1. user lookup
//! 2. card lookup, ownership and status
//! 3. balance check
//! 4. daily/monthly spending limits (read-through cache)
//! 5. merchant restrictions
//!
//! Declines are data, not errors: [`authorize`] always returns a
//! [`Decision`]. When a backing store fails mid-pipeline the engine fails
//! closed with reason `check_unavailable` rather than approving spend it
//! could not verify.
//!
//! [`authorize`]: AuthorizationEngine::authorize

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::events::EventQueue;
use crate::store::{AccountStore, CardStore, SpendingCache, TransactionStore};
use crate::types::{
    AuthorizationRequest, Card, CardStatus, Decision, DecisionReason, PlatformError,
    PlatformEvent, StageTimings, Transaction, TransactionWebhook,
};

/// Soft latency budget for one decision; slower decisions are logged
const DECISION_BUDGET_MS: u64 = 100;

/// Queue priority for inbound card-network webhooks
const WEBHOOK_PRIORITY: u8 = 1;

/// The synchronous approve/decline pipeline plus asynchronous settlement
pub struct AuthorizationEngine {
    accounts: Arc<dyn AccountStore>,
    cards: Arc<dyn CardStore>,
    transactions: Arc<dyn TransactionStore>,
    cache: Arc<SpendingCache>,
}

impl AuthorizationEngine {
    /// Create an engine over the given stores
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        cards: Arc<dyn CardStore>,
        transactions: Arc<dyn TransactionStore>,
        cache: Arc<SpendingCache>,
    ) -> Self {
        Self {
            accounts,
            cards,
            transactions,
            cache,
        }
    }

    /// Decide one authorization request
    ///
    /// Never returns an error: every outcome, including infrastructure
    /// failure, is expressed as an approve or decline with a reason and
    /// per-stage timings.
    pub fn authorize(&self, request: &AuthorizationRequest) -> Decision {
        let started = Instant::now();
        let mut timings = StageTimings::default();

        let reason = self.run_pipeline(request, &mut timings);
        let latency_ms = started.elapsed().as_millis() as u64;
        let approved = reason == DecisionReason::Approved;

        if latency_ms > DECISION_BUDGET_MS {
            warn!(
                card_id = %request.card_id,
                latency_ms,
                %reason,
                "slow authorization decision"
            );
        }
        info!(
            card_id = %request.card_id,
            user_id = %request.user_id,
            amount = %request.amount,
            approved,
            %reason,
            latency_ms,
            "authorization decided"
        );

        Decision {
            approved,
            reason,
            latency_ms,
            stage_timings: timings,
        }
    }

    fn run_pipeline(
        &self,
        request: &AuthorizationRequest,
        timings: &mut StageTimings,
    ) -> DecisionReason {
        // Stage 1: user lookup
        let stage = Instant::now();
        let account = self.accounts.get(&request.user_id);
        timings.user_lookup = Some(stage.elapsed().as_micros() as u64);
        let account = match account {
            Ok(Some(account)) => account,
            Ok(None) => return DecisionReason::UserNotFound,
            Err(error) => return self.fail_closed("user_lookup", &error),
        };

        // Stage 2: card lookup, ownership, status
        let stage = Instant::now();
        let card = self.cards.get(&request.card_id);
        timings.card_lookup = Some(stage.elapsed().as_micros() as u64);
        let card = match card {
            Ok(Some(card)) => card,
            Ok(None) => return DecisionReason::CardNotFound,
            Err(error) => return self.fail_closed("card_lookup", &error),
        };
        // A card owned by someone else reads as absent, so the response
        // does not leak whether the card id exists
        if card.user_id != request.user_id {
            return DecisionReason::CardNotFound;
        }
        if card.status != CardStatus::Active {
            return DecisionReason::CardInactive;
        }

        // Stage 3: balance
        let stage = Instant::now();
        let sufficient = request.amount <= account.balance;
        timings.balance_check = Some(stage.elapsed().as_micros() as u64);
        if !sufficient {
            return DecisionReason::InsufficientFunds;
        }

        // Stage 4: spending limits
        let stage = Instant::now();
        let within_limits = self.check_spending_limits(&card, request.amount);
        timings.limit_check = Some(stage.elapsed().as_micros() as u64);
        match within_limits {
            Ok(true) => {}
            Ok(false) => return DecisionReason::SpendingLimitExceeded,
            Err(error) => return self.fail_closed("limit_check", &error),
        }

        // Stage 5: merchant restrictions
        let stage = Instant::now();
        let allowed = self.check_merchant_restrictions(
            &card,
            &request.merchant,
            request.merchant_category.as_deref(),
        );
        timings.merchant_check = Some(stage.elapsed().as_micros() as u64);
        if !allowed {
            return DecisionReason::MerchantRestricted;
        }

        DecisionReason::Approved
    }

    fn fail_closed(&self, stage: &str, cause: &PlatformError) -> DecisionReason {
        error!(stage, %cause, "check unavailable, declining fail-closed");
        DecisionReason::CheckUnavailable
    }

    /// Whether `amount` fits under the card's daily and monthly limits
    ///
    /// Reads settled totals through the cache; a miss falls through to the
    /// transaction store and repopulates. Cards with no limits configured
    /// skip the read entirely.
    ///
    /// # Errors
    ///
    /// Propagates store failures and arithmetic overflow; the caller turns
    /// these into a fail-closed decline.
    pub fn check_spending_limits(
        &self,
        card: &Card,
        amount: Decimal,
    ) -> Result<bool, PlatformError> {
        if card.limits.daily_limit.is_none() && card.limits.monthly_limit.is_none() {
            return Ok(true);
        }

        let totals = match self.cache.get(&card.card_id) {
            Some(totals) => totals,
            None => {
                let totals = self
                    .transactions
                    .spending_totals(&card.card_id, Utc::now())?;
                self.cache.put(&card.card_id, totals);
                totals
            }
        };

        if let Some(limit) = card.limits.daily_limit {
            let projected = totals.daily.checked_add(amount).ok_or_else(|| {
                PlatformError::arithmetic_overflow("limit_check", &card.card_id)
            })?;
            if projected > limit {
                debug!(card_id = %card.card_id, %projected, %limit, "daily limit exceeded");
                return Ok(false);
            }
        }
        if let Some(limit) = card.limits.monthly_limit {
            let projected = totals.monthly.checked_add(amount).ok_or_else(|| {
                PlatformError::arithmetic_overflow("limit_check", &card.card_id)
            })?;
            if projected > limit {
                debug!(card_id = %card.card_id, %projected, %limit, "monthly limit exceeded");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether the merchant passes the card's restriction rules
    ///
    /// Same semantics as the final pipeline stage, exposed for independent
    /// use.
    pub fn check_merchant_restrictions(
        &self,
        card: &Card,
        merchant: &str,
        category: Option<&str>,
    ) -> bool {
        card.merchant_rules.allows(merchant, category)
    }

    /// Advance a card's spend counters for one confirmed transaction
    ///
    /// Idempotent per transaction id: the first call applies the amount to
    /// the card's daily/monthly counters and invalidates the card's cached
    /// totals; every later call is a no-op returning `Ok(false)`. Webhooks
    /// are delivered at least once, so this is where duplicates die.
    pub fn update_spending_counters(
        &self,
        transaction_id: &str,
        card_id: &str,
        amount: Decimal,
    ) -> Result<bool, PlatformError> {
        let applied = self
            .transactions
            .apply_settlement(transaction_id, card_id, amount, Utc::now())?;
        if applied {
            self.cache.invalidate(card_id);
        } else {
            debug!(transaction_id, "settlement already applied");
        }
        Ok(applied)
    }

    /// Record a transaction outcome and settle it against the account
    ///
    /// Stores the transaction, then for approved statuses advances the
    /// spend counters via [`update_spending_counters`] and debits the
    /// owner's balance exactly once. Declined transactions are recorded
    /// without touching counters or balance. Returns whether this call
    /// applied the settlement.
    ///
    /// [`update_spending_counters`]: AuthorizationEngine::update_spending_counters
    pub fn settle_transaction(&self, transaction: &Transaction) -> Result<bool, PlatformError> {
        self.transactions.upsert(transaction.clone())?;

        if !transaction.status.is_approved() {
            debug!(transaction_id = %transaction.id, "declined transaction recorded");
            return Ok(false);
        }

        let applied = self.update_spending_counters(
            &transaction.id,
            &transaction.card_id,
            transaction.amount,
        )?;
        if !applied {
            return Ok(false);
        }

        self.accounts
            .debit(&transaction.user_id, transaction.amount)?;
        info!(
            transaction_id = %transaction.id,
            card_id = %transaction.card_id,
            amount = %transaction.amount,
            "transaction settled"
        );
        Ok(true)
    }

    /// Validate an inbound webhook and queue it for settlement
    ///
    /// Returns the queue item id. Settlement happens asynchronously when
    /// the queue delivers the event to the settlement handler.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidWebhook`] when the payload fails
    /// validation; nothing is enqueued in that case.
    pub fn process_transaction_webhook(
        &self,
        webhook: TransactionWebhook,
        queue: &EventQueue,
    ) -> Result<String, PlatformError> {
        let transaction = webhook.into_transaction()?;
        let item_id = queue.enqueue(
            PlatformEvent::TransactionWebhook { transaction },
            WEBHOOK_PRIORITY,
        );
        Ok(item_id)
    }
}
