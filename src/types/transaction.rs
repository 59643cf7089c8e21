//! Transaction-related types for the JIT funding engine
//!
//! This module defines the canonical transaction shape, the inbound
//! authorization request, and the card-network webhook payload the engine
//! normalizes from.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::PlatformError;

/// Transaction lifecycle status
///
/// A transaction is created as `Authorized` at decision time, then moves to
/// `Cleared` or `Declined` asynchronously when the card network confirms the
/// outcome. `Authorized` and `Cleared` both count as approved spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Approved in real time, awaiting clearing confirmation
    Authorized,

    /// Confirmed by the card network; counted permanently against balances
    Cleared,

    /// Rejected, either at authorization time or during clearing
    Declined,
}

impl TransactionStatus {
    /// Whether this status counts toward spend totals and budget usage
    pub fn is_approved(self) -> bool {
        matches!(self, TransactionStatus::Authorized | TransactionStatus::Cleared)
    }
}

/// Canonical transaction record
///
/// Created at authorization time and updated asynchronously through
/// settlement. Optional `company_id`/`category`/`team`/`project` attributes
/// place the transaction inside budget scopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier (card network token)
    pub id: String,

    /// Card the transaction was made with
    pub card_id: String,

    /// Owning user
    pub user_id: String,

    /// Positive, currency-denominated amount
    pub amount: Decimal,

    /// Merchant name as reported by the network
    pub merchant: String,

    /// Lifecycle status
    pub status: TransactionStatus,

    /// Company the spend belongs to, when the card is a business card
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,

    /// Spend category (budget scope dimension)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Team attribution (budget scope dimension)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,

    /// Project attribution (budget scope dimension)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Inbound real-time authorization request
///
/// Arrives from the card network boundary at the moment of swipe/tap. The
/// wire format of that boundary is out of scope; this is the normalized
/// shape the engine decides on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// The cardholder the card should belong to
    pub user_id: String,

    /// The card being charged
    pub card_id: String,

    /// Requested amount (must be positive)
    pub amount: Decimal,

    /// Merchant name
    pub merchant: String,

    /// Merchant category code, when the network supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_category: Option<String>,
}

/// Inbound transaction webhook from the card network
///
/// Delivered at-least-once; consumers must tolerate duplicates. Normalized
/// into a [`Transaction`] by the engine before publication on the event
/// queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionWebhook {
    /// Network transaction identifier
    pub transaction_id: String,

    /// Card the transaction was made with
    pub card_id: String,

    /// Owning user
    pub user_id: String,

    /// Transaction amount
    pub amount: Decimal,

    /// Merchant name
    pub merchant: String,

    /// Reported lifecycle status
    pub status: TransactionStatus,
}

impl TransactionWebhook {
    /// Validate the webhook and normalize it into the canonical shape
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidWebhook`] when a required identifier
    /// is empty or the amount is not positive. Malformed webhooks are
    /// rejected here, before any business logic runs.
    pub fn into_transaction(self) -> Result<Transaction, PlatformError> {
        if self.transaction_id.is_empty() {
            return Err(PlatformError::invalid_webhook(
                "transaction_id",
                "must not be empty",
            ));
        }
        if self.card_id.is_empty() {
            return Err(PlatformError::invalid_webhook("card_id", "must not be empty"));
        }
        if self.user_id.is_empty() {
            return Err(PlatformError::invalid_webhook("user_id", "must not be empty"));
        }
        if self.amount <= Decimal::ZERO {
            return Err(PlatformError::invalid_webhook("amount", "must be positive"));
        }

        Ok(Transaction {
            id: self.transaction_id,
            card_id: self.card_id,
            user_id: self.user_id,
            amount: self.amount,
            merchant: self.merchant,
            status: self.status,
            company_id: None,
            category: None,
            team: None,
            project: None,
            created_at: Utc::now(),
        })
    }
}
