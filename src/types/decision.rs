//! Authorization decision types
//!
//! The decision is the synchronous answer returned to the card network.
//! Decline reasons are ordinary data, never errors: the calling network
//! layer maps them to standard decline codes.

use serde::{Deserialize, Serialize};

/// Why an authorization was approved or declined
///
/// The business reasons mirror the pipeline stages. `CheckUnavailable` is
/// distinct from every business decline: it means an infrastructure failure
/// prevented a required check from completing, and the engine failed closed.
/// Operators alert on it separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// All checks passed
    Approved,

    /// No account exists for the requesting user
    UserNotFound,

    /// No such card, or the card belongs to a different user
    CardNotFound,

    /// Card status is anything other than active
    CardInactive,

    /// The amount exceeds the available account balance
    InsufficientFunds,

    /// The amount would push daily or monthly spend over the card's limits
    SpendingLimitExceeded,

    /// The merchant is blocked by the card's merchant rules
    MerchantRestricted,

    /// A required check could not complete; declined fail-closed
    CheckUnavailable,
}

impl DecisionReason {
    /// Stable wire string for this reason
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionReason::Approved => "approved",
            DecisionReason::UserNotFound => "user_not_found",
            DecisionReason::CardNotFound => "card_not_found",
            DecisionReason::CardInactive => "card_inactive",
            DecisionReason::InsufficientFunds => "insufficient_funds",
            DecisionReason::SpendingLimitExceeded => "spending_limit_exceeded",
            DecisionReason::MerchantRestricted => "merchant_restricted",
            DecisionReason::CheckUnavailable => "check_unavailable",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage elapsed time in microseconds
///
/// Every field is populated even on early exit: a stage that was never
/// reached reports `None`, so callers can distinguish a fast fail from a
/// fast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    /// Account lookup by user id
    pub user_lookup: Option<u64>,

    /// Card lookup, ownership and status check
    pub card_lookup: Option<u64>,

    /// Available balance check
    pub balance_check: Option<u64>,

    /// Daily/monthly spending-limit check
    pub limit_check: Option<u64>,

    /// Merchant restriction check
    pub merchant_check: Option<u64>,
}

/// The authorization decision returned to the card network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the transaction is approved
    pub approved: bool,

    /// The stage outcome that produced this decision
    pub reason: DecisionReason,

    /// Total decision latency in milliseconds
    pub latency_ms: u64,

    /// Per-stage timings; unreached stages are `None`
    pub stage_timings: StageTimings,
}

impl Decision {
    /// Whether the decline was caused by infrastructure rather than business
    /// rules
    pub fn is_infrastructure_decline(&self) -> bool {
        self.reason == DecisionReason::CheckUnavailable
    }
}
