//! Card-related types for the JIT funding engine
//!
//! This module defines the card structure, its lifecycle status, and the
//! spending controls (limits and merchant rules) evaluated during
//! authorization.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Card lifecycle status
///
/// Only `Active` cards may authorize new spend. `Terminated` is terminal:
/// once a card is terminated no further status transition is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Card may authorize transactions
    Active,

    /// Card is frozen/suspended; authorizations decline with `card_inactive`
    Suspended,

    /// Card is permanently closed; this status is terminal
    Terminated,
}

impl CardStatus {
    /// Whether a transition from `self` to `next` is allowed
    ///
    /// Every non-terminal status may move to any other status; `Terminated`
    /// accepts no further transitions.
    pub fn can_transition_to(self, next: CardStatus) -> bool {
        match self {
            CardStatus::Terminated => false,
            CardStatus::Active | CardStatus::Suspended => self != next,
        }
    }

    /// Stable wire string for this status
    pub fn as_str(self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Suspended => "suspended",
            CardStatus::Terminated => "terminated",
        }
    }
}

/// Per-card spending limits
///
/// Absent limits mean unlimited spend along that axis. Limits are evaluated
/// against the card's running daily/monthly spend counters during the
/// spending-limit stage of authorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingLimits {
    /// Maximum approved spend per calendar day
    pub daily_limit: Option<Decimal>,

    /// Maximum approved spend per calendar month
    pub monthly_limit: Option<Decimal>,
}

/// Merchant restriction rules attached to a card
///
/// Evaluated last in the authorization pipeline. Any match declines with
/// reason `merchant_restricted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MerchantRules {
    /// Merchant names that always decline
    #[serde(default)]
    pub blocked_merchants: Vec<String>,

    /// Merchant category codes (MCC) that always decline
    #[serde(default)]
    pub blocked_categories: Vec<String>,

    /// If non-empty, only these merchant names are allowed
    #[serde(default)]
    pub allowed_merchants: Vec<String>,
}

impl MerchantRules {
    /// Whether the rules place no restriction at all
    pub fn is_empty(&self) -> bool {
        self.blocked_merchants.is_empty()
            && self.blocked_categories.is_empty()
            && self.allowed_merchants.is_empty()
    }

    /// Whether a merchant (and optional category) passes these rules
    pub fn allows(&self, merchant: &str, category: Option<&str>) -> bool {
        if self.blocked_merchants.iter().any(|m| m == merchant) {
            return false;
        }
        if let Some(category) = category {
            if self.blocked_categories.iter().any(|c| c == category) {
                return false;
            }
        }
        if !self.allowed_merchants.is_empty()
            && !self.allowed_merchants.iter().any(|m| m == merchant)
        {
            return false;
        }
        true
    }
}

/// Card state
///
/// The card is the unit the authorization pipeline evaluates: it carries
/// the owning user, the lifecycle status, and the spending controls. The
/// card's settled spend totals are cached under `card:{card_id}` and
/// invalidated whenever its counters change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    /// Opaque card identifier (card network token)
    pub card_id: String,

    /// Identifier of the owning user
    pub user_id: String,

    /// Current lifecycle status
    pub status: CardStatus,

    /// Daily/monthly spending limits
    #[serde(default)]
    pub limits: SpendingLimits,

    /// Merchant restriction rules
    #[serde(default)]
    pub merchant_rules: MerchantRules,
}

impl Card {
    /// Create a new active card with no limits or merchant rules
    pub fn new(card_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Card {
            card_id: card_id.into(),
            user_id: user_id.into(),
            status: CardStatus::Active,
            limits: SpendingLimits::default(),
            merchant_rules: MerchantRules::default(),
        }
    }
}
