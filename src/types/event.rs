//! Platform event types
//!
//! Events are a closed, tagged set: one variant per event name, each with a
//! typed payload, so handlers can pattern-match exhaustively instead of
//! probing an open JSON map.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transaction::Transaction;

/// Identity of the actor behind an event, when known
///
/// Carried on transaction lifecycle events so the audit log can record who
/// acted, from where, and with what client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorContext {
    /// Acting user, when the event was user-initiated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Source IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Client user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// Every event the platform publishes
///
/// The serialized form is tagged with the dotted event name, matching the
/// names handlers subscribe under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum PlatformEvent {
    /// A card was issued
    #[serde(rename = "card.created")]
    CardCreated {
        /// The new card
        card_id: String,
        /// Owning user
        user_id: String,
    },

    /// A card became active and may authorize spend
    #[serde(rename = "card.activated")]
    CardActivated {
        /// The activated card
        card_id: String,
        /// Owning user
        user_id: String,
    },

    /// A card was suspended
    #[serde(rename = "card.frozen")]
    CardFrozen {
        /// The frozen card
        card_id: String,
        /// Owning user
        user_id: String,
    },

    /// A card was permanently closed
    #[serde(rename = "card.terminated")]
    CardTerminated {
        /// The terminated card
        card_id: String,
        /// Owning user
        user_id: String,
    },

    /// A transaction was approved in real time
    #[serde(rename = "transaction.authorized")]
    TransactionAuthorized {
        /// The authorized transaction
        transaction: Transaction,
        /// Acting user context, when available
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ActorContext>,
    },

    /// A transaction was confirmed by the card network
    #[serde(rename = "transaction.cleared")]
    TransactionCleared {
        /// The cleared transaction
        transaction: Transaction,
        /// Acting user context, when available
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ActorContext>,
    },

    /// A transaction was declined
    #[serde(rename = "transaction.declined")]
    TransactionDeclined {
        /// The declined transaction
        transaction: Transaction,
        /// Acting user context, when available
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ActorContext>,
    },

    /// A normalized card-network webhook awaiting settlement
    #[serde(rename = "transaction.webhook")]
    TransactionWebhook {
        /// The normalized transaction payload
        transaction: Transaction,
    },

    /// A budget crossed an alert threshold
    #[serde(rename = "budget.threshold")]
    BudgetThresholdCrossed {
        /// The budget that crossed
        budget_id: String,
        /// Owning company
        company_id: String,
        /// The ladder rung that fired (percent)
        threshold: u8,
        /// Actual usage percentage at evaluation time
        percent: Decimal,
        /// Spend total at evaluation time
        spent: Decimal,
        /// When the threshold was crossed
        crossed_at: DateTime<Utc>,
    },
}

impl PlatformEvent {
    /// The dotted event name handlers subscribe under
    pub fn name(&self) -> &'static str {
        match self {
            PlatformEvent::CardCreated { .. } => "card.created",
            PlatformEvent::CardActivated { .. } => "card.activated",
            PlatformEvent::CardFrozen { .. } => "card.frozen",
            PlatformEvent::CardTerminated { .. } => "card.terminated",
            PlatformEvent::TransactionAuthorized { .. } => "transaction.authorized",
            PlatformEvent::TransactionCleared { .. } => "transaction.cleared",
            PlatformEvent::TransactionDeclined { .. } => "transaction.declined",
            PlatformEvent::TransactionWebhook { .. } => "transaction.webhook",
            PlatformEvent::BudgetThresholdCrossed { .. } => "budget.threshold",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_match_serialized_tags() {
        let event = PlatformEvent::CardCreated {
            card_id: "card_1".into(),
            user_id: "user_1".into(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.name());
        assert_eq!(value["data"]["card_id"], "card_1");
    }

    #[test]
    fn test_event_round_trips_through_json() {
        let event = PlatformEvent::BudgetThresholdCrossed {
            budget_id: "bud_1".into(),
            company_id: "co_1".into(),
            threshold: 80,
            percent: Decimal::new(85, 0),
            spent: Decimal::new(425000, 2),
            crossed_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: PlatformEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
