//! Built-in event handlers
//!
//! Three handlers ship with the platform: card lifecycle logging,
//! transaction audit recording, and webhook settlement. Each is an ordinary
//! [`EventHandler`] wired onto the bus at startup; nothing here is special
//! to the bus.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::engine::AuthorizationEngine;
use crate::store::{AuditLogEntry, AuditLogStore};
use crate::types::{ActorContext, PlatformError, PlatformEvent, Transaction};

use super::bus::EventHandler;

/// Logs and audits card lifecycle events
pub struct CardEventHandler {
    audit: Arc<dyn AuditLogStore>,
}

impl CardEventHandler {
    /// Create a handler writing into `audit`
    pub fn new(audit: Arc<dyn AuditLogStore>) -> Self {
        Self { audit }
    }
}

#[async_trait]
impl EventHandler for CardEventHandler {
    fn name(&self) -> &str {
        "card_events"
    }

    async fn handle(&self, event: PlatformEvent) -> Result<(), PlatformError> {
        let (card_id, user_id) = match &event {
            PlatformEvent::CardCreated { card_id, user_id }
            | PlatformEvent::CardActivated { card_id, user_id }
            | PlatformEvent::CardFrozen { card_id, user_id }
            | PlatformEvent::CardTerminated { card_id, user_id } => (card_id, user_id),
            _ => return Ok(()),
        };

        info!(event = event.name(), %card_id, %user_id, "card lifecycle event");
        let entry = AuditLogEntry::new(
            event.name(),
            json!({ "card_id": card_id, "user_id": user_id }),
        )
        .with_item_id(card_id)
        .with_user_id(user_id);
        self.audit.append(entry)
    }
}

/// Records transaction lifecycle events in the audit trail
///
/// Entries carry the actor context (user, IP, user agent) when the event
/// had one, so the trail answers who triggered a transaction from where.
pub struct TransactionEventHandler {
    audit: Arc<dyn AuditLogStore>,
}

impl TransactionEventHandler {
    /// Create a handler writing into `audit`
    pub fn new(audit: Arc<dyn AuditLogStore>) -> Self {
        Self { audit }
    }

    fn record(
        &self,
        event_name: &str,
        transaction: &Transaction,
        context: Option<&ActorContext>,
    ) -> Result<(), PlatformError> {
        let payload = serde_json::to_value(transaction)
            .unwrap_or_else(|_| json!({ "id": transaction.id }));
        let mut entry = AuditLogEntry::new(event_name, payload)
            .with_item_id(&transaction.id)
            .with_user_id(&transaction.user_id);
        if let Some(context) = context {
            if let Some(user_id) = &context.user_id {
                entry = entry.with_user_id(user_id);
            }
            if let Some(ip_address) = &context.ip_address {
                entry = entry.with_ip_address(ip_address);
            }
            if let Some(user_agent) = &context.user_agent {
                entry = entry.with_user_agent(user_agent);
            }
        }
        self.audit.append(entry)
    }
}

#[async_trait]
impl EventHandler for TransactionEventHandler {
    fn name(&self) -> &str {
        "transaction_events"
    }

    async fn handle(&self, event: PlatformEvent) -> Result<(), PlatformError> {
        match &event {
            PlatformEvent::TransactionAuthorized {
                transaction,
                context,
            }
            | PlatformEvent::TransactionCleared {
                transaction,
                context,
            }
            | PlatformEvent::TransactionDeclined {
                transaction,
                context,
            } => self.record(event.name(), transaction, context.as_ref()),
            _ => Ok(()),
        }
    }
}

/// Settles queued transaction webhooks through the engine
///
/// Subscribed to `transaction.webhook`. A settlement failure is returned to
/// the queue, which retries with backoff; the idempotent settlement ledger
/// makes redelivery after a partial failure safe.
pub struct SettlementHandler {
    engine: Arc<AuthorizationEngine>,
}

impl SettlementHandler {
    /// Create a handler settling through `engine`
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventHandler for SettlementHandler {
    fn name(&self) -> &str {
        "settlement"
    }

    async fn handle(&self, event: PlatformEvent) -> Result<(), PlatformError> {
        match &event {
            PlatformEvent::TransactionWebhook { transaction } => {
                self.engine.settle_transaction(transaction)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        AccountStore, AuditFilters, CardStore, InMemoryAccountStore, InMemoryAuditLog,
        InMemoryCardStore, InMemoryTransactionStore, SpendingCache,
    };
    use crate::types::{Card, TransactionStatus, UserAccount};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn transaction(status: TransactionStatus) -> Transaction {
        Transaction {
            id: "txn_1".into(),
            card_id: "card_1".into(),
            user_id: "user_1".into(),
            amount: Decimal::new(10000, 2),
            merchant: "Costco".into(),
            status,
            company_id: None,
            category: None,
            team: None,
            project: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_card_handler_audits_lifecycle_events() {
        let audit = Arc::new(InMemoryAuditLog::new());
        let handler = CardEventHandler::new(audit.clone());

        handler
            .handle(PlatformEvent::CardFrozen {
                card_id: "card_1".into(),
                user_id: "user_1".into(),
            })
            .await
            .unwrap();

        let history = audit.event_history(&AuditFilters::default()).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_name, "card.frozen");
        assert_eq!(history[0].item_id.as_deref(), Some("card_1"));
    }

    #[tokio::test]
    async fn test_transaction_handler_records_actor_context() {
        let audit = Arc::new(InMemoryAuditLog::new());
        let handler = TransactionEventHandler::new(audit.clone());

        handler
            .handle(PlatformEvent::TransactionCleared {
                transaction: transaction(TransactionStatus::Cleared),
                context: Some(ActorContext {
                    user_id: Some("admin_1".into()),
                    ip_address: Some("203.0.113.9".into()),
                    user_agent: Some("dashboard/2.1".into()),
                }),
            })
            .await
            .unwrap();

        let history = audit.event_history(&AuditFilters::default()).unwrap();
        assert_eq!(history[0].event_name, "transaction.cleared");
        assert_eq!(history[0].user_id.as_deref(), Some("admin_1"));
        assert_eq!(history[0].ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(history[0].user_agent.as_deref(), Some("dashboard/2.1"));
    }

    #[tokio::test]
    async fn test_transaction_handler_ignores_unrelated_events() {
        let audit = Arc::new(InMemoryAuditLog::new());
        let handler = TransactionEventHandler::new(audit.clone());

        handler
            .handle(PlatformEvent::CardCreated {
                card_id: "card_1".into(),
                user_id: "user_1".into(),
            })
            .await
            .unwrap();

        assert!(audit.event_history(&AuditFilters::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settlement_handler_settles_webhook() {
        let accounts = Arc::new(InMemoryAccountStore::new());
        let cards = Arc::new(InMemoryCardStore::new());
        accounts
            .put(UserAccount::with_balance("user_1", Decimal::new(100000, 2)))
            .unwrap();
        cards.put(Card::new("card_1", "user_1")).unwrap();
        let engine = Arc::new(AuthorizationEngine::new(
            accounts.clone(),
            cards,
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(SpendingCache::new()),
        ));
        let handler = SettlementHandler::new(engine);

        handler
            .handle(PlatformEvent::TransactionWebhook {
                transaction: transaction(TransactionStatus::Cleared),
            })
            .await
            .unwrap();

        let account = accounts.get("user_1").unwrap().unwrap();
        assert_eq!(account.balance, Decimal::new(90000, 2));
    }
}
