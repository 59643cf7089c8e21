//! End-to-end tests wiring the engine, queue, bus, handlers, and monitor
//! together the way a deployment would.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use jit_funding_engine::{
    AccountStore, AuditFilters, AuditLogStore, AuthorizationEngine, AuthorizationRequest,
    BudgetDraft, BudgetMonitor, BudgetScope, Card, CardEventHandler, CardStore, DecisionReason,
    EventBus, EventBusNotifier, EventQueue, InMemoryAccountStore, InMemoryAuditLog,
    InMemoryBudgetStore, InMemoryCardStore, InMemoryTransactionStore, MerchantRules, PlatformEvent,
    QueueConfig, SettlementHandler, SpendingCache, SpendingLimits, Transaction,
    TransactionEventHandler, TransactionStatus, TransactionStore, TransactionWebhook, UserAccount,
};

struct Platform {
    accounts: Arc<InMemoryAccountStore>,
    cards: Arc<InMemoryCardStore>,
    transactions: Arc<InMemoryTransactionStore>,
    audit: Arc<InMemoryAuditLog>,
    engine: Arc<AuthorizationEngine>,
    bus: Arc<EventBus>,
    queue: EventQueue,
    monitor: BudgetMonitor,
}

fn platform() -> Platform {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let accounts = Arc::new(InMemoryAccountStore::new());
    let cards = Arc::new(InMemoryCardStore::new());
    let transactions = Arc::new(InMemoryTransactionStore::new());
    let budgets = Arc::new(InMemoryBudgetStore::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let cache = Arc::new(SpendingCache::new());

    let engine = Arc::new(AuthorizationEngine::new(
        accounts.clone(),
        cards.clone(),
        transactions.clone(),
        cache,
    ));

    let bus = Arc::new(EventBus::new());
    bus.subscribe("card.created", Arc::new(CardEventHandler::new(audit.clone())))
        .unwrap();
    bus.subscribe(
        "transaction.cleared",
        Arc::new(TransactionEventHandler::new(audit.clone())),
    )
    .unwrap();
    bus.subscribe(
        "transaction.webhook",
        Arc::new(SettlementHandler::new(engine.clone())),
    )
    .unwrap();

    let queue = EventQueue::new(bus.clone(), audit.clone(), QueueConfig::default());
    let monitor = BudgetMonitor::new(
        budgets,
        transactions.clone(),
        Arc::new(EventBusNotifier::new(bus.clone())),
    );

    Platform {
        accounts,
        cards,
        transactions,
        audit,
        engine,
        bus,
        queue,
        monitor,
    }
}

fn seed(platform: &Platform, balance: i64, card: Card) {
    platform
        .accounts
        .put(UserAccount::with_balance(
            card.user_id.clone(),
            Decimal::new(balance, 2),
        ))
        .unwrap();
    platform.cards.put(card).unwrap();
}

fn limited_card(daily: i64, monthly: i64) -> Card {
    Card {
        limits: SpendingLimits {
            daily_limit: Some(Decimal::new(daily, 2)),
            monthly_limit: Some(Decimal::new(monthly, 2)),
        },
        ..Card::new("card_1", "user_1")
    }
}

fn request(amount: i64, merchant: &str) -> AuthorizationRequest {
    AuthorizationRequest {
        user_id: "user_1".into(),
        card_id: "card_1".into(),
        amount: Decimal::new(amount, 2),
        merchant: merchant.into(),
        merchant_category: None,
    }
}

fn webhook(id: &str, amount: i64, status: TransactionStatus) -> TransactionWebhook {
    TransactionWebhook {
        transaction_id: id.into(),
        card_id: "card_1".into(),
        user_id: "user_1".into(),
        amount: Decimal::new(amount, 2),
        merchant: "Costco".into(),
        status,
    }
}

#[test]
fn approves_when_balance_and_limits_allow() {
    // Balance 1000, limits 5000/50000, 100 already settled today
    let platform = platform();
    seed(&platform, 100000, limited_card(500000, 5000000));
    platform
        .transactions
        .apply_settlement("txn_prior", "card_1", Decimal::new(10000, 2), Utc::now())
        .unwrap();

    let decision = platform.engine.authorize(&request(10000, "Costco"));

    assert!(decision.approved);
    assert_eq!(decision.reason, DecisionReason::Approved);
}

#[test]
fn declines_when_daily_limit_would_be_exceeded() {
    // 450 settled today against a 500 daily limit, 100 requested
    let platform = platform();
    seed(&platform, 100000, limited_card(50000, 5000000));
    platform
        .transactions
        .apply_settlement("txn_prior", "card_1", Decimal::new(45000, 2), Utc::now())
        .unwrap();

    let decision = platform.engine.authorize(&request(10000, "Costco"));

    assert!(!decision.approved);
    assert_eq!(decision.reason, DecisionReason::SpendingLimitExceeded);
}

#[test]
fn declines_blocked_merchant() {
    let platform = platform();
    let card = Card {
        merchant_rules: MerchantRules {
            blocked_merchants: vec!["Amazon".into(), "Ebay".into()],
            ..Default::default()
        },
        ..Card::new("card_1", "user_1")
    };
    seed(&platform, 100000, card);

    let decision = platform.engine.authorize(&request(10000, "Amazon"));

    assert!(!decision.approved);
    assert_eq!(decision.reason, DecisionReason::MerchantRestricted);
}

#[tokio::test]
async fn webhook_settles_through_queue_and_affects_next_decision() {
    let platform = platform();
    seed(&platform, 100000, limited_card(50000, 5000000));

    platform
        .engine
        .process_transaction_webhook(
            webhook("txn_1", 45000, TransactionStatus::Cleared),
            &platform.queue,
        )
        .unwrap();
    let report = platform.queue.process_batch().await;
    assert_eq!(report.delivered.len(), 1);

    // Balance debited and spend counted
    let account = platform.accounts.get("user_1").unwrap().unwrap();
    assert_eq!(account.balance, Decimal::new(55000, 2));

    // The settled 450 now blocks a 100 request under the 500 daily limit
    let decision = platform.engine.authorize(&request(10000, "Costco"));
    assert_eq!(decision.reason, DecisionReason::SpendingLimitExceeded);

    // Delivery left an audit entry
    let delivered = platform
        .audit
        .event_history(&AuditFilters {
            event_name: Some("queue.delivered".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(delivered.len(), 1);
}

#[tokio::test]
async fn redelivered_webhook_settles_exactly_once() {
    let platform = platform();
    seed(&platform, 100000, Card::new("card_1", "user_1"));

    for _ in 0..2 {
        platform
            .engine
            .process_transaction_webhook(
                webhook("txn_1", 25000, TransactionStatus::Cleared),
                &platform.queue,
            )
            .unwrap();
    }
    platform.queue.drain_eligible().await;

    let account = platform.accounts.get("user_1").unwrap().unwrap();
    assert_eq!(account.balance, Decimal::new(75000, 2));
}

#[tokio::test]
async fn declined_webhook_is_recorded_without_settling() {
    let platform = platform();
    seed(&platform, 100000, Card::new("card_1", "user_1"));

    platform
        .engine
        .process_transaction_webhook(
            webhook("txn_1", 25000, TransactionStatus::Declined),
            &platform.queue,
        )
        .unwrap();
    platform.queue.process_batch().await;

    let account = platform.accounts.get("user_1").unwrap().unwrap();
    assert_eq!(account.balance, Decimal::new(100000, 2));
    let stored = platform.transactions.get("txn_1").unwrap().unwrap();
    assert_eq!(stored.status, TransactionStatus::Declined);
}

#[test]
fn malformed_webhook_is_rejected_before_enqueueing() {
    let platform = platform();

    let result = platform.engine.process_transaction_webhook(
        webhook("", 25000, TransactionStatus::Cleared),
        &platform.queue,
    );

    assert!(result.is_err());
    assert!(platform.queue.is_empty());
}

#[tokio::test]
async fn card_lifecycle_events_reach_the_audit_trail() {
    let platform = platform();

    platform.queue.enqueue(
        PlatformEvent::CardCreated {
            card_id: "card_9".into(),
            user_id: "user_9".into(),
        },
        2,
    );
    platform.queue.process_batch().await;

    let history = platform
        .audit
        .event_history(&AuditFilters {
            event_name: Some("card.created".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].item_id.as_deref(), Some("card_9"));
}

#[tokio::test]
async fn transaction_cleared_event_carries_actor_context() {
    let platform = platform();
    let transaction = Transaction {
        id: "txn_1".into(),
        card_id: "card_1".into(),
        user_id: "user_1".into(),
        amount: Decimal::new(10000, 2),
        merchant: "Costco".into(),
        status: TransactionStatus::Cleared,
        company_id: None,
        category: None,
        team: None,
        project: None,
        created_at: Utc::now(),
    };

    platform
        .bus
        .publish(&PlatformEvent::TransactionCleared {
            transaction,
            context: Some(jit_funding_engine::ActorContext {
                user_id: Some("ops_1".into()),
                ip_address: Some("198.51.100.7".into()),
                user_agent: None,
            }),
        })
        .await;

    let history = platform
        .audit
        .event_history(&AuditFilters {
            event_name: Some("transaction.cleared".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_id.as_deref(), Some("ops_1"));
    assert_eq!(history[0].ip_address.as_deref(), Some("198.51.100.7"));
}

#[tokio::test]
async fn budget_threshold_crossing_publishes_event() {
    let platform = platform();
    seed(&platform, 1000000, Card::new("card_1", "user_1"));

    let budget = platform
        .monitor
        .create_budget(
            "co_1",
            BudgetDraft {
                name: "Travel".into(),
                amount: Decimal::new(100000, 2),
                scope_type: BudgetScope::Company,
                scope_value: None,
                period: None,
                start_date: None,
                end_date: None,
                alert_threshold_percent: Some(80),
            },
        )
        .unwrap();

    // Settle company spend at 85% of the budget
    let transaction = Transaction {
        id: "txn_1".into(),
        card_id: "card_1".into(),
        user_id: "user_1".into(),
        amount: Decimal::new(85000, 2),
        merchant: "Delta".into(),
        status: TransactionStatus::Cleared,
        company_id: Some("co_1".into()),
        category: Some("travel".into()),
        team: None,
        project: None,
        created_at: Utc::now(),
    };
    platform.engine.settle_transaction(&transaction).unwrap();

    let fired = platform
        .monitor
        .check_and_notify(&budget.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(fired, vec![80]);

    // Re-checking fires nothing further at the same usage
    let again = platform
        .monitor
        .check_and_notify(&budget.id, Utc::now())
        .await
        .unwrap();
    assert!(again.is_empty());
}
