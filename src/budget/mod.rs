//! Budget usage derivation and threshold alerting
//!
//! Budgets never store a running total. Usage is derived on read by summing
//! approved transactions inside the budget's scope and period window, so
//! the figure is always consistent with the transaction log.
//!
//! Alerting walks a fixed percentage ladder. Rungs below the budget's
//! configured threshold are skipped (100 is always eligible since the
//! threshold cannot exceed it), each rung fires at most once, and the fire
//! time is persisted back so restarts do not re-alert.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::events::EventBus;
use crate::store::{BudgetStore, TransactionStore};
use crate::types::{
    Budget, BudgetDraft, BudgetScope, BudgetUsage, PlatformError, PlatformEvent, Transaction,
};

/// The alert percentage ladder, ascending
const ALERT_LADDER: [u8; 5] = [50, 75, 80, 90, 100];

/// A threshold crossing ready to be sent somewhere
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetAlert {
    /// The budget that crossed
    pub budget_id: String,

    /// Owning company
    pub company_id: String,

    /// Budget display name
    pub budget_name: String,

    /// The ladder rung that fired
    pub threshold: u8,

    /// Actual usage percentage at evaluation time
    pub percent: Decimal,

    /// Spend total at evaluation time
    pub spent: Decimal,

    /// When the crossing was detected
    pub crossed_at: DateTime<Utc>,
}

/// Sink for threshold alerts
#[async_trait]
pub trait BudgetNotifier: Send + Sync {
    /// Deliver one alert
    ///
    /// # Errors
    ///
    /// An error prevents the rung from being marked fired, so it will be
    /// re-attempted on the next evaluation.
    async fn notify(&self, alert: BudgetAlert) -> Result<(), PlatformError>;
}

/// Notifier that publishes [`PlatformEvent::BudgetThresholdCrossed`]
pub struct EventBusNotifier {
    bus: Arc<EventBus>,
}

impl EventBusNotifier {
    /// Create a notifier publishing on `bus`
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl BudgetNotifier for EventBusNotifier {
    async fn notify(&self, alert: BudgetAlert) -> Result<(), PlatformError> {
        let outcomes = self
            .bus
            .publish(&PlatformEvent::BudgetThresholdCrossed {
                budget_id: alert.budget_id,
                company_id: alert.company_id,
                threshold: alert.threshold,
                percent: alert.percent,
                spent: alert.spent,
                crossed_at: alert.crossed_at,
            })
            .await;
        // Handler failures are already surfaced by the bus; the crossing
        // itself was published, so the rung counts as notified
        if outcomes.iter().any(|outcome| !outcome.is_ok()) {
            warn!("budget alert handler reported failure");
        }
        Ok(())
    }
}

/// Derives budget usage and fires threshold alerts
pub struct BudgetMonitor {
    budgets: Arc<dyn BudgetStore>,
    transactions: Arc<dyn TransactionStore>,
    notifier: Arc<dyn BudgetNotifier>,
}

impl BudgetMonitor {
    /// Create a monitor over the given stores, alerting through `notifier`
    pub fn new(
        budgets: Arc<dyn BudgetStore>,
        transactions: Arc<dyn TransactionStore>,
        notifier: Arc<dyn BudgetNotifier>,
    ) -> Self {
        Self {
            budgets,
            transactions,
            notifier,
        }
    }

    /// Validate a draft and store the new budget for `company_id`
    pub fn create_budget(
        &self,
        company_id: &str,
        draft: BudgetDraft,
    ) -> Result<Budget, PlatformError> {
        let budget = draft.into_budget(company_id)?;
        self.budgets.put(budget.clone())?;
        info!(budget_id = %budget.id, company_id, name = %budget.name, "budget created");
        Ok(budget)
    }

    /// Derive current usage for one budget
    pub fn calculate_usage(
        &self,
        budget: &Budget,
        now: DateTime<Utc>,
    ) -> Result<BudgetUsage, PlatformError> {
        let window_start = budget.period.window_start(now, budget.start_date);
        let transactions = self
            .transactions
            .approved_in_window(window_start, budget.end_date)?;

        let mut spent = Decimal::ZERO;
        for transaction in transactions
            .iter()
            .filter(|transaction| Self::in_scope(budget, transaction))
        {
            spent = spent.checked_add(transaction.amount).ok_or_else(|| {
                PlatformError::arithmetic_overflow("budget_usage", &budget.id)
            })?;
        }

        // amount is validated >= 1 at creation, so the division is safe
        let percent = spent / budget.amount * Decimal::ONE_HUNDRED;
        Ok(BudgetUsage {
            budget: budget.clone(),
            spent,
            remaining: budget.amount - spent,
            percent,
        })
    }

    /// All budgets of a company, each decorated with derived usage
    pub fn budgets_with_usage(
        &self,
        company_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<BudgetUsage>, PlatformError> {
        self.budgets
            .list_for_company(company_id)?
            .iter()
            .map(|budget| self.calculate_usage(budget, now))
            .collect()
    }

    /// Evaluate one budget against the alert ladder, firing unfired rungs
    ///
    /// Returns the rungs fired by this evaluation. Each fired rung is
    /// persisted into the budget's alert history after notification, so a
    /// rung fires exactly once over the budget's lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::BudgetNotFound`] for an unknown id, and
    /// propagates store or notifier failures; rungs already fired keep
    /// their history entries in that case.
    pub async fn check_and_notify(
        &self,
        budget_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, PlatformError> {
        let budget = self
            .budgets
            .get(budget_id)?
            .ok_or_else(|| PlatformError::budget_not_found(budget_id))?;
        let usage = self.calculate_usage(&budget, now)?;

        let mut fired = Vec::new();
        for rung in ALERT_LADDER {
            if rung < budget.alert_threshold_percent {
                continue;
            }
            if usage.percent < Decimal::from(rung) {
                break;
            }
            if budget.alert_history.contains_key(&rung) {
                continue;
            }

            info!(
                budget_id = %budget.id,
                threshold = rung,
                percent = %usage.percent,
                "budget threshold crossed"
            );
            self.notifier
                .notify(BudgetAlert {
                    budget_id: budget.id.clone(),
                    company_id: budget.company_id.clone(),
                    budget_name: budget.name.clone(),
                    threshold: rung,
                    percent: usage.percent,
                    spent: usage.spent,
                    crossed_at: now,
                })
                .await?;
            self.budgets.record_alert(&budget.id, rung, now)?;
            fired.push(rung);
        }
        Ok(fired)
    }

    /// Evaluate every budget of a company
    pub async fn check_company(
        &self,
        company_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(String, Vec<u8>)>, PlatformError> {
        let mut results = Vec::new();
        for budget in self.budgets.list_for_company(company_id)? {
            let fired = self.check_and_notify(&budget.id, now).await?;
            if !fired.is_empty() {
                results.push((budget.id, fired));
            }
        }
        Ok(results)
    }

    fn in_scope(budget: &Budget, transaction: &Transaction) -> bool {
        if transaction.company_id.as_deref() != Some(budget.company_id.as_str()) {
            return false;
        }
        match budget.scope_type {
            BudgetScope::Company => true,
            BudgetScope::Team => transaction.team == budget.scope_value,
            BudgetScope::Category => transaction.category == budget.scope_value,
            BudgetScope::Project => transaction.project == budget.scope_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryBudgetStore, InMemoryTransactionStore, TransactionStore};
    use crate::types::TransactionStatus;
    use std::sync::Mutex;

    struct RecordingNotifier {
        alerts: Mutex<Vec<BudgetAlert>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                alerts: Mutex::new(Vec::new()),
            })
        }

        fn thresholds(&self) -> Vec<u8> {
            self.alerts.lock().unwrap().iter().map(|a| a.threshold).collect()
        }
    }

    #[async_trait]
    impl BudgetNotifier for RecordingNotifier {
        async fn notify(&self, alert: BudgetAlert) -> Result<(), PlatformError> {
            self.alerts.lock().unwrap().push(alert);
            Ok(())
        }
    }

    struct Fixture {
        budgets: Arc<InMemoryBudgetStore>,
        transactions: Arc<InMemoryTransactionStore>,
        notifier: Arc<RecordingNotifier>,
        monitor: BudgetMonitor,
    }

    fn fixture() -> Fixture {
        let budgets = Arc::new(InMemoryBudgetStore::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        let notifier = RecordingNotifier::new();
        let monitor = BudgetMonitor::new(budgets.clone(), transactions.clone(), notifier.clone());
        Fixture {
            budgets,
            transactions,
            notifier,
            monitor,
        }
    }

    fn draft(amount: i64, threshold: Option<u8>) -> BudgetDraft {
        BudgetDraft {
            name: "Marketing".into(),
            amount: Decimal::new(amount, 2),
            scope_type: BudgetScope::Category,
            scope_value: Some("marketing".into()),
            period: None,
            start_date: None,
            end_date: None,
            alert_threshold_percent: threshold,
        }
    }

    fn spend(fix: &Fixture, id: &str, amount: i64, category: Option<&str>) {
        fix.transactions
            .insert(Transaction {
                id: id.to_string(),
                card_id: "card_1".into(),
                user_id: "user_1".into(),
                amount: Decimal::new(amount, 2),
                merchant: "Acme".into(),
                status: TransactionStatus::Cleared,
                company_id: Some("co_1".into()),
                category: category.map(String::from),
                team: None,
                project: None,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    #[tokio::test]
    async fn test_usage_sums_only_in_scope_spend() {
        let fix = fixture();
        let budget = fix
            .monitor
            .create_budget("co_1", draft(100000, None))
            .unwrap();

        spend(&fix, "txn_1", 20000, Some("marketing"));
        spend(&fix, "txn_2", 30000, Some("marketing"));
        spend(&fix, "txn_3", 50000, Some("travel"));
        spend(&fix, "txn_4", 50000, None);

        let usage = fix.monitor.calculate_usage(&budget, Utc::now()).unwrap();

        assert_eq!(usage.spent, Decimal::new(50000, 2));
        assert_eq!(usage.remaining, Decimal::new(50000, 2));
        assert_eq!(usage.percent, Decimal::from(50));
    }

    #[tokio::test]
    async fn test_usage_ignores_other_companies() {
        let fix = fixture();
        let budget = fix
            .monitor
            .create_budget("co_1", draft(100000, None))
            .unwrap();

        fix.transactions
            .insert(Transaction {
                id: "txn_other".into(),
                card_id: "card_1".into(),
                user_id: "user_1".into(),
                amount: Decimal::new(90000, 2),
                merchant: "Acme".into(),
                status: TransactionStatus::Cleared,
                company_id: Some("co_2".into()),
                category: Some("marketing".into()),
                team: None,
                project: None,
                created_at: Utc::now(),
            })
            .unwrap();

        let usage = fix.monitor.calculate_usage(&budget, Utc::now()).unwrap();

        assert_eq!(usage.spent, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_no_alert_below_configured_threshold() {
        let fix = fixture();
        let budget = fix
            .monitor
            .create_budget("co_1", draft(100000, Some(80)))
            .unwrap();
        spend(&fix, "txn_1", 75000, Some("marketing"));

        let fired = fix
            .monitor
            .check_and_notify(&budget.id, Utc::now())
            .await
            .unwrap();

        // 75% crosses the 50 and 75 rungs, but both sit below the
        // configured threshold of 80
        assert!(fired.is_empty());
        assert!(fix.notifier.thresholds().is_empty());
    }

    #[tokio::test]
    async fn test_crossing_fires_eligible_rungs_once() {
        let fix = fixture();
        let budget = fix
            .monitor
            .create_budget("co_1", draft(100000, Some(80)))
            .unwrap();
        spend(&fix, "txn_1", 85000, Some("marketing"));

        let fired = fix
            .monitor
            .check_and_notify(&budget.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(fired, vec![80]);

        // Re-evaluating at the same usage fires nothing new
        let again = fix
            .monitor
            .check_and_notify(&budget.id, Utc::now())
            .await
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(fix.notifier.thresholds(), vec![80]);
    }

    #[tokio::test]
    async fn test_later_rungs_fire_as_spend_grows() {
        let fix = fixture();
        let budget = fix
            .monitor
            .create_budget("co_1", draft(100000, Some(80)))
            .unwrap();

        spend(&fix, "txn_1", 85000, Some("marketing"));
        fix.monitor
            .check_and_notify(&budget.id, Utc::now())
            .await
            .unwrap();

        spend(&fix, "txn_2", 20000, Some("marketing"));
        let fired = fix
            .monitor
            .check_and_notify(&budget.id, Utc::now())
            .await
            .unwrap();

        // 105% usage: 90 and 100 newly crossed, 80 already in history
        assert_eq!(fired, vec![90, 100]);
        assert_eq!(fix.notifier.thresholds(), vec![80, 90, 100]);
    }

    #[tokio::test]
    async fn test_alert_history_survives_in_store() {
        let fix = fixture();
        let budget = fix
            .monitor
            .create_budget("co_1", draft(100000, Some(50)))
            .unwrap();
        spend(&fix, "txn_1", 60000, Some("marketing"));

        fix.monitor
            .check_and_notify(&budget.id, Utc::now())
            .await
            .unwrap();

        let stored = fix.budgets.get(&budget.id).unwrap().unwrap();
        assert!(stored.alert_history.contains_key(&50));
        assert!(!stored.alert_history.contains_key(&75));
    }

    #[tokio::test]
    async fn test_unknown_budget_is_an_error() {
        let fix = fixture();

        let result = fix.monitor.check_and_notify("bud_missing", Utc::now()).await;

        assert!(matches!(result, Err(PlatformError::BudgetNotFound { .. })));
    }

    #[tokio::test]
    async fn test_event_bus_notifier_publishes_threshold_event() {
        use crate::events::EventHandler;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Seen(AtomicUsize);

        #[async_trait]
        impl EventHandler for Seen {
            fn name(&self) -> &str {
                "seen"
            }

            async fn handle(&self, event: PlatformEvent) -> Result<(), PlatformError> {
                if matches!(event, PlatformEvent::BudgetThresholdCrossed { .. }) {
                    self.0.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            }
        }

        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Seen(AtomicUsize::new(0)));
        bus.subscribe("budget.threshold", seen.clone()).unwrap();
        let notifier = EventBusNotifier::new(bus);

        notifier
            .notify(BudgetAlert {
                budget_id: "bud_1".into(),
                company_id: "co_1".into(),
                budget_name: "Marketing".into(),
                threshold: 80,
                percent: Decimal::from(85),
                spent: Decimal::new(85000, 2),
                crossed_at: Utc::now(),
            })
            .await
            .unwrap();

        assert_eq!(seen.0.load(Ordering::SeqCst), 1);
    }
}
