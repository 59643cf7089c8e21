//! Budget-related types for the threshold monitor
//!
//! Budgets are spend ceilings scoped to an organizational dimension and a
//! time period. Usage is derived on read by summing approved transactions;
//! only the alert history is persisted back.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PlatformError;

/// Organizational dimension a budget ceiling applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetScope {
    /// All spend of the company
    Company,

    /// Spend attributed to a team
    Team,

    /// Spend within a category
    Category,

    /// Spend attributed to a project
    Project,
}

/// Budgeting period determining the usage window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    /// Resets on the first of each month
    Monthly,

    /// Resets on the first of each calendar quarter
    Quarterly,

    /// Resets on January 1st
    Annual,

    /// Runs from the budget's start date with no reset
    OneTime,
}

impl BudgetPeriod {
    /// Start of the current period window relative to `now`
    pub fn window_start(self, now: DateTime<Utc>, start_date: DateTime<Utc>) -> DateTime<Utc> {
        let period_start = match self {
            BudgetPeriod::Monthly => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single(),
            BudgetPeriod::Quarterly => {
                let quarter_month = now.month() - (now.month() - 1) % 3;
                Utc.with_ymd_and_hms(now.year(), quarter_month, 1, 0, 0, 0)
                    .single()
            }
            BudgetPeriod::Annual => Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0).single(),
            BudgetPeriod::OneTime => None,
        };

        match period_start {
            Some(period_start) => period_start.max(start_date),
            None => start_date,
        }
    }
}

/// A spend ceiling with alerting state
///
/// `alert_history` maps a fired threshold percentage to the time it was
/// notified, so each rung of the alert ladder fires exactly once per budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Unique budget identifier
    pub id: String,

    /// Owning company
    pub company_id: String,

    /// Display name
    pub name: String,

    /// Ceiling amount
    pub amount: Decimal,

    /// Scope dimension
    pub scope_type: BudgetScope,

    /// Scope value (team/category/project name); unused for company scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_value: Option<String>,

    /// Usage window period
    pub period: BudgetPeriod,

    /// When the budget takes effect
    pub start_date: DateTime<Utc>,

    /// Optional hard end of the usage window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    /// The lowest threshold the owner wants alerts for (100 always fires)
    pub alert_threshold_percent: u8,

    /// Threshold percentage → time the alert was sent
    #[serde(default)]
    pub alert_history: HashMap<u8, DateTime<Utc>>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// A budget decorated with derived usage figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetUsage {
    /// The underlying budget
    pub budget: Budget,

    /// Sum of approved spend in scope and window
    pub spent: Decimal,

    /// `amount - spent`
    pub remaining: Decimal,

    /// `spent / amount * 100`
    pub percent: Decimal,
}

/// Validated input for creating a budget
///
/// Mirrors the creation payload accepted at the platform boundary. Use
/// [`BudgetDraft::into_budget`] to validate and mint the stored shape.
#[derive(Debug, Clone, Deserialize)]
pub struct BudgetDraft {
    /// Display name (required, non-empty)
    pub name: String,

    /// Ceiling amount (must be at least 1)
    pub amount: Decimal,

    /// Scope dimension
    pub scope_type: BudgetScope,

    /// Scope value for non-company scopes
    #[serde(default)]
    pub scope_value: Option<String>,

    /// Usage window period; defaults to monthly
    #[serde(default)]
    pub period: Option<BudgetPeriod>,

    /// When the budget takes effect; defaults to now
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    /// Optional hard end of the usage window
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    /// Lowest threshold to alert on; defaults to 80
    #[serde(default)]
    pub alert_threshold_percent: Option<u8>,
}

impl BudgetDraft {
    /// Validate the draft and produce a stored budget for `company_id`
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::InvalidBudget`] when the name is empty, the
    /// amount is below 1, or the alert threshold is above 100.
    pub fn into_budget(self, company_id: impl Into<String>) -> Result<Budget, PlatformError> {
        if self.name.trim().is_empty() {
            return Err(PlatformError::invalid_budget("name", "must not be empty"));
        }
        if self.amount < Decimal::ONE {
            return Err(PlatformError::invalid_budget("amount", "must be at least 1"));
        }
        let alert_threshold_percent = self.alert_threshold_percent.unwrap_or(80);
        if alert_threshold_percent > 100 {
            return Err(PlatformError::invalid_budget(
                "alert_threshold_percent",
                "must be at most 100",
            ));
        }

        let now = Utc::now();
        Ok(Budget {
            id: format!("bud_{}", Uuid::new_v4().simple()),
            company_id: company_id.into(),
            name: self.name,
            amount: self.amount,
            scope_type: self.scope_type,
            scope_value: self.scope_value.filter(|v| !v.is_empty()),
            period: self.period.unwrap_or(BudgetPeriod::Monthly),
            start_date: self.start_date.unwrap_or(now),
            end_date: self.end_date,
            alert_threshold_percent,
            alert_history: HashMap::new(),
            created_at: now,
        })
    }
}
