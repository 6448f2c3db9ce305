// 📈 Financial Processor
// Recording, balances, reports, budgets and insights over the ledger
//
// Budget alert rule: after every expense, each budget that covers the
// expense's category and whose window contains its date is re-summed; at
// 80% or more of the budget amount a `budget_alert` notification is stored.
// Alert failures are logged and never undo the recorded transaction.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::db::{
    self, Budget, Event, LedgerEntry, NewBudget, NewTransaction, Notification, TransactionType,
    ALL_CATEGORIES,
};
use crate::interpreter::Period;

/// Fraction of a budget that triggers an alert
pub const BUDGET_ALERT_THRESHOLD: f64 = 0.8;

pub const NEGATIVE_BALANCE_WARNING: &str =
    "Saldo Anda negatif. Pertimbangkan untuk mengurangi pengeluaran.";
pub const SAVINGS_TIP: &str = "Simpan minimal 20% dari pendapatan Anda untuk dana darurat.";

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balance {
    pub total_income: f64,
    pub total_expenses: f64,
    pub current_balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryTotals {
    pub income: BTreeMap<String, f64>,
    pub expense: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub income: f64,
    pub expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialReport {
    pub period: Period,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_income: f64,
    pub total_expenses: f64,
    pub categories: CategoryTotals,
    /// Sorted by date
    pub daily_summary: Vec<DailySummary>,
}

impl FinancialReport {
    pub fn is_empty(&self) -> bool {
        self.daily_summary.is_empty()
    }

    /// (category, amount) pairs for the chat reply
    pub fn expense_lines(&self) -> Vec<(String, f64)> {
        self.categories
            .expense
            .iter()
            .map(|(category, amount)| (category.clone(), *amount))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub budget_id: i64,
    pub category: String,
    pub period: Period,
    pub budget_amount: f64,
    pub spent_amount: f64,
    pub remaining_amount: f64,
    pub percentage_used: f64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Warning,
    Alert,
    Tip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub message: String,
}

/// A recorded transaction and any budget alerts it raised
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub entry: LedgerEntry,
    pub alerts: Vec<Notification>,
}

fn percentage(spent: f64, amount: f64) -> f64 {
    if amount > 0.0 {
        spent / amount * 100.0
    } else {
        0.0
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Store a transaction, log it to the audit trail, then run budget alerts
pub fn record_transaction(
    conn: &Connection,
    tx: &NewTransaction,
    actor: &str,
) -> Result<RecordOutcome> {
    // Row and audit event commit together or not at all
    let sql_tx = conn.unchecked_transaction()?;
    let entry = db::insert_transaction(&sql_tx, tx)?;

    let event = Event::new(
        "transaction_recorded",
        "transaction",
        &entry.id.to_string(),
        serde_json::to_value(&entry)?,
        actor,
    );
    db::insert_event(&sql_tx, &event)?;
    sql_tx.commit()?;

    tracing::info!(
        user_id = entry.user_id,
        transaction_id = entry.id,
        kind = %entry.transaction_type,
        "transaction recorded"
    );

    let alerts = if entry.transaction_type == TransactionType::Expense {
        check_budget_alerts(conn, &entry).unwrap_or_else(|e| {
            tracing::error!(user_id = entry.user_id, error = %e, "budget alert check failed");
            Vec::new()
        })
    } else {
        Vec::new()
    };

    Ok(RecordOutcome { entry, alerts })
}

/// Alerts for budgets pushed to the threshold by `entry`
pub fn check_budget_alerts(conn: &Connection, entry: &LedgerEntry) -> Result<Vec<Notification>> {
    let mut alerts = Vec::new();

    for budget in db::get_user_budgets(conn, entry.user_id)? {
        if !budget.covers(&entry.category) || !budget.is_active_at(entry.date) {
            continue;
        }

        let spent = db::sum_expenses_between(
            conn,
            entry.user_id,
            &budget.category,
            budget.period_start,
            budget.period_end,
        )?;

        if budget.amount > 0.0 && spent >= budget.amount * BUDGET_ALERT_THRESHOLD {
            let message = format!(
                "Anda telah menggunakan {:.1}% dari budget {}",
                percentage(spent, budget.amount),
                budget.category
            );
            tracing::warn!(user_id = entry.user_id, budget_id = budget.id, "budget threshold reached");
            alerts.push(db::insert_notification(conn, entry.user_id, "budget_alert", &message)?);
        }
    }

    Ok(alerts)
}

pub fn get_balance(conn: &Connection, user_id: i64) -> Result<Balance> {
    let total_income = db::sum_transactions(conn, user_id, TransactionType::Income)?;
    let total_expenses = db::sum_transactions(conn, user_id, TransactionType::Expense)?;

    Ok(Balance {
        total_income,
        total_expenses,
        current_balance: total_income - total_expenses,
    })
}

/// Totals for [now - period, now]
pub fn generate_report(
    conn: &Connection,
    user_id: i64,
    period: Period,
    now: DateTime<Utc>,
) -> Result<FinancialReport> {
    let start_date = now - period.duration();
    let entries: Vec<LedgerEntry> = db::get_transactions_since(conn, user_id, start_date)?
        .into_iter()
        .filter(|entry| entry.date <= now)
        .collect();

    let mut total_income = 0.0;
    let mut total_expenses = 0.0;
    let mut categories = CategoryTotals::default();
    let mut daily: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for entry in &entries {
        let day = daily.entry(entry.date.date_naive()).or_insert((0.0, 0.0));

        match entry.transaction_type {
            TransactionType::Income => {
                total_income += entry.amount;
                *categories.income.entry(entry.category.clone()).or_insert(0.0) += entry.amount;
                day.0 += entry.amount;
            }
            TransactionType::Expense => {
                total_expenses += entry.amount;
                *categories.expense.entry(entry.category.clone()).or_insert(0.0) += entry.amount;
                day.1 += entry.amount;
            }
        }
    }

    let daily_summary = daily
        .into_iter()
        .map(|(date, (income, expense))| DailySummary {
            date,
            income,
            expense,
        })
        .collect();

    Ok(FinancialReport {
        period,
        start_date,
        end_date: now,
        total_income,
        total_expenses,
        categories,
        daily_summary,
    })
}

/// Budget window starts at `now`; no category means all expenses
pub fn set_budget(
    conn: &Connection,
    user_id: i64,
    amount: f64,
    period: Period,
    category: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Budget> {
    let sql_tx = conn.unchecked_transaction()?;
    let budget = db::insert_budget(
        &sql_tx,
        &NewBudget {
            user_id,
            category: category.unwrap_or(ALL_CATEGORIES).to_string(),
            amount,
            period,
            period_start: now,
            period_end: now + period.duration(),
        },
    )?;

    let event = Event::new(
        "budget_set",
        "budget",
        &budget.id.to_string(),
        serde_json::to_value(&budget)?,
        "system",
    );
    db::insert_event(&sql_tx, &event)?;
    sql_tx.commit()?;

    tracing::info!(user_id, budget_id = budget.id, period = %period, "budget set");
    Ok(budget)
}

pub fn check_budget_status(conn: &Connection, user_id: i64) -> Result<Vec<BudgetStatus>> {
    db::get_user_budgets(conn, user_id)?
        .into_iter()
        .map(|budget| -> Result<BudgetStatus> {
            let spent = db::sum_expenses_between(
                conn,
                user_id,
                &budget.category,
                budget.period_start,
                budget.period_end,
            )?;

            Ok(BudgetStatus {
                budget_id: budget.id,
                percentage_used: percentage(spent, budget.amount),
                remaining_amount: budget.amount - spent,
                spent_amount: spent,
                budget_amount: budget.amount,
                category: budget.category,
                period: budget.period,
                period_start: budget.period_start,
                period_end: budget.period_end,
            })
        })
        .collect()
}

pub fn get_financial_insights(conn: &Connection, user_id: i64) -> Result<Vec<Insight>> {
    let mut insights = Vec::new();

    if get_balance(conn, user_id)?.current_balance < 0.0 {
        insights.push(Insight {
            kind: InsightKind::Warning,
            message: NEGATIVE_BALANCE_WARNING.to_string(),
        });
    }

    for status in check_budget_status(conn, user_id)? {
        if status.percentage_used > BUDGET_ALERT_THRESHOLD * 100.0 {
            insights.push(Insight {
                kind: InsightKind::Alert,
                message: format!(
                    "Budget untuk {} sudah terpakai {:.1}%",
                    status.category, status.percentage_used
                ),
            });
        }
    }

    insights.push(Insight {
        kind: InsightKind::Tip,
        message: SAVINGS_TIP.to_string(),
    });

    Ok(insights)
}
