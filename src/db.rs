use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::interpreter::Period;

/// Budget category that covers every expense
pub const ALL_CATEGORIES: &str = "all";

// ============================================================================
// TIMESTAMPS
// Fixed-width UTC RFC 3339 so text comparison in SQL matches time order
// ============================================================================

pub fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at storage precision
fn db_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn parse_db_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    parse_db_time(idx, &value)
}

fn optional_time_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.get(idx)?;
    value.map(|v| parse_db_time(idx, &v)).transpose()
}

// ============================================================================
// MODELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub phone_number: String,
    pub name: Option<String>,
    pub language_preference: String,
    pub created_at: DateTime<Utc>,
}

/// Stored income or expense row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: i64,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub category: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
}

/// Spending limit over [period_start, period_end]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    /// A category name or ALL_CATEGORIES
    pub category: String,
    pub amount: f64,
    pub period: Period,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn covers(&self, category: &str) -> bool {
        self.category == ALL_CATEGORIES || self.category == category
    }

    pub fn is_active_at(&self, time: DateTime<Utc>) -> bool {
        self.period_start <= time && time <= self.period_end
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBudget {
    pub user_id: i64,
    pub category: String,
    pub amount: f64,
    pub period: Period,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialGoal {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub deadline: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Goal as submitted by the dashboard
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewGoal {
    pub name: String,
    pub target_amount: f64,
    #[serde(default)]
    pub current_amount: f64,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
}

/// Event for audit trail ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// SETUP
// ============================================================================

/// Open (or create) the database file and make sure the schema exists
pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let conn = Connection::open(path.as_ref())
        .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone_number TEXT UNIQUE NOT NULL,
            name TEXT,
            language_preference TEXT NOT NULL DEFAULT 'id',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
            amount REAL NOT NULL,
            category TEXT NOT NULL,
            description TEXT,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS budgets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            category TEXT NOT NULL,
            amount REAL NOT NULL,
            period TEXT NOT NULL,
            period_start TEXT NOT NULL,
            period_end TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS financial_goals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            name TEXT NOT NULL,
            target_amount REAL NOT NULL,
            current_amount REAL NOT NULL DEFAULT 0,
            deadline TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
        CREATE INDEX IF NOT EXISTS idx_budgets_user ON budgets(user_id);
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);
        CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);",
    )?;

    Ok(())
}

// ============================================================================
// USERS
// ============================================================================

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        name: row.get(2)?,
        language_preference: row.get(3)?,
        created_at: time_column(row, 4)?,
    })
}

const USER_COLUMNS: &str = "id, phone_number, name, language_preference, created_at";

pub fn create_user(conn: &Connection, phone_number: &str, name: Option<&str>) -> Result<User> {
    let created_at = db_now();

    conn.execute(
        "INSERT INTO users (phone_number, name, language_preference, created_at)
         VALUES (?1, ?2, 'id', ?3)",
        params![phone_number, name, to_db_time(&created_at)],
    )
    .with_context(|| format!("Failed to create user {}", phone_number))?;

    Ok(User {
        id: conn.last_insert_rowid(),
        phone_number: phone_number.to_string(),
        name: name.map(str::to_string),
        language_preference: "id".to_string(),
        created_at,
    })
}

pub fn get_user_by_phone(conn: &Connection, phone_number: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE phone_number = ?1", USER_COLUMNS);
    let user = conn
        .query_row(&sql, params![phone_number], user_from_row)
        .optional()?;
    Ok(user)
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    let user = conn.query_row(&sql, params![user_id], user_from_row).optional()?;
    Ok(user)
}

/// Chat senders are registered on first contact
pub fn get_or_create_user(conn: &Connection, phone_number: &str) -> Result<User> {
    if let Some(user) = get_user_by_phone(conn, phone_number)? {
        return Ok(user);
    }

    let user = create_user(conn, phone_number, None)?;
    tracing::info!(user_id = user.id, "registered new user");
    Ok(user)
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

const LEDGER_COLUMNS: &str = "id, user_id, type, amount, category, description, date, created_at";

fn ledger_from_row(row: &Row) -> rusqlite::Result<LedgerEntry> {
    let kind: String = row.get(2)?;
    let transaction_type = TransactionType::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown transaction type '{}'", kind).into(),
        )
    })?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        transaction_type,
        amount: row.get(3)?,
        category: row.get(4)?,
        description: row.get(5)?,
        date: time_column(row, 6)?,
        created_at: time_column(row, 7)?,
    })
}

pub fn insert_transaction(conn: &Connection, tx: &NewTransaction) -> Result<LedgerEntry> {
    let created_at = db_now();

    conn.execute(
        "INSERT INTO transactions (user_id, type, amount, category, description, date, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            tx.user_id,
            tx.transaction_type.as_str(),
            tx.amount,
            tx.category,
            tx.description,
            to_db_time(&tx.date),
            to_db_time(&created_at),
        ],
    )
    .context("Failed to insert transaction")?;

    Ok(LedgerEntry {
        id: conn.last_insert_rowid(),
        user_id: tx.user_id,
        transaction_type: tx.transaction_type,
        amount: tx.amount,
        category: tx.category.clone(),
        description: tx.description.clone(),
        date: tx.date.trunc_subsecs(6),
        created_at,
    })
}

/// Newest first
pub fn get_user_transactions(
    conn: &Connection,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntry>> {
    let sql = format!(
        "SELECT {} FROM transactions
         WHERE user_id = ?1
         ORDER BY date DESC, id DESC
         LIMIT ?2 OFFSET ?3",
        LEDGER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let entries = stmt
        .query_map(params![user_id, limit, offset], ledger_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn count_user_transactions(conn: &Connection, user_id: i64) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )?;

    Ok(count)
}

/// Oldest first, inclusive of `since`
pub fn get_transactions_since(
    conn: &Connection,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<Vec<LedgerEntry>> {
    let sql = format!(
        "SELECT {} FROM transactions
         WHERE user_id = ?1 AND date >= ?2
         ORDER BY date ASC, id ASC",
        LEDGER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let entries = stmt
        .query_map(params![user_id, to_db_time(&since)], ledger_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

pub fn sum_transactions(
    conn: &Connection,
    user_id: i64,
    transaction_type: TransactionType,
) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM transactions WHERE user_id = ?1 AND type = ?2",
        params![user_id, transaction_type.as_str()],
        |row| row.get(0),
    )?;

    Ok(total)
}

/// Expenses dated within [start, end]; `category` may be ALL_CATEGORIES
pub fn sum_expenses_between(
    conn: &Connection,
    user_id: i64,
    category: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0.0) FROM transactions
         WHERE user_id = ?1
           AND type = 'expense'
           AND date BETWEEN ?2 AND ?3
           AND (?4 = 'all' OR category = ?4)",
        params![user_id, to_db_time(&start), to_db_time(&end), category],
        |row| row.get(0),
    )?;

    Ok(total)
}

// ============================================================================
// BUDGETS
// ============================================================================

fn budget_from_row(row: &Row) -> rusqlite::Result<Budget> {
    let period: String = row.get(4)?;
    let period = Period::parse(&period).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown budget period '{}'", period).into(),
        )
    })?;

    Ok(Budget {
        id: row.get(0)?,
        user_id: row.get(1)?,
        category: row.get(2)?,
        amount: row.get(3)?,
        period,
        period_start: time_column(row, 5)?,
        period_end: time_column(row, 6)?,
        created_at: time_column(row, 7)?,
    })
}

pub fn insert_budget(conn: &Connection, budget: &NewBudget) -> Result<Budget> {
    let created_at = db_now();

    conn.execute(
        "INSERT INTO budgets (user_id, category, amount, period, period_start, period_end, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            budget.user_id,
            budget.category,
            budget.amount,
            budget.period.as_str(),
            to_db_time(&budget.period_start),
            to_db_time(&budget.period_end),
            to_db_time(&created_at),
        ],
    )
    .context("Failed to insert budget")?;

    Ok(Budget {
        id: conn.last_insert_rowid(),
        user_id: budget.user_id,
        category: budget.category.clone(),
        amount: budget.amount,
        period: budget.period,
        period_start: budget.period_start.trunc_subsecs(6),
        period_end: budget.period_end.trunc_subsecs(6),
        created_at,
    })
}

/// Oldest first
pub fn get_user_budgets(conn: &Connection, user_id: i64) -> Result<Vec<Budget>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, category, amount, period, period_start, period_end, created_at
         FROM budgets
         WHERE user_id = ?1
         ORDER BY id ASC",
    )?;

    let budgets = stmt
        .query_map(params![user_id], budget_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(budgets)
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

fn notification_from_row(row: &Row) -> rusqlite::Result<Notification> {
    let is_read: i64 = row.get(4)?;

    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        notification_type: row.get(2)?,
        message: row.get(3)?,
        is_read: is_read != 0,
        created_at: time_column(row, 5)?,
    })
}

pub fn insert_notification(
    conn: &Connection,
    user_id: i64,
    notification_type: &str,
    message: &str,
) -> Result<Notification> {
    let created_at = db_now();

    conn.execute(
        "INSERT INTO notifications (user_id, type, message, is_read, created_at)
         VALUES (?1, ?2, ?3, 0, ?4)",
        params![user_id, notification_type, message, to_db_time(&created_at)],
    )
    .context("Failed to insert notification")?;

    Ok(Notification {
        id: conn.last_insert_rowid(),
        user_id,
        notification_type: notification_type.to_string(),
        message: message.to_string(),
        is_read: false,
        created_at,
    })
}

/// Newest first
pub fn get_user_notifications(
    conn: &Connection,
    user_id: i64,
    unread_only: bool,
) -> Result<Vec<Notification>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, type, message, is_read, created_at
         FROM notifications
         WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0)
         ORDER BY created_at DESC, id DESC",
    )?;

    let notifications = stmt
        .query_map(params![user_id, unread_only], notification_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(notifications)
}

/// Returns false when no notification has that id
pub fn mark_notification_read(conn: &Connection, notification_id: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        params![notification_id],
    )?;

    Ok(updated > 0)
}

// ============================================================================
// GOALS
// ============================================================================

fn goal_from_row(row: &Row) -> rusqlite::Result<FinancialGoal> {
    Ok(FinancialGoal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        target_amount: row.get(3)?,
        current_amount: row.get(4)?,
        deadline: optional_time_column(row, 5)?,
        status: row.get(6)?,
        created_at: time_column(row, 7)?,
    })
}

pub fn insert_goal(conn: &Connection, user_id: i64, goal: &NewGoal) -> Result<FinancialGoal> {
    let created_at = db_now();

    conn.execute(
        "INSERT INTO financial_goals (user_id, name, target_amount, current_amount, deadline, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6)",
        params![
            user_id,
            goal.name,
            goal.target_amount,
            goal.current_amount,
            goal.deadline.as_ref().map(to_db_time),
            to_db_time(&created_at),
        ],
    )
    .context("Failed to insert financial goal")?;

    Ok(FinancialGoal {
        id: conn.last_insert_rowid(),
        user_id,
        name: goal.name.clone(),
        target_amount: goal.target_amount,
        current_amount: goal.current_amount,
        deadline: goal.deadline.map(|d| d.trunc_subsecs(6)),
        status: "active".to_string(),
        created_at,
    })
}

pub fn get_user_goals(conn: &Connection, user_id: i64) -> Result<Vec<FinancialGoal>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, target_amount, current_amount, deadline, status, created_at
         FROM financial_goals
         WHERE user_id = ?1
         ORDER BY id ASC",
    )?;

    let goals = stmt
        .query_map(params![user_id], goal_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(goals)
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            to_db_time(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: time_column(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
    }

    fn expense(user_id: i64, amount: f64, category: &str, date: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            user_id,
            transaction_type: TransactionType::Expense,
            amount,
            category: category.to_string(),
            description: None,
            date,
        }
    }

    fn income(user_id: i64, amount: f64, category: &str, date: DateTime<Utc>) -> NewTransaction {
        NewTransaction {
            transaction_type: TransactionType::Income,
            ..expense(user_id, amount, category, date)
        }
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = test_conn();
        setup_database(&conn).unwrap();
        assert_eq!(count_user_transactions(&conn, 1).unwrap(), 0);
    }

    #[test]
    fn test_get_or_create_user_registers_once() {
        let conn = test_conn();

        let first = get_or_create_user(&conn, "6281234567890").unwrap();
        let second = get_or_create_user(&conn, "6281234567890").unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.language_preference, "id");
        assert_eq!(get_user(&conn, first.id).unwrap().unwrap().phone_number, "6281234567890");
        assert!(get_user_by_phone(&conn, "000").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_phone_rejected() {
        let conn = test_conn();
        create_user(&conn, "628111", Some("Budi")).unwrap();
        assert!(create_user(&conn, "628111", None).is_err());
    }

    #[test]
    fn test_transactions_round_trip_and_paging() {
        let conn = test_conn();
        let user = create_user(&conn, "628111", None).unwrap();

        for d in 1..=5 {
            insert_transaction(&conn, &expense(user.id, 1000.0 * d as f64, "Belanja", day(d))).unwrap();
        }

        let page = get_user_transactions(&conn, user.id, 2, 0).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].date, day(5));
        assert_eq!(page[0].transaction_type, TransactionType::Expense);

        let next = get_user_transactions(&conn, user.id, 2, 2).unwrap();
        assert_eq!(next[0].date, day(3));
        assert_eq!(count_user_transactions(&conn, user.id).unwrap(), 5);
    }

    #[test]
    fn test_sums_by_type_and_window() {
        let conn = test_conn();
        let user = create_user(&conn, "628111", None).unwrap();
        let other = create_user(&conn, "628222", None).unwrap();

        insert_transaction(&conn, &income(user.id, 5_000_000.0, "Gaji", day(1))).unwrap();
        insert_transaction(&conn, &expense(user.id, 200_000.0, "Transportasi", day(2))).unwrap();
        insert_transaction(&conn, &expense(user.id, 300_000.0, "Belanja", day(10))).unwrap();
        insert_transaction(&conn, &expense(other.id, 999.0, "Belanja", day(2))).unwrap();

        assert_eq!(sum_transactions(&conn, user.id, TransactionType::Income).unwrap(), 5_000_000.0);
        assert_eq!(sum_transactions(&conn, user.id, TransactionType::Expense).unwrap(), 500_000.0);

        assert_eq!(
            sum_expenses_between(&conn, user.id, ALL_CATEGORIES, day(1), day(5)).unwrap(),
            200_000.0
        );
        assert_eq!(
            sum_expenses_between(&conn, user.id, "Belanja", day(1), day(15)).unwrap(),
            300_000.0
        );
        assert_eq!(
            sum_expenses_between(&conn, user.id, "Hiburan", day(1), day(15)).unwrap(),
            0.0
        );
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let conn = test_conn();
        let user = create_user(&conn, "628111", None).unwrap();
        insert_transaction(&conn, &expense(user.id, 100.0, "Belanja", day(3))).unwrap();

        assert_eq!(sum_expenses_between(&conn, user.id, ALL_CATEGORIES, day(3), day(3)).unwrap(), 100.0);

        let since = get_transactions_since(&conn, user.id, day(3)).unwrap();
        assert_eq!(since.len(), 1);
        let since = get_transactions_since(&conn, user.id, day(3) + Duration::seconds(1)).unwrap();
        assert!(since.is_empty());
    }

    #[test]
    fn test_budgets_round_trip() {
        let conn = test_conn();
        let user = create_user(&conn, "628111", None).unwrap();

        let budget = insert_budget(
            &conn,
            &NewBudget {
                user_id: user.id,
                category: ALL_CATEGORIES.to_string(),
                amount: 2_000_000.0,
                period: Period::Month,
                period_start: day(1),
                period_end: day(1) + Period::Month.duration(),
            },
        )
        .unwrap();

        let stored = get_user_budgets(&conn, user.id).unwrap();
        assert_eq!(stored, vec![budget.clone()]);
        assert!(budget.covers("Belanja"));
        assert!(budget.is_active_at(day(15)));
        assert!(!budget.is_active_at(day(1) - Duration::days(1)));
    }

    #[test]
    fn test_notifications_unread_filter() {
        let conn = test_conn();
        let user = create_user(&conn, "628111", None).unwrap();

        let first = insert_notification(&conn, user.id, "budget_alert", "satu").unwrap();
        insert_notification(&conn, user.id, "tip", "dua").unwrap();

        assert!(mark_notification_read(&conn, first.id).unwrap());
        assert!(!mark_notification_read(&conn, 9999).unwrap());

        let all = get_user_notifications(&conn, user.id, false).unwrap();
        let unread = get_user_notifications(&conn, user.id, true).unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].message, "dua");
    }

    #[test]
    fn test_goals_round_trip() {
        let conn = test_conn();
        let user = create_user(&conn, "628111", None).unwrap();

        let goal = insert_goal(
            &conn,
            user.id,
            &NewGoal {
                name: "Dana darurat".to_string(),
                target_amount: 10_000_000.0,
                current_amount: 0.0,
                deadline: Some(day(31)),
            },
        )
        .unwrap();

        let goals = get_user_goals(&conn, user.id).unwrap();
        assert_eq!(goals, vec![goal]);
        assert_eq!(goals[0].status, "active");
    }

    #[test]
    fn test_event_log() {
        let conn = test_conn();

        let event = Event::new(
            "transaction_recorded",
            "transaction",
            "42",
            serde_json::json!({"amount": 50000.0}),
            "whatsapp",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "transaction", "42").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "transaction_recorded");
        assert_eq!(events[0].actor, "whatsapp");
        assert_eq!(events[0].data["amount"], 50000.0);
    }

    #[test]
    fn test_db_time_is_fixed_width() {
        let a = to_db_time(&Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        assert_eq!(a, "2024-01-02T03:04:05.000000Z");
    }
}
