// 🤖 Message Bot
// Chat message → interpreter → ledger → reply text + dashboard updates
//
// The chat user never sees a storage error: failures are logged and answered
// with the generic error template.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;

use crate::db::{self, Budget, LedgerEntry, NewTransaction, Notification, TransactionType};
use crate::finance::{self, Balance};
use crate::interpreter::{CommandInterpreter, Intent, Interpretation, ParsedCommand};

/// Outgoing side of a chat channel
pub trait MessageTransport {
    fn send_message(&self, to: &str, text: &str) -> Result<()>;
}

/// Prints replies to stdout (CLI chat mode)
pub struct ConsoleTransport;

impl MessageTransport for ConsoleTransport {
    fn send_message(&self, to: &str, text: &str) -> Result<()> {
        println!("📤 [{}]\n{}\n", to, text);
        Ok(())
    }
}

/// Realtime push to open dashboards: `{"type": "...", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DashboardUpdate {
    Transaction(LedgerEntry),
    Budget(Budget),
    Balance(Balance),
    Notification(Notification),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotReply {
    /// None when the sender could not be registered
    pub user_id: Option<i64>,
    pub intent: Intent,
    pub text: String,
    pub updates: Vec<DashboardUpdate>,
}

pub struct FinanceBot {
    interpreter: Arc<CommandInterpreter>,
    dashboard_url: String,
}

impl FinanceBot {
    pub fn new(interpreter: Arc<CommandInterpreter>, dashboard_url: impl Into<String>) -> Self {
        FinanceBot {
            interpreter,
            dashboard_url: dashboard_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn interpreter(&self) -> &CommandInterpreter {
        &self.interpreter
    }

    pub fn dashboard_link(&self, user_id: i64) -> String {
        format!("{}/dashboard?user_id={}", self.dashboard_url, user_id)
    }

    pub fn handle_message(
        &self,
        conn: &Connection,
        phone: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> BotReply {
        let interpretation = self.interpreter.interpret_at(text, now);
        let intent = interpretation.intent;
        tracing::debug!(intent = %intent, "message classified");

        let user = match db::get_or_create_user(conn, phone) {
            Ok(user) => user,
            Err(e) => {
                tracing::error!(error = %e, "failed to load sender");
                return BotReply {
                    user_id: None,
                    intent,
                    text: self.interpreter.formatter().generic_error(),
                    updates: Vec::new(),
                };
            }
        };

        let (text, updates) = match self.dispatch(conn, user.id, &interpretation, text, now) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(user_id = user.id, intent = %intent, error = %e, "failed to handle message");
                (self.interpreter.formatter().generic_error(), Vec::new())
            }
        };

        BotReply {
            user_id: Some(user.id),
            intent,
            text,
            updates,
        }
    }

    fn dispatch(
        &self,
        conn: &Connection,
        user_id: i64,
        interpretation: &Interpretation,
        raw_text: &str,
        now: DateTime<Utc>,
    ) -> Result<(String, Vec<DashboardUpdate>)> {
        let formatter = self.interpreter.formatter();

        let command = match &interpretation.outcome {
            Ok(command) => command,
            Err(failure) => {
                tracing::warn!(user_id, failure = failure.code(), "could not parse message");
                return Ok((self.interpreter.reply_for(interpretation), Vec::new()));
            }
        };

        match command {
            ParsedCommand::Expense {
                amount,
                category,
                timestamp,
            }
            | ParsedCommand::Income {
                amount,
                category,
                timestamp,
            } => {
                let transaction_type = if command.intent() == Intent::Income {
                    TransactionType::Income
                } else {
                    TransactionType::Expense
                };

                let outcome = finance::record_transaction(
                    conn,
                    &NewTransaction {
                        user_id,
                        transaction_type,
                        amount: *amount,
                        category: category.clone(),
                        description: Some(raw_text.trim().to_string()),
                        date: *timestamp,
                    },
                    "whatsapp",
                )?;

                let mut text = formatter.format_command(command);
                for alert in &outcome.alerts {
                    text.push_str("\n\n");
                    text.push_str(&formatter.format_budget_alert(&alert.message));
                }

                let mut updates = vec![
                    DashboardUpdate::Transaction(outcome.entry),
                    DashboardUpdate::Balance(finance::get_balance(conn, user_id)?),
                ];
                updates.extend(outcome.alerts.into_iter().map(DashboardUpdate::Notification));

                Ok((text, updates))
            }
            ParsedCommand::Budget {
                amount,
                period,
                category,
                start,
            } => {
                let budget =
                    finance::set_budget(conn, user_id, *amount, *period, category.as_deref(), *start)?;
                Ok((
                    formatter.format_command(command),
                    vec![DashboardUpdate::Budget(budget)],
                ))
            }
            ParsedCommand::Balance => {
                let balance = finance::get_balance(conn, user_id)?;
                Ok((
                    formatter.format_balance(
                        balance.total_income,
                        balance.total_expenses,
                        balance.current_balance,
                    ),
                    Vec::new(),
                ))
            }
            ParsedCommand::Report => {
                let period = self.interpreter.report_period(raw_text);
                let report = finance::generate_report(conn, user_id, period, now)?;
                Ok((
                    formatter.format_report(
                        period,
                        report.total_income,
                        report.total_expenses,
                        &report.expense_lines(),
                    ),
                    Vec::new(),
                ))
            }
            ParsedCommand::Help => Ok((formatter.help(), Vec::new())),
            ParsedCommand::Dashboard => Ok((
                formatter.format_dashboard(&self.dashboard_link(user_id)),
                Vec::new(),
            )),
        }
    }
}

/// Send a reply back through the transport it came from
pub fn deliver(transport: &dyn MessageTransport, phone: &str, reply: &BotReply) -> Result<()> {
    transport.send_message(phone, &reply.text).map_err(|e| {
        tracing::warn!(error = %e, "failed to send reply");
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    struct RecordingTransport {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl MessageTransport for RecordingTransport {
        fn send_message(&self, to: &str, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push((to.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct FailingTransport;

    impl MessageTransport for FailingTransport {
        fn send_message(&self, _to: &str, _text: &str) -> Result<()> {
            anyhow::bail!("transport offline")
        }
    }

    fn setup() -> (Connection, FinanceBot) {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        let interpreter = CommandInterpreter::new(InterpreterConfig::default()).unwrap();
        let bot = FinanceBot::new(Arc::new(interpreter), "http://localhost:8000/");
        (conn, bot)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
    }

    const PHONE: &str = "6281234567890";

    #[test]
    fn test_storage_failure_stores_nothing() {
        let (conn, bot) = setup();
        conn.execute_batch("DROP TABLE events").unwrap();

        let reply = bot.handle_message(&conn, PHONE, "catat pengeluaran 5000 untuk Belanja", now());

        assert_eq!(reply.text, bot.interpreter().formatter().generic_error());
        assert!(reply.updates.is_empty());
        let user_id = reply.user_id.unwrap();
        assert_eq!(db::count_user_transactions(&conn, user_id).unwrap(), 0);
    }

    #[test]
    fn test_expense_recorded_with_updates() {
        let (conn, bot) = setup();

        let reply = bot.handle_message(&conn, PHONE, "catat pengeluaran 50000 untuk Belanja", now());

        assert_eq!(reply.intent, Intent::Expense);
        assert_eq!(reply.text, "✅ Pengeluaran sebesar Rp 50.000 untuk Belanja telah dicatat.");
        assert!(matches!(reply.updates[0], DashboardUpdate::Transaction(_)));
        assert!(matches!(reply.updates[1], DashboardUpdate::Balance(_)));

        let user_id = reply.user_id.unwrap();
        let stored = db::get_user_transactions(&conn, user_id, 10, 0).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].description.as_deref(), Some("catat pengeluaran 50000 untuk Belanja"));
    }

    #[test]
    fn test_budget_then_alerting_expense() {
        let (conn, bot) = setup();

        let reply = bot.handle_message(&conn, PHONE, "atur budget 100k per bulan", now());
        assert_eq!(reply.text, "✅ Budget sebesar Rp 100.000 per bulan telah diatur.");
        assert!(matches!(reply.updates[0], DashboardUpdate::Budget(_)));

        let reply = bot.handle_message(
            &conn,
            PHONE,
            "catet keluar 90k buat Belanja",
            now() + Duration::hours(1),
        );
        assert!(reply.text.contains("⚠️ Anda telah menggunakan 90.0% dari budget all"));
        assert!(reply
            .updates
            .iter()
            .any(|u| matches!(u, DashboardUpdate::Notification(_))));
    }

    #[test]
    fn test_balance_and_report_replies() {
        let (conn, bot) = setup();
        bot.handle_message(&conn, PHONE, "catat pemasukan 1000000 dari Gaji", now());
        bot.handle_message(&conn, PHONE, "catat pengeluaran 250000 untuk Tagihan", now());

        let balance = bot.handle_message(&conn, PHONE, "cek saldo", now());
        assert!(balance.text.contains("Saldo: Rp 750.000"));

        let report = bot.handle_message(&conn, PHONE, "laporan mingguan", now() + Duration::hours(1));
        assert!(report.text.starts_with("📊 *Laporan minggu*"));
        assert!(report.text.contains("- Tagihan: Rp 250.000"));
    }

    #[test]
    fn test_dashboard_link_uses_user_id() {
        let (conn, bot) = setup();
        let reply = bot.handle_message(&conn, PHONE, "buka dashboard", now());
        let user_id = reply.user_id.unwrap();

        assert_eq!(
            reply.text,
            format!(
                "Silakan akses dashboard Anda di:\nhttp://localhost:8000/dashboard?user_id={}",
                user_id
            )
        );
    }

    #[test]
    fn test_failures_and_unknown_store_nothing() {
        let (conn, bot) = setup();

        let reply = bot.handle_message(&conn, PHONE, "catat pengeluaran untuk makan", now());
        assert!(reply.text.starts_with("❌ Jumlah pengeluaran tidak ditemukan"));

        let reply = bot.handle_message(&conn, PHONE, "apa kabar", now());
        assert_eq!(reply.intent, Intent::Unknown);
        assert!(reply.text.starts_with("❓"));
        assert!(reply.updates.is_empty());

        let user_id = reply.user_id.unwrap();
        assert_eq!(db::count_user_transactions(&conn, user_id).unwrap(), 0);
    }

    #[test]
    fn test_storage_failure_becomes_generic_error() {
        let (conn, bot) = setup();
        bot.handle_message(&conn, PHONE, "bantuan", now());
        conn.execute_batch("DROP TABLE transactions").unwrap();

        let reply = bot.handle_message(&conn, PHONE, "catat pengeluaran 5000 untuk Belanja", now());
        assert_eq!(reply.text, bot.interpreter().formatter().generic_error());
        assert!(reply.updates.is_empty());
    }

    #[test]
    fn test_deliver_through_transport() {
        let (conn, bot) = setup();
        let transport = RecordingTransport {
            sent: Mutex::new(Vec::new()),
        };

        let reply = bot.handle_message(&conn, PHONE, "bantuan", now());
        deliver(&transport, PHONE, &reply).unwrap();

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, PHONE);
        assert!(sent[0].1.contains("Bantuan"));

        assert!(deliver(&FailingTransport, PHONE, &reply).is_err());
    }

    #[test]
    fn test_update_wire_format() {
        let update = DashboardUpdate::Balance(Balance {
            total_income: 10.0,
            total_expenses: 4.0,
            current_balance: 6.0,
        });
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(json["type"], "balance");
        assert_eq!(json["data"]["current_balance"], 6.0);
    }
}
