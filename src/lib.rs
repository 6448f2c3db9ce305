// WhatsApp Finance Bot - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod error;
pub mod interpreter;
pub mod db;
pub mod finance;
pub mod bot;
pub mod settings;

#[cfg(feature = "server")]
pub mod realtime;

#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use config::{CurrencyFormat, InterpreterConfig, MessageTemplates};
pub use error::{ConfigError, ParseFailure};
pub use interpreter::{
    CommandInterpreter, Intent, Interpretation, ParsedCommand, Period,
    ResponseFormatter, format_currency,
};
pub use db::{
    User, LedgerEntry, NewTransaction, TransactionType, Budget, Notification,
    FinancialGoal, NewGoal, Event,
    open_database, setup_database, get_or_create_user, insert_event, get_events_for_entity,
};
pub use finance::{Balance, BudgetStatus, FinancialReport, Insight, InsightKind};
pub use bot::{BotReply, ConsoleTransport, DashboardUpdate, FinanceBot, MessageTransport, deliver};
pub use settings::{AppSettings, init_tracing};

#[cfg(feature = "server")]
pub use realtime::UpdateHub;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
