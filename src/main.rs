use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use wa_finance_bot::{
    db, deliver, init_tracing, AppSettings, CommandInterpreter, ConsoleTransport, FinanceBot,
    InterpreterConfig,
};

#[derive(Parser)]
#[command(name = "wa-finance-bot", version, about = "Personal finance bot for chat commands")]
struct Cli {
    /// SQLite database (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,
    /// Interactive chat session on the console
    Chat {
        #[arg(long)]
        phone: String,
    },
    /// Send one message and print the reply
    Send {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        text: String,
    },
    /// Validate an interpreter config file
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Terminal dashboard for one user
    Dashboard {
        #[arg(long)]
        phone: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = AppSettings::from_env()?;
    if let Some(path) = cli.database {
        settings.database_path = path;
    }
    init_tracing(&settings.log_level);

    match cli.command {
        Command::Init => run_init(&settings),
        Command::Chat { phone } => run_chat(&settings, &phone),
        Command::Send { phone, text } => run_send(&settings, &phone, &text),
        Command::CheckConfig { config } => run_check_config(&settings, config),
        Command::Dashboard { phone } => run_dashboard(&settings, &phone),
    }
}

fn build_bot(settings: &AppSettings) -> Result<FinanceBot> {
    let config = settings.load_interpreter_config()?;
    let interpreter = CommandInterpreter::new(config).context("Invalid interpreter config")?;
    Ok(FinanceBot::new(Arc::new(interpreter), settings.dashboard_url.clone()))
}

fn run_init(settings: &AppSettings) -> Result<()> {
    println!("🗄️  Initializing database");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    db::open_database(&settings.database_path)?;

    println!("✓ Schema ready at {}", settings.database_path.display());
    println!("✓ WAL mode enabled");
    Ok(())
}

fn run_chat(settings: &AppSettings, phone: &str) -> Result<()> {
    let conn = db::open_database(&settings.database_path)?;
    let bot = build_bot(settings)?;
    let transport = ConsoleTransport;

    println!("💬 Chatting as {} (empty line or Ctrl-D to quit)\n", phone);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("📥 > ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if line.trim().is_empty() {
            break;
        }

        let reply = bot.handle_message(&conn, phone, &line, Utc::now());
        if let Err(e) = deliver(&transport, phone, &reply) {
            tracing::warn!(error = %e, "failed to deliver reply");
        }
    }

    println!("\n👋 Bye");
    Ok(())
}

fn run_send(settings: &AppSettings, phone: &str, text: &str) -> Result<()> {
    let conn = db::open_database(&settings.database_path)?;
    let bot = build_bot(settings)?;

    let reply = bot.handle_message(&conn, phone, text, Utc::now());
    deliver(&ConsoleTransport, phone, &reply)
}

fn run_check_config(settings: &AppSettings, path: Option<PathBuf>) -> Result<()> {
    println!("🔍 Checking interpreter config");

    let config = match path.or_else(|| settings.interpreter_config.clone()) {
        Some(path) => {
            println!("📂 {}", path.display());
            InterpreterConfig::from_file(&path)?
        }
        None => {
            println!("📂 built-in default");
            InterpreterConfig::default()
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    println!("✓ {} intents", config.intents.len());
    println!("✓ {} expense categories", config.expense_categories.len());
    println!("✓ {} income categories", config.income_categories.len());
    println!("✓ {} vocabulary entries", config.vocabulary.len());
    println!("✅ Config is valid");
    Ok(())
}

#[cfg(feature = "tui")]
fn run_dashboard(settings: &AppSettings, phone: &str) -> Result<()> {
    println!("🖥️  Loading dashboard...\n");

    let conn = db::open_database(&settings.database_path)?;
    let user = match db::get_user_by_phone(&conn, phone)? {
        Some(user) => user,
        None => {
            eprintln!("❌ No user with phone {}", phone);
            eprintln!("   Send a message first: wa-finance-bot send --phone {} --text bantuan", phone);
            std::process::exit(1);
        }
    };

    let currency = settings.load_interpreter_config()?.currency;
    let mut app = wa_finance_bot::ui::DashboardApp::load(&conn, user)?.with_currency(currency);

    println!("✓ Loaded {} transactions", app.entries.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    wa_finance_bot::ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_dashboard(_settings: &AppSettings, _phone: &str) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the web dashboard: cargo run --bin wa-finance-server --features server");
    std::process::exit(1);
}
