// Process settings (environment + .env) and logging setup

use crate::config::InterpreterConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub database_path: PathBuf,
    pub web_host: String,
    pub web_port: u16,
    /// Base URL sent to users who ask for the dashboard
    pub dashboard_url: String,
    /// Optional JSON file overriding the default interpreter config
    pub interpreter_config: Option<PathBuf>,
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            database_path: PathBuf::from("financial_bot.db"),
            web_host: "0.0.0.0".to_string(),
            web_port: 8000,
            dashboard_url: "http://localhost:8000".to_string(),
            interpreter_config: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppSettings {
    /// Read settings from the environment, loading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup (environment, map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppSettings::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let web_port = match get("WEB_PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid WEB_PORT: {}", port))?,
            None => defaults.web_port,
        };

        Ok(AppSettings {
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            web_host: get("WEB_HOST").unwrap_or(defaults.web_host),
            web_port,
            dashboard_url: get("DASHBOARD_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.dashboard_url),
            interpreter_config: get("INTERPRETER_CONFIG").map(PathBuf::from),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }

    /// Interpreter config from INTERPRETER_CONFIG, or the built-in default
    pub fn load_interpreter_config(&self) -> Result<InterpreterConfig> {
        match &self.interpreter_config {
            Some(path) => InterpreterConfig::from_file(path),
            None => Ok(InterpreterConfig::default()),
        }
    }
}

/// Install the global tracing subscriber. RUST_LOG wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // A second init (tests, embedding) is not an error
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
