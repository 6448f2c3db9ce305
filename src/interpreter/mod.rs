// 🗣️ Command Interpreter
// Free-text chat message → (Intent, ParsedCommand | ParseFailure)
//
// Pipeline (all stages pure, all operate on the normalized text):
//   1. Normalizer   - "catet keluar 50k buat makan" → "catat pengeluaran 50000 untuk makan"
//   2. Classifier   - prefix match in priority order → Intent
//   3. Extractor    - amount / category / period per intent
//   4. Formatter    - reply text + currency

pub mod classifier;
pub mod extractor;
pub mod formatter;
pub mod normalizer;

use crate::config::InterpreterConfig;
use crate::error::{ConfigError, ParseFailure};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use classifier::IntentClassifier;
pub use extractor::{extract_amount, FieldExtractor};
pub use formatter::{format_currency, ResponseFormatter};
pub use normalizer::Normalizer;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Intent - classified command category of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Expense,
    Income,
    Balance,
    Report,
    Budget,
    Help,
    Dashboard,
    Unknown,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::Expense => "expense",
            Intent::Income => "income",
            Intent::Balance => "balance",
            Intent::Report => "report",
            Intent::Budget => "budget",
            Intent::Help => "help",
            Intent::Dashboard => "dashboard",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Budget / report window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }

    /// Accepts both "month" and the dashboard's "monthly" spelling
    pub fn parse(value: &str) -> Option<Period> {
        match value.trim().to_lowercase().as_str() {
            "day" | "daily" => Some(Period::Day),
            "week" | "weekly" => Some(Period::Week),
            "month" | "monthly" => Some(Period::Month),
            "year" | "yearly" => Some(Period::Year),
            _ => None,
        }
    }

    /// Fixed window length (a month is 30 days, a year 365)
    pub fn duration(&self) -> Duration {
        match self {
            Period::Day => Duration::days(1),
            Period::Week => Duration::weeks(1),
            Period::Month => Duration::days(30),
            Period::Year => Duration::days(365),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ParsedCommand - structured result of a recognized message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ParsedCommand {
    Expense {
        amount: f64,
        category: String,
        timestamp: DateTime<Utc>,
    },
    Income {
        amount: f64,
        category: String,
        timestamp: DateTime<Utc>,
    },
    Budget {
        amount: f64,
        period: Period,
        /// None = budget covers all expenses
        category: Option<String>,
        start: DateTime<Utc>,
    },
    Balance,
    Report,
    Help,
    Dashboard,
}

impl ParsedCommand {
    pub fn intent(&self) -> Intent {
        match self {
            ParsedCommand::Expense { .. } => Intent::Expense,
            ParsedCommand::Income { .. } => Intent::Income,
            ParsedCommand::Budget { .. } => Intent::Budget,
            ParsedCommand::Balance => Intent::Balance,
            ParsedCommand::Report => Intent::Report,
            ParsedCommand::Help => Intent::Help,
            ParsedCommand::Dashboard => Intent::Dashboard,
        }
    }
}

/// Result of interpreting one message
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub intent: Intent,
    /// Text after informal normalization (what the extractors saw)
    pub normalized: String,
    pub outcome: Result<ParsedCommand, ParseFailure>,
}

impl Interpretation {
    pub fn is_unknown(&self) -> bool {
        self.intent == Intent::Unknown
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

/// CommandInterpreter - built once per process from an immutable config
///
/// Holds only compiled patterns and read-only tables, so a single instance can
/// be shared (`Arc<CommandInterpreter>`) by any number of callers.
pub struct CommandInterpreter {
    config: InterpreterConfig,
    normalizer: Normalizer,
    classifier: IntentClassifier,
    extractor: FieldExtractor,
    formatter: ResponseFormatter,
}

impl CommandInterpreter {
    /// Validate the config and compile every pattern up front
    pub fn new(config: InterpreterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let normalizer = Normalizer::new(&config.vocabulary)?;
        let classifier = IntentClassifier::new(&config.intents);
        let extractor = FieldExtractor::new(&config)?;
        let formatter = ResponseFormatter::new(&config);

        Ok(CommandInterpreter {
            config,
            normalizer,
            classifier,
            extractor,
            formatter,
        })
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn formatter(&self) -> &ResponseFormatter {
        &self.formatter
    }

    pub fn normalize(&self, text: &str) -> String {
        self.normalizer.normalize(text)
    }

    /// Classify raw text (normalizes first)
    pub fn classify(&self, text: &str) -> Intent {
        self.classifier.classify(&self.normalize(text))
    }

    /// Interpret with the current time as capture time
    pub fn interpret(&self, text: &str) -> Interpretation {
        self.interpret_at(text, Utc::now())
    }

    /// Interpret with an explicit capture time
    pub fn interpret_at(&self, text: &str, now: DateTime<Utc>) -> Interpretation {
        let normalized = self.normalizer.normalize(text);
        let intent = self.classifier.classify(&normalized);
        let body = normalized.trim();

        let outcome = match intent {
            Intent::Expense | Intent::Income => self.parse_transaction(body, intent, now),
            Intent::Budget => self.parse_budget(body, now),
            Intent::Balance => Ok(ParsedCommand::Balance),
            Intent::Report => Ok(ParsedCommand::Report),
            Intent::Help => Ok(ParsedCommand::Help),
            Intent::Dashboard => Ok(ParsedCommand::Dashboard),
            Intent::Unknown => Err(ParseFailure::UnrecognizedIntent),
        };

        if let Err(failure) = &outcome {
            tracing::debug!(intent = %intent, failure = failure.code(), "message not parsed");
        }

        Interpretation {
            intent,
            normalized,
            outcome,
        }
    }

    /// Period requested by a report message ("laporan mingguan"), month by default
    pub fn report_period(&self, text: &str) -> Period {
        self.extractor.extract_report_period(&self.normalize(text))
    }

    /// Reply text for an interpretation that needs no stored data
    pub fn reply_for(&self, interpretation: &Interpretation) -> String {
        self.formatter.format_interpretation(interpretation)
    }

    fn parse_transaction(
        &self,
        text: &str,
        intent: Intent,
        now: DateTime<Utc>,
    ) -> Result<ParsedCommand, ParseFailure> {
        let amount = extract_amount(text).ok_or(ParseFailure::MissingAmount(intent))?;
        let raw_category = self
            .extractor
            .extract_category(text, intent)
            .ok_or(ParseFailure::MissingCategory(intent))?;
        let category = self.extractor.validate_category(&raw_category, intent);

        Ok(match intent {
            Intent::Income => ParsedCommand::Income {
                amount,
                category,
                timestamp: now,
            },
            _ => ParsedCommand::Expense {
                amount,
                category,
                timestamp: now,
            },
        })
    }

    fn parse_budget(&self, text: &str, now: DateTime<Utc>) -> Result<ParsedCommand, ParseFailure> {
        let amount = extract_amount(text).ok_or(ParseFailure::MissingAmount(Intent::Budget))?;
        let period = self
            .extractor
            .extract_period(text)
            .ok_or(ParseFailure::MissingPeriod)?;
        let category = self
            .extractor
            .extract_budget_category(text)
            .map(|raw| self.extractor.validate_category(&raw, Intent::Expense));

        Ok(ParsedCommand::Budget {
            amount,
            period,
            category,
            start: now,
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn interpreter() -> CommandInterpreter {
        CommandInterpreter::new(InterpreterConfig::default()).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_expense_unknown_category_falls_back() {
        let result = interpreter().interpret_at("catat pengeluaran 50000 untuk makan", fixed_now());

        assert_eq!(result.intent, Intent::Expense);
        assert_eq!(
            result.outcome,
            Ok(ParsedCommand::Expense {
                amount: 50000.0,
                category: "Lainnya".to_string(),
                timestamp: fixed_now(),
            })
        );
    }

    #[test]
    fn test_expense_exact_category_passes_through() {
        let result = interpreter()
            .interpret_at("catat pengeluaran 75000 untuk Makanan & Minuman", fixed_now());

        match result.outcome {
            Ok(ParsedCommand::Expense { amount, category, .. }) => {
                assert_eq!(amount, 75000.0);
                assert_eq!(category, "Makanan & Minuman");
            }
            other => panic!("expected expense, got {:?}", other),
        }
    }

    #[test]
    fn test_expense_missing_amount() {
        let result = interpreter().interpret("catat pengeluaran untuk makan");

        assert_eq!(result.intent, Intent::Expense);
        assert_eq!(result.outcome, Err(ParseFailure::MissingAmount(Intent::Expense)));
    }

    #[test]
    fn test_expense_missing_category() {
        let result = interpreter().interpret("catat pengeluaran 50000");
        assert_eq!(result.outcome, Err(ParseFailure::MissingCategory(Intent::Expense)));
    }

    #[test]
    fn test_income_uses_from_connector() {
        let result = interpreter().interpret_at("catat pemasukan 1000000 dari Gaji", fixed_now());

        assert_eq!(
            result.outcome,
            Ok(ParsedCommand::Income {
                amount: 1000000.0,
                category: "Gaji".to_string(),
                timestamp: fixed_now(),
            })
        );
    }

    #[test]
    fn test_income_category_is_case_sensitive() {
        let result = interpreter().interpret("catat pemasukan 1000000 dari gaji");

        match result.outcome {
            Ok(ParsedCommand::Income { category, .. }) => assert_eq!(category, "Lainnya"),
            other => panic!("expected income, got {:?}", other),
        }
    }

    #[test]
    fn test_budget_per_month() {
        let result = interpreter().interpret_at("atur budget 2000000 per bulan", fixed_now());

        assert_eq!(result.intent, Intent::Budget);
        assert_eq!(
            result.outcome,
            Ok(ParsedCommand::Budget {
                amount: 2_000_000.0,
                period: Period::Month,
                category: None,
                start: fixed_now(),
            })
        );
    }

    #[test]
    fn test_budget_with_category() {
        let result = interpreter().interpret("atur budget 500000 untuk Transportasi per minggu");

        match result.outcome {
            Ok(ParsedCommand::Budget { amount, period, category, .. }) => {
                assert_eq!(amount, 500000.0);
                assert_eq!(period, Period::Week);
                assert_eq!(category, Some("Transportasi".to_string()));
            }
            other => panic!("expected budget, got {:?}", other),
        }
    }

    #[test]
    fn test_budget_category_after_period() {
        let result = interpreter().interpret("atur budget 2jt per bulan untuk Belanja");

        match result.outcome {
            Ok(ParsedCommand::Budget { amount, period, category, .. }) => {
                assert_eq!(amount, 2_000_000.0);
                assert_eq!(period, Period::Month);
                assert_eq!(category, Some("Belanja".to_string()));
            }
            other => panic!("expected budget, got {:?}", other),
        }
    }

    #[test]
    fn test_budget_missing_period() {
        let result = interpreter().interpret("atur budget 2000000");
        assert_eq!(result.outcome, Err(ParseFailure::MissingPeriod));

        let result = interpreter().interpret("atur budget 2000000 per dekade");
        assert_eq!(result.outcome, Err(ParseFailure::MissingPeriod));
    }

    #[test]
    fn test_informal_message_end_to_end() {
        let result = interpreter().interpret_at("catet keluar 50k buat makan", fixed_now());

        assert_eq!(result.normalized, "catat pengeluaran 50000 untuk makan");
        assert_eq!(result.intent, Intent::Expense);
        match result.outcome {
            Ok(ParsedCommand::Expense { amount, .. }) => assert_eq!(amount, 50000.0),
            other => panic!("expected expense, got {:?}", other),
        }
    }

    #[test]
    fn test_shorthand_amounts_keep_their_value() {
        let interpreter = interpreter();
        let amount_of = |text: &str| match interpreter.interpret_at(text, fixed_now()).outcome {
            Ok(ParsedCommand::Expense { amount, .. }) | Ok(ParsedCommand::Income { amount, .. }) => amount,
            other => panic!("expected transaction, got {:?}", other),
        };

        assert_eq!(amount_of("catat pengeluaran 1.5k untuk Belanja"), 1500.0);
        assert_eq!(amount_of("catat pengeluaran 50rb untuk Belanja"), 50000.0);
        assert_eq!(amount_of("catat pemasukan 2 jt dari Gaji"), 2_000_000.0);
        assert_eq!(amount_of("catat pemasukan 2.5m dari Gaji"), 2_500_000.0);
    }

    #[test]
    fn test_bare_informal_verb_still_classifies() {
        // "keluar ..." normalizes to "pengeluaran ...", which is a configured prefix
        let result = interpreter().interpret("keluar 20k buat parkir");
        assert_eq!(result.intent, Intent::Expense);

        let result = interpreter().interpret("masuk 2m dr Bonus");
        assert_eq!(result.intent, Intent::Income);
        match result.outcome {
            Ok(ParsedCommand::Income { amount, category, .. }) => {
                assert_eq!(amount, 2_000_000.0);
                assert_eq!(category, "Bonus");
            }
            other => panic!("expected income, got {:?}", other),
        }
    }

    #[test]
    fn test_fieldless_intents() {
        let interpreter = interpreter();

        assert_eq!(interpreter.interpret("cek saldo").outcome, Ok(ParsedCommand::Balance));
        assert_eq!(interpreter.interpret("laporan bulanan").outcome, Ok(ParsedCommand::Report));
        assert_eq!(interpreter.interpret("bantuan").outcome, Ok(ParsedCommand::Help));
        assert_eq!(interpreter.interpret("buka dashboard").outcome, Ok(ParsedCommand::Dashboard));
    }

    #[test]
    fn test_unknown_text() {
        let result = interpreter().interpret("apa kabar");

        assert!(result.is_unknown());
        assert_eq!(result.outcome, Err(ParseFailure::UnrecognizedIntent));
    }

    #[test]
    fn test_classification_ignores_case_and_leading_space() {
        let result = interpreter().interpret("   CATAT Pengeluaran 10000 untuk Belanja");

        assert_eq!(result.intent, Intent::Expense);
        match result.outcome {
            Ok(ParsedCommand::Expense { category, .. }) => assert_eq!(category, "Belanja"),
            other => panic!("expected expense, got {:?}", other),
        }
    }

    #[test]
    fn test_report_period_detection() {
        let interpreter = interpreter();

        assert_eq!(interpreter.report_period("laporan mingguan"), Period::Week);
        assert_eq!(interpreter.report_period("laporan per thn"), Period::Year);
        assert_eq!(interpreter.report_period("laporan"), Period::Month);
    }

    #[test]
    fn test_reply_for_expense() {
        let interpreter = interpreter();
        let result = interpreter.interpret("catat pengeluaran 50000 untuk makan");

        assert_eq!(
            interpreter.reply_for(&result),
            "✅ Pengeluaran sebesar Rp 50.000 untuk Lainnya telah dicatat."
        );
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = InterpreterConfig::default();
        config.intents[0].prefixes.clear();

        assert!(CommandInterpreter::new(config).is_err());
    }

    #[test]
    fn test_period_parse_and_duration() {
        assert_eq!(Period::parse("monthly"), Some(Period::Month));
        assert_eq!(Period::parse("Week"), Some(Period::Week));
        assert_eq!(Period::parse("fortnight"), None);
        assert_eq!(Period::Month.duration(), Duration::days(30));
        assert_eq!(Period::Year.duration(), Duration::days(365));
    }
}
