// 🔎 Field Extractor
// Amount, category and period extraction over NORMALIZED text
//
// Each rule is a separate pure function so it can be tested on its own:
//   extract_amount          "catat pengeluaran 50000 untuk makan" → 50000.0
//   extract_category        "... untuk makan"                     → "makan"
//   validate_category       "makan"                               → "Lainnya"
//   extract_period          "... per bulan"                       → Month
//   extract_budget_category "... untuk Belanja per bulan"         → "Belanja"
//                           "... per bulan untuk Belanja"         → "Belanja"
//   extract_report_period   "laporan mingguan"                    → Week

use crate::config::{InterpreterConfig, PeriodToken};
use crate::error::ConfigError;
use crate::interpreter::{Intent, Period};
use regex::Regex;
use std::sync::OnceLock;

// ============================================================================
// AMOUNT
// ============================================================================

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("static amount pattern"))
}

/// First unsigned decimal in the text. None when absent, unparsable or zero.
pub fn extract_amount(text: &str) -> Option<f64> {
    let matched = amount_pattern().find(text)?;
    let amount: f64 = matched.as_str().parse().ok()?;

    if amount.is_finite() && amount > 0.0 {
        Some(amount)
    } else {
        None
    }
}

// ============================================================================
// FIELD EXTRACTOR
// ============================================================================

pub struct FieldExtractor {
    expense_category: Regex,
    income_category: Regex,
    budget_category: Regex,
    period: Regex,
    report_period: Option<Regex>,
    periods: Vec<PeriodToken>,
    report_periods: Vec<PeriodToken>,
    expense_categories: Vec<String>,
    income_categories: Vec<String>,
    fallback_category: String,
}

/// "a|b|c" alternation over escaped tokens
fn token_alternation(tokens: &[PeriodToken]) -> String {
    tokens
        .iter()
        .map(|t| regex::escape(t.token.trim()))
        .collect::<Vec<_>>()
        .join("|")
}

/// Connector followed by text up to end of string or the next delimiter
fn category_pattern(connector: &str) -> Result<Regex, ConfigError> {
    let pattern = format!(r"(?i)\b{}\s+([^,;\n]+)", regex::escape(connector.trim()));
    Ok(Regex::new(&pattern)?)
}

fn lookup_period(tokens: &[PeriodToken], word: &str) -> Option<Period> {
    tokens
        .iter()
        .find(|t| t.token.trim().eq_ignore_ascii_case(word))
        .map(|t| t.period)
}

impl FieldExtractor {
    pub fn new(config: &InterpreterConfig) -> Result<Self, ConfigError> {
        let keyword = regex::escape(config.period_keyword.trim());

        let period = Regex::new(&format!(
            r"(?i)\b{}\s+({})\b",
            keyword,
            token_alternation(&config.periods)
        ))?;

        let report_period = if config.report_periods.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(
                r"(?i)\b({})\b",
                token_alternation(&config.report_periods)
            ))?)
        };

        let budget_category = Regex::new(&format!(
            r"(?i)\b{}\s+([^,;\n]+?)\s+{}\b",
            regex::escape(config.expense_connector.trim()),
            keyword
        ))?;

        Ok(FieldExtractor {
            expense_category: category_pattern(&config.expense_connector)?,
            income_category: category_pattern(&config.income_connector)?,
            budget_category,
            period,
            report_period,
            periods: config.periods.clone(),
            report_periods: config.report_periods.clone(),
            expense_categories: config.expense_categories.clone(),
            income_categories: config.income_categories.clone(),
            fallback_category: config.fallback_category.clone(),
        })
    }

    /// Raw category text after the intent's connector ("untuk" / "dari")
    pub fn extract_category(&self, text: &str, intent: Intent) -> Option<String> {
        let pattern = match intent {
            Intent::Income => &self.income_category,
            _ => &self.expense_category,
        };

        let captured = pattern.captures(text)?.get(1)?.as_str().trim();
        if captured.is_empty() {
            None
        } else {
            Some(captured.to_string())
        }
    }

    /// Exact, case-sensitive membership; anything else becomes the fallback
    pub fn validate_category(&self, category: &str, intent: Intent) -> String {
        let allowed = match intent {
            Intent::Income => &self.income_categories,
            _ => &self.expense_categories,
        };

        if allowed.iter().any(|c| c == category) {
            category.to_string()
        } else {
            self.fallback_category.clone()
        }
    }

    /// "per <token>" → Period
    pub fn extract_period(&self, text: &str) -> Option<Period> {
        let token = self.period.captures(text)?.get(1)?.as_str();
        lookup_period(&self.periods, token)
    }

    /// Optional category in a budget command, either before the period
    /// ("untuk <category> per <period>") or after it ("per <period> untuk <category>")
    pub fn extract_budget_category(&self, text: &str) -> Option<String> {
        let caps = self
            .budget_category
            .captures(text)
            .or_else(|| self.expense_category.captures(text))?;
        let captured = caps.get(1)?.as_str().trim();
        if captured.is_empty() {
            None
        } else {
            Some(captured.to_string())
        }
    }

    /// Report window: adjective ("mingguan"), then "per <token>", else a month
    pub fn extract_report_period(&self, text: &str) -> Period {
        self.report_period
            .as_ref()
            .and_then(|pattern| pattern.captures(text))
            .and_then(|caps| caps.get(1))
            .and_then(|m| lookup_period(&self.report_periods, m.as_str()))
            .or_else(|| self.extract_period(text))
            .unwrap_or(Period::Month)
    }
}
