// ⚙️ Interpreter Configuration - Commands as Data
// Prefix tables, category lists, vocabulary and message templates
//
// Everything the interpreter knows about the locale lives here. The default
// value is the Indonesian locale; a JSON file can override any part of it.

use crate::error::ConfigError;
use crate::interpreter::{Intent, Period};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// CONFIG ENTRIES
// ============================================================================

/// Prefix set for one intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPrefixes {
    pub intent: Intent,
    pub prefixes: Vec<String>,
}

/// Word that names a period (e.g. "bulan" → Month)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodToken {
    pub token: String,
    pub period: Period,
}

/// Informal word and its formal replacement (e.g. "catet" → "catat")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub informal: String,
    pub formal: String,
}

/// How amounts are rendered: "Rp 1.000.000"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyFormat {
    pub symbol: String,
    /// Text between symbol and digits
    pub symbol_separator: String,
    pub thousands_separator: String,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        CurrencyFormat {
            symbol: "Rp".to_string(),
            symbol_separator: " ".to_string(),
            thousands_separator: ".".to_string(),
        }
    }
}

/// Subject word and example command shown when a command is malformed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageHint {
    pub intent: Intent,
    pub subject: String,
    pub example: String,
}

/// Reply templates. Placeholders are written as `{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    /// {amount} {category}
    pub expense_recorded: String,
    /// {amount} {category}
    pub income_recorded: String,
    /// {amount} {period}
    pub budget_set: String,
    /// {amount} {category} {period}
    pub category_budget_set: String,
    /// {income} {expenses} {balance}
    pub balance: String,
    /// {period} {income} {expenses} {net}
    pub report: String,
    /// {category} {amount}
    pub report_line: String,
    pub report_empty: String,
    pub help: String,
    /// {url}
    pub dashboard: String,
    /// {message}
    pub budget_alert: String,
    pub unknown: String,
    pub generic_error: String,
    /// {subject} {example}
    pub missing_amount: String,
    /// {subject} {example}
    pub missing_category: String,
    /// {subject} {example}
    pub missing_period: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        MessageTemplates {
            expense_recorded: "✅ Pengeluaran sebesar {amount} untuk {category} telah dicatat.".to_string(),
            income_recorded: "✅ Pemasukan sebesar {amount} dari {category} telah dicatat.".to_string(),
            budget_set: "✅ Budget sebesar {amount} per {period} telah diatur.".to_string(),
            category_budget_set: "✅ Budget {category} sebesar {amount} per {period} telah diatur.".to_string(),
            balance: "💰 *Saldo Anda*\nPemasukan: {income}\nPengeluaran: {expenses}\nSaldo: {balance}".to_string(),
            report: "📊 *Laporan {period}*\nPemasukan: {income}\nPengeluaran: {expenses}\nSelisih: {net}".to_string(),
            report_line: "- {category}: {amount}".to_string(),
            report_empty: "Belum ada transaksi pada periode ini.".to_string(),
            help: [
                "*Financial Planner Bot - Bantuan*",
                "",
                "Perintah yang tersedia:",
                "1. Catat pengeluaran: \"catat pengeluaran <jumlah> untuk <kategori>\"",
                "2. Catat pemasukan: \"catat pemasukan <jumlah> dari <kategori>\"",
                "3. Cek saldo: \"cek saldo\"",
                "4. Laporan: \"laporan\"",
                "5. Atur budget: \"atur budget <jumlah> per <periode>\"",
                "6. Buka dashboard: \"buka dashboard\"",
                "",
                "Contoh:",
                "- catat pengeluaran 50000 untuk makan",
                "- catat pemasukan 1000000 dari gaji",
                "- cek saldo",
                "- laporan bulanan",
                "- atur budget 2000000 per bulan",
            ]
            .join("\n"),
            dashboard: "Silakan akses dashboard Anda di:\n{url}".to_string(),
            budget_alert: "⚠️ {message}".to_string(),
            unknown: "❓ Perintah tidak dikenali. Ketik 'bantuan' untuk melihat daftar perintah.".to_string(),
            generic_error: "❌ Maaf, terjadi kesalahan. Silakan coba lagi.".to_string(),
            missing_amount: "❌ Jumlah {subject} tidak ditemukan. Contoh: {example}".to_string(),
            missing_category: "❌ Kategori {subject} tidak ditemukan. Contoh: {example}".to_string(),
            missing_period: "❌ Periode {subject} tidak ditemukan. Contoh: {example}".to_string(),
        }
    }
}

// ============================================================================
// INTERPRETER CONFIG
// ============================================================================

/// Immutable configuration for one CommandInterpreter
///
/// Intent order in `intents` is the classification priority: when two
/// prefix sets both match a text, the intent listed first wins, regardless of
/// prefix length. List the more specific intent first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub intents: Vec<IntentPrefixes>,
    pub expense_categories: Vec<String>,
    pub income_categories: Vec<String>,
    pub fallback_category: String,
    /// Keyword before an expense category ("untuk")
    pub expense_connector: String,
    /// Keyword before an income source ("dari")
    pub income_connector: String,
    /// Keyword before a budget period ("per")
    pub period_keyword: String,
    pub periods: Vec<PeriodToken>,
    /// Adjectives used in report requests ("laporan bulanan")
    pub report_periods: Vec<PeriodToken>,
    /// Applied in order, whole-word
    pub vocabulary: Vec<VocabularyEntry>,
    pub currency: CurrencyFormat,
    pub messages: MessageTemplates,
    pub usage: Vec<UsageHint>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn prefixes(intent: Intent, items: &[&str]) -> IntentPrefixes {
    IntentPrefixes {
        intent,
        prefixes: strings(items),
    }
}

fn period(token: &str, period: Period) -> PeriodToken {
    PeriodToken {
        token: token.to_string(),
        period,
    }
}

fn word(informal: &str, formal: &str) -> VocabularyEntry {
    VocabularyEntry {
        informal: informal.to_string(),
        formal: formal.to_string(),
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            intents: vec![
                prefixes(
                    Intent::Expense,
                    &["catat pengeluaran", "tambah pengeluaran", "pengeluaran", "keluar"],
                ),
                prefixes(
                    Intent::Income,
                    &["catat pemasukan", "tambah pemasukan", "pemasukan", "masuk"],
                ),
                prefixes(Intent::Balance, &["cek saldo", "saldo", "balance"]),
                prefixes(Intent::Report, &["laporan", "report"]),
                prefixes(Intent::Budget, &["atur budget", "set budget"]),
                prefixes(Intent::Help, &["bantuan", "help", "tolong"]),
                prefixes(Intent::Dashboard, &["buka dashboard", "dashboard"]),
            ],
            expense_categories: strings(&[
                "Makanan & Minuman",
                "Transportasi",
                "Belanja",
                "Hiburan",
                "Kesehatan",
                "Pendidikan",
                "Tagihan",
                "Lainnya",
            ]),
            income_categories: strings(&["Gaji", "Bonus", "Investasi", "Bisnis", "Lainnya"]),
            fallback_category: "Lainnya".to_string(),
            expense_connector: "untuk".to_string(),
            income_connector: "dari".to_string(),
            period_keyword: "per".to_string(),
            periods: vec![
                period("hari", Period::Day),
                period("minggu", Period::Week),
                period("bulan", Period::Month),
                period("tahun", Period::Year),
            ],
            report_periods: vec![
                period("harian", Period::Day),
                period("mingguan", Period::Week),
                period("bulanan", Period::Month),
                period("tahunan", Period::Year),
            ],
            vocabulary: vec![
                word("catet", "catat"),
                word("duit", "uang"),
                word("keluar", "pengeluaran"),
                word("masuk", "pemasukan"),
                word("buat", "untuk"),
                word("dr", "dari"),
                word("utk", "untuk"),
                word("rb", "ribu"),
                word("jt", "juta"),
                word("bln", "bulan"),
                word("mgg", "minggu"),
                word("thn", "tahun"),
            ],
            currency: CurrencyFormat::default(),
            messages: MessageTemplates::default(),
            usage: vec![
                UsageHint {
                    intent: Intent::Expense,
                    subject: "pengeluaran".to_string(),
                    example: "catat pengeluaran 50000 untuk makan".to_string(),
                },
                UsageHint {
                    intent: Intent::Income,
                    subject: "pemasukan".to_string(),
                    example: "catat pemasukan 1000000 dari gaji".to_string(),
                },
                UsageHint {
                    intent: Intent::Budget,
                    subject: "budget".to_string(),
                    example: "atur budget 2000000 per bulan".to_string(),
                },
            ],
        }
    }
}

impl InterpreterConfig {
    /// Load config from a JSON file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read interpreter config: {:?}", path.as_ref()))?;

        let config: InterpreterConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse interpreter config JSON: {:?}", path.as_ref()))?;

        Ok(config)
    }

    /// Startup validation. A config that passes never causes a per-message fault.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.intents.is_empty() {
            return Err(ConfigError::NoIntents);
        }

        let mut seen = HashSet::new();
        for entry in &self.intents {
            if entry.intent == Intent::Unknown {
                return Err(ConfigError::UnknownConfigured(entry.intent));
            }
            if !seen.insert(entry.intent) {
                return Err(ConfigError::DuplicateIntent(entry.intent));
            }
            if entry.prefixes.is_empty() {
                return Err(ConfigError::EmptyPrefixes(entry.intent));
            }
            if entry.prefixes.iter().any(|p| p.trim().is_empty()) {
                return Err(ConfigError::BlankPrefix(entry.intent));
            }
        }

        for (list, categories) in [
            ("expense", &self.expense_categories),
            ("income", &self.income_categories),
        ] {
            if categories.is_empty() {
                return Err(ConfigError::EmptyCategories(list));
            }
            if !categories.contains(&self.fallback_category) {
                return Err(ConfigError::FallbackNotListed {
                    list,
                    fallback: self.fallback_category.clone(),
                });
            }
        }

        for (name, keyword) in [
            ("expense connector", &self.expense_connector),
            ("income connector", &self.income_connector),
            ("period", &self.period_keyword),
        ] {
            if keyword.trim().is_empty() {
                return Err(ConfigError::BlankKeyword(name));
            }
        }

        if self.periods.is_empty() || self.periods.iter().any(|p| p.token.trim().is_empty()) {
            return Err(ConfigError::NoPeriods);
        }

        let informal: HashSet<String> = self
            .vocabulary
            .iter()
            .map(|entry| entry.informal.to_lowercase())
            .collect();
        for entry in &self.vocabulary {
            if entry.informal.trim().is_empty() || entry.formal.trim().is_empty() {
                return Err(ConfigError::BlankVocabulary);
            }
            if informal.contains(&entry.formal.to_lowercase()) {
                return Err(ConfigError::ChainedVocabulary(entry.formal.clone()));
            }
        }

        if self.currency.symbol.is_empty() {
            return Err(ConfigError::EmptyCurrencySymbol);
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
