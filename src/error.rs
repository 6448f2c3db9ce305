// ⚠️ Error Types
// Parse failures are expected, user-correctable outcomes (values, not faults).
// Config errors are caught once at startup, never per message.

use crate::interpreter::Intent;
use thiserror::Error;

/// Why a classified command could not be turned into a ParsedCommand
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no amount found in {0} command")]
    MissingAmount(Intent),

    #[error("no category found in {0} command")]
    MissingCategory(Intent),

    #[error("no period found in budget command")]
    MissingPeriod,

    #[error("message matched no command prefix")]
    UnrecognizedIntent,
}

impl ParseFailure {
    /// Intent the failure was raised for (Unknown for unrecognized text)
    pub fn intent(&self) -> Intent {
        match self {
            ParseFailure::MissingAmount(intent) | ParseFailure::MissingCategory(intent) => *intent,
            ParseFailure::MissingPeriod => Intent::Budget,
            ParseFailure::UnrecognizedIntent => Intent::Unknown,
        }
    }

    /// Short code for logs and API payloads
    pub fn code(&self) -> &'static str {
        match self {
            ParseFailure::MissingAmount(_) => "missing_amount",
            ParseFailure::MissingCategory(_) => "missing_category",
            ParseFailure::MissingPeriod => "missing_period",
            ParseFailure::UnrecognizedIntent => "unrecognized_intent",
        }
    }
}

/// Invalid interpreter configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no intents configured")]
    NoIntents,

    #[error("intent {0} is configured more than once")]
    DuplicateIntent(Intent),

    #[error("intent {0} cannot be configured with prefixes")]
    UnknownConfigured(Intent),

    #[error("intent {0} has an empty prefix list")]
    EmptyPrefixes(Intent),

    #[error("intent {0} has a blank prefix")]
    BlankPrefix(Intent),

    #[error("{0} category list is empty")]
    EmptyCategories(&'static str),

    #[error("fallback category '{fallback}' is not in the {list} category list")]
    FallbackNotListed {
        list: &'static str,
        fallback: String,
    },

    #[error("{0} keyword is blank")]
    BlankKeyword(&'static str),

    #[error("no budget period tokens configured")]
    NoPeriods,

    #[error("blank informal vocabulary entry")]
    BlankVocabulary,

    #[error("formal word '{0}' is itself an informal entry (normalization would not be idempotent)")]
    ChainedVocabulary(String),

    #[error("currency symbol is empty")]
    EmptyCurrencySymbol,

    #[error("failed to compile pattern: {0}")]
    Pattern(#[from] regex::Error),
}
