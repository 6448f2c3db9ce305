// 🧭 Intent Classifier
// Prefix match in configured priority order
//
// Tie-break contract: the FIRST intent (in config order) with a matching
// prefix wins, even if a later intent has a longer matching prefix.
// Overlapping prefix sets must list the more specific intent first.

use crate::config::IntentPrefixes;
use crate::interpreter::Intent;

pub struct IntentClassifier {
    /// (intent, lower-cased prefixes) in priority order
    table: Vec<(Intent, Vec<String>)>,
}

impl IntentClassifier {
    pub fn new(intents: &[IntentPrefixes]) -> Self {
        let table = intents
            .iter()
            .map(|entry| {
                let prefixes = entry
                    .prefixes
                    .iter()
                    .map(|p| p.trim().to_lowercase())
                    .collect();
                (entry.intent, prefixes)
            })
            .collect();

        IntentClassifier { table }
    }

    /// Classify normalized text. No match → Unknown.
    pub fn classify(&self, text: &str) -> Intent {
        self.matched_prefix(text)
            .map(|(intent, _)| intent)
            .unwrap_or(Intent::Unknown)
    }

    /// Intent and the prefix that triggered it
    pub fn matched_prefix(&self, text: &str) -> Option<(Intent, &str)> {
        let text = text.trim().to_lowercase();

        for (intent, prefixes) in &self.table {
            if let Some(prefix) = prefixes.iter().find(|p| text.starts_with(p.as_str())) {
                return Some((*intent, prefix.as_str()));
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;
    use proptest::prelude::*;

    fn entry(intent: Intent, prefixes: &[&str]) -> IntentPrefixes {
        IntentPrefixes {
            intent,
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn default_classifier() -> IntentClassifier {
        IntentClassifier::new(&InterpreterConfig::default().intents)
    }

    #[test]
    fn test_default_prefixes() {
        let c = default_classifier();

        assert_eq!(c.classify("catat pengeluaran 50000 untuk makan"), Intent::Expense);
        assert_eq!(c.classify("tambah pemasukan 100000 dari Bonus"), Intent::Income);
        assert_eq!(c.classify("cek saldo"), Intent::Balance);
        assert_eq!(c.classify("saldo"), Intent::Balance);
        assert_eq!(c.classify("laporan bulanan"), Intent::Report);
        assert_eq!(c.classify("set budget 1000000 per bulan"), Intent::Budget);
        assert_eq!(c.classify("tolong"), Intent::Help);
        assert_eq!(c.classify("buka dashboard"), Intent::Dashboard);
    }

    #[test]
    fn test_unknown_when_no_prefix_matches() {
        let c = default_classifier();

        assert_eq!(c.classify("apa kabar"), Intent::Unknown);
        assert_eq!(c.classify(""), Intent::Unknown);
        // prefix must be at position 0
        assert_eq!(c.classify("tolong cek saldo"), Intent::Help);
        assert_eq!(c.classify("mau cek saldo"), Intent::Unknown);
    }

    #[test]
    fn test_case_and_leading_whitespace_ignored() {
        let c = default_classifier();
        assert_eq!(c.classify("   CEK Saldo"), Intent::Balance);
    }

    #[test]
    fn test_priority_order_beats_longest_match() {
        // "report budget" matches both; Report is listed first so it wins,
        // even though "report budget" is the longer Budget prefix
        let c = IntentClassifier::new(&[
            entry(Intent::Report, &["report"]),
            entry(Intent::Budget, &["report budget"]),
        ]);
        assert_eq!(c.classify("report budget bulan ini"), Intent::Report);

        // Reversing the order reverses the outcome
        let c = IntentClassifier::new(&[
            entry(Intent::Budget, &["report budget"]),
            entry(Intent::Report, &["report"]),
        ]);
        assert_eq!(c.classify("report budget bulan ini"), Intent::Budget);
        assert_eq!(c.classify("report"), Intent::Report);
    }

    #[test]
    fn test_matched_prefix_reports_trigger() {
        let c = default_classifier();
        assert_eq!(
            c.matched_prefix("buka dashboard sekarang"),
            Some((Intent::Dashboard, "buka dashboard"))
        );
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(text in ".{0,60}") {
            let c = default_classifier();
            prop_assert_eq!(c.classify(&text), c.classify(&text));
        }
    }
}
