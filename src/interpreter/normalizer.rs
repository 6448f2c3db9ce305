// ✏️ Text Normalizer
// Informal shorthand → canonical vocabulary
//
// Order matters: numeric shorthand is expanded BEFORE word substitution, so a
// substituted word can never be re-read as a multiplier.
//   "50k" / "50rb"  → "50000"
//   "2m" / "2 jt"   → "2000000"
//   "1.5k"          → "1500"
//   "catet keluar buat makan" → "catat pengeluaran untuk makan"

use crate::config::VocabularyEntry;
use crate::error::ConfigError;
use regex::{Captures, NoExpand, Regex};

/// Attached suffixes (k, rb, m, jt) or a spaced abbreviation ("2 jt").
/// The leading group keeps a match from starting inside a word or after a
/// decimal point, so "1.5k" is read as a whole and "abc5k" not at all.
const SHORTHAND_PATTERN: &str =
    r"(?i)(^|[^\w.])([0-9]+(?:\.[0-9]+)?)(?:(k|rb|m|jt)|\s+(rb|jt))\b";

pub struct Normalizer {
    shorthand: Regex,
    substitutions: Vec<(Regex, String)>,
}

impl Normalizer {
    pub fn new(vocabulary: &[VocabularyEntry]) -> Result<Self, ConfigError> {
        let substitutions = vocabulary
            .iter()
            .map(|entry| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(entry.informal.trim()));
                Ok((Regex::new(&pattern)?, entry.formal.clone()))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Normalizer {
            shorthand: Regex::new(SHORTHAND_PATTERN)?,
            substitutions,
        })
    }

    /// Total over any input; never fails
    pub fn normalize(&self, text: &str) -> String {
        let mut text = self
            .shorthand
            .replace_all(text, |caps: &Captures| {
                let suffix = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
                let zeros = match suffix.to_ascii_lowercase().as_str() {
                    "k" | "rb" => 3,
                    _ => 6,
                };
                match scale_decimal(&caps[2], zeros) {
                    Some(value) => format!("{}{}", &caps[1], value),
                    None => caps[0].to_string(),
                }
            })
            .into_owned();

        for (pattern, formal) in &self.substitutions {
            if pattern.is_match(&text) {
                text = pattern.replace_all(&text, NoExpand(formal)).into_owned();
            }
        }

        text
    }
}

/// Multiply a plain decimal literal by 10^zeros by shifting the point, so
/// no float rounding is involved. None when the integer part overflows u64.
fn scale_decimal(literal: &str, zeros: usize) -> Option<String> {
    let (int_part, frac_part) = literal.split_once('.').unwrap_or((literal, ""));

    let (shifted_int, rest) = if frac_part.len() <= zeros {
        (
            format!("{}{}{}", int_part, frac_part, "0".repeat(zeros - frac_part.len())),
            "",
        )
    } else {
        let (moved, rest) = frac_part.split_at(zeros);
        (format!("{}{}", int_part, moved), rest)
    };

    let whole = shifted_int.parse::<u64>().ok()?;
    let rest = rest.trim_end_matches('0');
    if rest.is_empty() {
        Some(whole.to_string())
    } else {
        Some(format!("{}.{}", whole, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterpreterConfig;
    use proptest::prelude::*;

    fn normalizer() -> Normalizer {
        Normalizer::new(&InterpreterConfig::default().vocabulary).unwrap()
    }

    #[test]
    fn test_numeric_shorthand() {
        let n = normalizer();

        assert_eq!(n.normalize("50k"), "50000");
        assert_eq!(n.normalize("2m"), "2000000");
        assert_eq!(n.normalize("999"), "999");
        assert_eq!(n.normalize("bayar 15K parkir"), "bayar 15000 parkir");
    }

    #[test]
    fn test_decimal_shorthand_is_scaled() {
        let n = normalizer();

        assert_eq!(n.normalize("catat pengeluaran 1.5k untuk Belanja"), "catat pengeluaran 1500 untuk Belanja");
        assert_eq!(n.normalize("2.5m"), "2500000");
        assert_eq!(n.normalize("0.05k"), "50");
        assert_eq!(n.normalize("1.2345k"), "1234.5");
    }

    #[test]
    fn test_local_multipliers() {
        let n = normalizer();

        assert_eq!(n.normalize("50rb"), "50000");
        assert_eq!(n.normalize("gaji 2 jt"), "gaji 2000000");
        assert_eq!(n.normalize("makan 25 RB"), "makan 25000");
        // without a number the abbreviation is just a word
        assert_eq!(n.normalize("berapa jt"), "berapa juta");
    }

    #[test]
    fn test_no_expansion_inside_words_or_decimals() {
        let n = normalizer();

        assert_eq!(n.normalize("abc5k"), "abc5k");
        assert_eq!(n.normalize("1.5.5k"), "1.5.5k");
    }

    #[test]
    fn test_suffix_requires_word_boundary() {
        let n = normalizer();

        // "km" is a unit, not a shorthand; "50kg" is not "50k"
        assert_eq!(n.normalize("lari 5km"), "lari 5km");
        assert_eq!(n.normalize("beras 50kg"), "beras 50kg");
    }

    #[test]
    fn test_oversized_shorthand_left_alone() {
        let n = normalizer();
        let huge = "99999999999999999999k";

        assert_eq!(n.normalize(huge), huge);
    }

    #[test]
    fn test_informal_words_whole_word_only() {
        let n = normalizer();

        assert_eq!(
            n.normalize("catet keluar 50k buat makan"),
            "catat pengeluaran 50000 untuk makan"
        );
        // "masuk" inside "pemasukan" and "dr" inside "drama" are untouched
        assert_eq!(n.normalize("catat pemasukan dari drama"), "catat pemasukan dari drama");
    }

    #[test]
    fn test_period_abbreviations() {
        let n = normalizer();

        assert_eq!(n.normalize("atur budget 2jt per bln"), "atur budget 2000000 per bulan");
        assert_eq!(n.normalize("per mgg"), "per minggu");
        assert_eq!(n.normalize("per thn"), "per tahun");
    }

    #[test]
    fn test_case_insensitive_substitution() {
        let n = normalizer();
        assert_eq!(n.normalize("Catet Keluar 10k utk Belanja"), "catat pengeluaran 10000 untuk Belanja");
    }

    #[test]
    fn test_already_normalized_is_unchanged() {
        let n = normalizer();
        let text = "catat pengeluaran 50000 untuk makan";

        assert_eq!(n.normalize(text), text);
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(text in "[a-z0-9 ]{0,40}") {
            let n = normalizer();
            let once = n.normalize(&text);
            let twice = n.normalize(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_plain_numbers_survive(value in 0u64..1_000_000_000) {
            let n = normalizer();
            let text = format!("catat pengeluaran {} untuk makan", value);
            prop_assert_eq!(n.normalize(&text), text);
        }
    }
}
