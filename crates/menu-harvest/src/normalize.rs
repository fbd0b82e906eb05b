//! Price and text normalization.
//!
//! Everything here is a total, side-effect-free function: malformed input
//! yields `None` (or an empty string), never a panic, so one bad price string
//! cannot take down the extraction of a whole restaurant.

use once_cell::sync::Lazy;
use regex::Regex;

/// Qualifiers that precede "starting at" prices ("from € 8,50", "vanaf 8,50").
static QUALIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:à partir de|a partir de|\bvanaf\b|\bfrom\b|\bab\b)")
        .expect("qualifier regex is valid")
});

/// Spelled-out currency tokens.
static CURRENCY_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:euros|euro|eur)\b").expect("currency regex is valid"));

/// What must remain once qualifiers, currency and whitespace are gone.
static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(?:[.,](\d+))?$").expect("numeric regex is valid"));

/// A price at the very end of a line: `Espresso 2,50`, `Soup - €4.00`.
static TRAILING_PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[€$£]?\s?\d+[.,]\d{2}\s*$").expect("trailing price regex is valid")
});

/// A price anywhere in a block of text.
static INLINE_PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[€$£]?\s?\d+[.,]\d{2}").expect("inline price regex is valid"));

/// "3 items", "1 item": the count badge some platforms render where a
/// description would be.
static ITEM_COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d+\s*items?$").expect("item count regex is valid"));

const CURRENCY_SYMBOLS: [char; 3] = ['€', '$', '£'];

/// Convert a raw price fragment into a positive decimal.
///
/// Accepts an optional qualifier (`from`, `vanaf`...), an optional currency
/// symbol or word, and `digits[,.]digits` with either decimal separator.
/// Whole amounts (`€ 7`, `€ 7,-`) are accepted too. Zero and anything that
/// does not reduce to a number give `None`.
pub fn parse_price(raw: &str) -> Option<f64> {
    let without_qualifier = QUALIFIER_RE.replace_all(raw, " ");
    let without_currency = CURRENCY_WORD_RE.replace_all(&without_qualifier, " ");

    let mut compact: String = without_currency
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    // Dutch whole-euro notation: "7,-"
    if compact.ends_with(",-") || compact.ends_with(".-") {
        compact.truncate(compact.len() - 2);
    }

    let caps = NUMERIC_RE.captures(&compact)?;
    let whole = caps.get(1)?.as_str();
    let value = match caps.get(2) {
        Some(frac) => format!("{whole}.{}", frac.as_str()).parse::<f64>().ok()?,
        None => whole.parse::<f64>().ok()?,
    };

    Some(value).filter(|v| v.is_finite() && *v > 0.0)
}

/// A price found inside a longer piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatch<'a> {
    /// Byte offset where the match starts.
    pub start: usize,
    /// The matched text, trimmed.
    pub raw: &'a str,
    /// Parsed value; `None` when the match normalizes to zero.
    pub value: Option<f64>,
}

/// Find a price anchored at the end of `line`.
pub fn find_trailing_price(line: &str) -> Option<PriceMatch<'_>> {
    let m = TRAILING_PRICE_RE.find(line)?;
    Some(PriceMatch {
        start: m.start(),
        raw: m.as_str().trim(),
        value: parse_price(m.as_str()),
    })
}

/// Find the first price anywhere in `text`.
pub fn find_inline_price(text: &str) -> Option<PriceMatch<'_>> {
    let m = INLINE_PRICE_RE.find(text)?;
    Some(PriceMatch {
        start: m.start(),
        raw: m.as_str().trim(),
        value: parse_price(m.as_str()),
    })
}

/// Whether a text fragment looks like a rendered price rather than a label.
pub fn looks_like_price_text(text: &str) -> bool {
    if text.chars().any(|c| CURRENCY_SYMBOLS.contains(&c)) {
        return true;
    }
    let lower = text.to_lowercase();
    lower.contains("from") || lower.contains("vanaf") || CURRENCY_WORD_RE.is_match(&lower)
}

/// Whether a "description" is really an item-count badge ("4 items").
pub fn is_item_count_placeholder(text: &str) -> bool {
    ITEM_COUNT_RE.is_match(text.trim())
}

/// Collapse all runs of whitespace to single spaces and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// At least one cased letter, and no lower-case ones.
pub fn is_upper_case_line(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.map(|v| (v - b).abs() < 1e-9).unwrap_or(false)
    }

    #[test]
    fn test_parse_price_separators() {
        assert!(approx(parse_price("2,50"), 2.5));
        assert!(approx(parse_price("2.50"), 2.5));
        assert!(approx(parse_price("12,95"), 12.95));
    }

    #[test]
    fn test_parse_price_currency_and_qualifier() {
        assert!(approx(parse_price("€ 8,50"), 8.5));
        assert!(approx(parse_price("€8.50"), 8.5));
        assert!(approx(parse_price("from € 11,00"), 11.0));
        assert!(approx(parse_price("From €11,00"), 11.0));
        assert!(approx(parse_price("vanaf € 6,25"), 6.25));
        assert!(approx(parse_price("9,75 EUR"), 9.75));
        assert!(approx(parse_price("\u{a0}€\u{a0}3,10 "), 3.1));
    }

    #[test]
    fn test_parse_price_whole_amounts() {
        assert!(approx(parse_price("€ 7"), 7.0));
        assert!(approx(parse_price("€ 7,-"), 7.0));
    }

    #[test]
    fn test_parse_price_rejects_non_positive_and_garbage() {
        assert_eq!(parse_price("€ 0,00"), None);
        assert_eq!(parse_price("-3,50"), None);
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("free"), None);
        assert_eq!(parse_price("ask staff"), None);
        assert_eq!(parse_price("1.234,56"), None);
        assert_eq!(parse_price("€"), None);
    }

    #[test]
    fn test_trailing_price() {
        let m = find_trailing_price("Espresso 2,50").unwrap();
        assert_eq!(m.raw, "2,50");
        assert_eq!(m.start, 8);
        assert!(approx(m.value, 2.5));

        let m = find_trailing_price("Tomato soup - €4.00  ").unwrap();
        assert_eq!(m.raw, "€4.00");
        assert!(approx(m.value, 4.0));

        assert!(find_trailing_price("2,50 Espresso").is_none());
        assert!(find_trailing_price("House Blend").is_none());
    }

    #[test]
    fn test_trailing_zero_price_has_no_value() {
        let m = find_trailing_price("Tap water 0,00").unwrap();
        assert_eq!(m.value, None);
    }

    #[test]
    fn test_inline_price() {
        let m = find_inline_price("Margherita tomato, mozzarella €9,50 vegetarian").unwrap();
        assert_eq!(m.raw, "€9,50");
        assert!(approx(m.value, 9.5));
        assert!(find_inline_price("no price here").is_none());
    }

    #[test]
    fn test_price_text_detection() {
        assert!(looks_like_price_text("€ 4,50"));
        assert!(looks_like_price_text("from 4,50"));
        assert!(!looks_like_price_text("Spicy"));
    }

    #[test]
    fn test_item_count_placeholder() {
        assert!(is_item_count_placeholder("4 items"));
        assert!(is_item_count_placeholder("1 item"));
        assert!(!is_item_count_placeholder("Served with 2 items of choice"));
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(clean_text("  Pad \n Thai\t "), "Pad Thai");
        assert_eq!(word_count("one two  three"), 3);
        assert!(is_upper_case_line("DRINKS"));
        assert!(is_upper_case_line("HOT DRINKS & TEA"));
        assert!(!is_upper_case_line("Drinks"));
        assert!(!is_upper_case_line("2,50"));
    }

    proptest! {
        #[test]
        fn prop_valid_prices_parse_exactly(
            whole in 1u32..10_000,
            cents in 0u32..100,
            comma in any::<bool>(),
            prefix in prop::sample::select(vec!["", "€", "€ ", "from ", "from € ", "vanaf €"]),
        ) {
            let sep = if comma { ',' } else { '.' };
            let raw = format!("{prefix}{whole}{sep}{cents:02}");
            let expected = f64::from(whole) + f64::from(cents) / 100.0;
            let parsed = parse_price(&raw);
            prop_assert!(parsed.is_some());
            prop_assert!((parsed.unwrap() - expected).abs() < 1e-6);
        }

        #[test]
        fn prop_parse_never_panics_and_is_positive(raw in ".{0,40}") {
            if let Some(v) = parse_price(&raw) {
                prop_assert!(v > 0.0);
            }
        }

        #[test]
        fn prop_digitless_text_is_rejected(raw in "[a-zA-Z €$£,.-]{0,30}") {
            prop_assert_eq!(parse_price(&raw), None);
        }
    }
}
