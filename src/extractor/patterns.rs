// file: src/extractor/patterns.rs
// description: compiled regex patterns for response repair and fallback extraction
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Markdown code fences around model output
    pub static ref CODE_FENCE: Regex = Regex::new(
        r"```(?:json|JSON)?\s*"
    ).expect("CODE_FENCE regex is valid");

    // JSON repair
    pub static ref TRAILING_COMMA: Regex = Regex::new(
        r",\s*([}\]])"
    ).expect("TRAILING_COMMA regex is valid");

    pub static ref ADJACENT_OBJECTS: Regex = Regex::new(
        r"\}\s*\{"
    ).expect("ADJACENT_OBJECTS regex is valid");

    pub static ref ITEMS_ARRAY_START: Regex = Regex::new(
        r#""items"\s*:\s*\["#
    ).expect("ITEMS_ARRAY_START regex is valid");

    // Financial amounts with a currency marker
    pub static ref CURRENCY_AMOUNT: Regex = Regex::new(
        r"(?i)(?:INR|USD|\$|₹|Rs\.?)\s*(\d+(?:,\d+)*(?:\.\d+)?)"
    ).expect("CURRENCY_AMOUNT regex is valid");

    // Dates: 03/01/2025, 03-01-25, 2025-01-03, 2025.01.03
    pub static ref TRANSACTION_DATE: Regex = Regex::new(
        r"\b(\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}|\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2})\b"
    ).expect("TRANSACTION_DATE regex is valid");

    pub static ref NON_NUMERIC: Regex = Regex::new(
        r"[^0-9.\-]"
    ).expect("NON_NUMERIC regex is valid");
}

/// Coerces a loosely formatted amount into a number by dropping every
/// character that is not a digit, `.` or `-`. Unparsable input yields 0.
pub fn parse_amount(raw: &str) -> f64 {
    let stripped = NON_NUMERIC.replace_all(raw, "");
    stripped
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}
