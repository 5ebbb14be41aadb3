//! # Number Parsing
//!
//! Decimal parsing into scaled integers, used for money (scale 2), percentages
//! (scale 2, i.e. basis points) and quantities (scale 0).
//!
//! ## Two Parsers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  parse_invariant("1234.5", 2)  → 123450    (machine format, always)    │
//! │  parse_culture("1.234,5", 2)   → 123450    (fallback for hand-edited)  │
//! │  parse_culture("5,000", 2)     → 500000    (3 digits after = grouping) │
//! │  parse_lenient(s, scale)       = invariant, else culture               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Parsing and rounding go through `rust_decimal`; extra fractional digits
//! beyond `scale` are rounded half away from zero, the same rule
//! [`crate::money::Money`] uses everywhere. This module only adds the
//! separator normalisation for hand-edited files.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Parses a locale-independent decimal (`-1234.56`, `+7`, `.5`).
///
/// No grouping separators, no exponent, `.` is the only decimal separator.
/// Returns `None` when the scaled value does not fit in an `i64`.
pub fn parse_invariant(text: &str, scale: u32) -> Option<i64> {
    let text = text.trim();
    let (sign, body) = match text.as_bytes().first()? {
        b'-' => ("-", &text[1..]),
        b'+' => ("", &text[1..]),
        _ => ("", text),
    };

    let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let frac_part = if frac_part.is_empty() { "0" } else { frac_part };
    let value = Decimal::from_str(&format!("{}{}.{}", sign, int_part, frac_part)).ok()?;
    to_scaled(value, scale)
}

/// Rounds `value` to `scale` decimals, half away from zero, and returns it
/// as a whole number of `10^-scale` units (`12.345`, 2 → `1235`).
///
/// `None` when the result does not fit in an `i64`.
pub fn to_scaled(value: Decimal, scale: u32) -> Option<i64> {
    let factor = Decimal::from(10_i64.checked_pow(scale)?);
    value
        .round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(factor)?
        .to_i64()
}

/// Parses a human-formatted decimal where `,` and `.` may be either the
/// decimal or the grouping separator.
///
/// ## Separator Rules
/// - Spaces (including no-break spaces) and apostrophes are grouping.
/// - Both `,` and `.` present: the last one is the decimal separator.
/// - Only one kind present more than once: it is grouping.
/// - Only one kind present once: grouping if exactly 3 digits follow,
///   otherwise the decimal separator.
pub fn parse_culture(text: &str, scale: u32) -> Option<i64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let decimal_sep = match (last_comma, last_dot) {
        (Some(c), Some(d)) => Some(if c > d { ',' } else { '.' }),
        (Some(_), None) => single_kind_decimal(&cleaned, ','),
        (None, Some(_)) => single_kind_decimal(&cleaned, '.'),
        (None, None) => None,
    };

    let normalized: String = match decimal_sep {
        Some(sep) => {
            let split_at = cleaned.rfind(sep)?;
            let (int_part, frac_part) = cleaned.split_at(split_at);
            let int_part: String = int_part.chars().filter(|c| *c != ',' && *c != '.').collect();
            format!("{}.{}", int_part, &frac_part[1..])
        }
        None => cleaned.chars().filter(|c| *c != ',' && *c != '.').collect(),
    };

    parse_invariant(&normalized, scale)
}

fn single_kind_decimal(text: &str, sep: char) -> Option<char> {
    if text.matches(sep).count() > 1 {
        return None;
    }
    let tail = text.rsplit(sep).next().unwrap_or("");
    if tail.len() == 3 {
        None
    } else {
        Some(sep)
    }
}

/// Invariant parse first, culture-tolerant parse second.
pub fn parse_lenient(text: &str, scale: u32) -> Option<i64> {
    parse_invariant(text, scale).or_else(|| parse_culture(text, scale))
}

/// Parses a whole number leniently (`"3"`, `"3.0"`, `"1,000"`).
pub fn parse_int_lenient(text: &str) -> Option<i64> {
    parse_lenient(text, 0)
}

/// Formats a scaled integer in invariant notation (`123450`, 2 → `1234.50`).
pub fn format_scaled(value: i64, scale: u32) -> String {
    match Decimal::try_new(value, scale) {
        Ok(decimal) => decimal.to_string(),
        Err(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_invariant() {
        assert_eq!(parse_invariant("1234.56", 2), Some(123456));
        assert_eq!(parse_invariant("5000", 2), Some(500000));
        assert_eq!(parse_invariant("-7.5", 2), Some(-750));
        assert_eq!(parse_invariant(".5", 2), Some(50));
        assert_eq!(parse_invariant(" 42 ", 0), Some(42));
        assert_eq!(parse_invariant("", 2), None);
        assert_eq!(parse_invariant("abc", 2), None);
        assert_eq!(parse_invariant("1,5", 2), None);
    }

    #[test]
    fn test_parse_invariant_rounds_half_away_from_zero() {
        assert_eq!(parse_invariant("0.125", 2), Some(13));
        assert_eq!(parse_invariant("0.124", 2), Some(12));
        assert_eq!(parse_invariant("-0.125", 2), Some(-13));
    }

    #[test]
    fn test_parse_invariant_rejects_values_beyond_i64() {
        assert_eq!(parse_invariant("92233720368547758.08", 2), None);
        assert_eq!(parse_invariant("50000000000000000.00", 2), Some(5_000_000_000_000_000_000));
    }

    #[test]
    fn test_to_scaled() {
        assert_eq!(to_scaled(Decimal::new(12_345, 3), 2), Some(1_235));
        assert_eq!(to_scaled(Decimal::new(-12_345, 3), 2), Some(-1_235));
    }

    #[test]
    fn test_parse_culture() {
        assert_eq!(parse_culture("1.234,5", 2), Some(123450));
        assert_eq!(parse_culture("5,000", 2), Some(500000));
        assert_eq!(parse_culture("5,5", 2), Some(550));
        assert_eq!(parse_culture("1 234 567", 0), Some(1234567));
        assert_eq!(parse_culture("1.000.000", 0), Some(1000000));
        assert_eq!(parse_culture("12,345.67", 2), Some(1234567));
    }

    #[test]
    fn test_parse_lenient_prefers_invariant() {
        // "1.500" is 1.5 invariantly, never fifteen hundred
        assert_eq!(parse_lenient("1.500", 2), Some(150));
        assert_eq!(parse_lenient("1,500", 2), Some(150000));
        assert_eq!(parse_lenient("n/a", 2), None);
    }

    #[test]
    fn test_format_scaled() {
        assert_eq!(format_scaled(123450, 2), "1234.50");
        assert_eq!(format_scaled(-5, 2), "-0.05");
        assert_eq!(format_scaled(7, 0), "7");
    }
}
