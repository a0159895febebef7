//! Shared helpers for the Paygate service.

use crate::error::{AppError, Result};

/// Minor units per major unit. The provider exchanges integer minor units
/// (cents); decimal major-unit values cross this boundary exactly once, at
/// order creation and at refund initiation.
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Parse a major-unit decimal amount ("49.99") into minor units (4999).
///
/// Accepts at most two fractional digits; anything else is rejected rather
/// than rounded, since a silently adjusted charge is worse than an error.
pub fn parse_major_units(input: &str) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AppError::BadRequest("amount must not be empty".into()));
    }

    let (whole, frac) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(format!("invalid amount: {}", input)));
    }
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::BadRequest(format!("invalid amount: {}", input)));
    }

    let whole: i64 = whole
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid amount: {}", input)))?;

    let frac_minor = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().unwrap_or(0) * 10,
        _ => frac.parse::<i64>().unwrap_or(0),
    };

    whole
        .checked_mul(MINOR_UNITS_PER_MAJOR)
        .and_then(|v| v.checked_add(frac_minor))
        .ok_or_else(|| AppError::BadRequest(format!("amount out of range: {}", input)))
}

/// Format minor units back into a major-unit decimal string ("49.99").
pub fn format_major_units(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.abs();
    format!(
        "{}{}.{:02}",
        sign,
        abs / MINOR_UNITS_PER_MAJOR,
        abs % MINOR_UNITS_PER_MAJOR
    )
}

/// Human-readable amount for audit-note text only, e.g. "49.99 USD".
/// Stored state always stays in minor units.
pub fn display_amount(minor: i64, currency: &str) -> String {
    format!("{} {}", format_major_units(minor), currency.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_decimal_amounts() {
        assert_eq!(parse_major_units("49.99").unwrap(), 4999);
        assert_eq!(parse_major_units("0.01").unwrap(), 1);
        assert_eq!(parse_major_units("100").unwrap(), 10000);
        assert_eq!(parse_major_units("12.5").unwrap(), 1250);
        assert_eq!(parse_major_units(" 3.00 ").unwrap(), 300);
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!(parse_major_units("").is_err());
        assert!(parse_major_units(".").is_err());
        assert!(parse_major_units(".99").is_err());
        assert!(parse_major_units("49.999").is_err());
        assert!(parse_major_units("-5.00").is_err());
        assert!(parse_major_units("12,50").is_err());
        assert!(parse_major_units("abc").is_err());
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_major_units(4999), "49.99");
        assert_eq!(format_major_units(5), "0.05");
        assert_eq!(format_major_units(10000), "100.00");
        assert_eq!(format_major_units(-1250), "-12.50");
    }

    #[test]
    fn displays_amount_with_uppercase_currency() {
        assert_eq!(display_amount(4999, "usd"), "49.99 USD");
    }
}
