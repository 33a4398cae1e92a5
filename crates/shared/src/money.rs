//! Bet amount parsing and cent formatting.

use crate::error::BetParseError;

/// Parses a dollar amount such as `"1.00"`, `"2.5"` or `".75"` into whole cents.
///
/// Accepts digits with at most one decimal point and at least one digit. Extra
/// fractional digits are rounded half-up into the cent value, so `"0.125"` is
/// 13 cents. Signs, exponents and separators are rejected.
pub fn parse_bet_cents(input: &str) -> Result<u64, BetParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(BetParseError::Empty);
    }

    let malformed = || BetParseError::Malformed(trimmed.to_string());
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(malformed());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }

    let overflow = || BetParseError::Overflow(trimmed.to_string());
    let dollars = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| overflow())?
    };

    let digit = |idx: usize| u64::from(fraction.as_bytes().get(idx).map_or(0, |b| b - b'0'));
    let mut cents = digit(0) * 10 + digit(1);
    if digit(2) >= 5 {
        cents += 1;
    }

    dollars
        .checked_mul(100)
        .and_then(|total| total.checked_add(cents))
        .ok_or_else(overflow)
}

pub fn format_cents(cents: u64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_amounts() {
        assert_eq!(parse_bet_cents("1.00"), Ok(100));
        assert_eq!(parse_bet_cents("2.5"), Ok(250));
        assert_eq!(parse_bet_cents(".75"), Ok(75));
        assert_eq!(parse_bet_cents("3."), Ok(300));
        assert_eq!(parse_bet_cents(" 12 "), Ok(1200));
        assert_eq!(parse_bet_cents("0"), Ok(0));
    }

    #[test]
    fn rounds_extra_fraction_digits_half_up() {
        assert_eq!(parse_bet_cents("0.125"), Ok(13));
        assert_eq!(parse_bet_cents("0.124"), Ok(12));
        assert_eq!(parse_bet_cents("1.005"), Ok(101));
        assert_eq!(parse_bet_cents("0.999"), Ok(100));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(
            parse_bet_cents("12.3.4"),
            Err(BetParseError::Malformed("12.3.4".into()))
        );
        assert_eq!(parse_bet_cents(""), Err(BetParseError::Empty));
        assert!(matches!(parse_bet_cents("."), Err(BetParseError::Malformed(_))));
        assert!(matches!(parse_bet_cents("-1"), Err(BetParseError::Malformed(_))));
        assert!(matches!(parse_bet_cents("1e3"), Err(BetParseError::Malformed(_))));
        assert!(matches!(parse_bet_cents("1,000"), Err(BetParseError::Malformed(_))));
    }

    #[test]
    fn rejects_amounts_that_overflow_cents() {
        assert!(matches!(
            parse_bet_cents("184467440737095517"),
            Err(BetParseError::Overflow(_))
        ));
    }

    #[test]
    fn formats_cents_as_dollars() {
        assert_eq!(format_cents(250), "$2.50");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(123_456), "$1234.56");
    }
}
