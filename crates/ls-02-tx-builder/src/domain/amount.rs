//! # Amounts
//!
//! Exact conversion between user-facing decimal strings and base units.
//! One coin is 10^9 base units. No floating point is involved.

use super::errors::BuildError;

/// Fractional digits of the native coin.
pub const COIN_DECIMALS: usize = 9;

/// Base units in one coin.
pub const BASE_UNITS_PER_COIN: u64 = 1_000_000_000;

/// Parse `"12.5"` into base units (`12_500_000_000`).
///
/// Rejects signs, exponents, more than 9 fractional digits and values that
/// overflow `u64`.
pub fn parse_amount(input: &str) -> Result<u64, BuildError> {
    let invalid = || BuildError::InvalidAmount(input.to_string());
    let trimmed = input.trim();

    let (whole, frac) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > COIN_DECIMALS {
        return Err(invalid());
    }

    let whole_units: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let mut frac_units: u64 = 0;
    for (i, digit) in frac.bytes().enumerate() {
        let scale = 10u64.pow((COIN_DECIMALS - 1 - i) as u32);
        frac_units += u64::from(digit - b'0') * scale;
    }

    whole_units
        .checked_mul(BASE_UNITS_PER_COIN)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(invalid)
}

/// Render base units as a decimal string without trailing zeros.
pub fn format_amount(base_units: u64) -> String {
    let whole = base_units / BASE_UNITS_PER_COIN;
    let frac = base_units % BASE_UNITS_PER_COIN;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = COIN_DECIMALS);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1").unwrap(), 1_000_000_000);
        assert_eq!(parse_amount("12.5").unwrap(), 12_500_000_000);
        assert_eq!(parse_amount("0.000000001").unwrap(), 1);
        assert_eq!(parse_amount(".25").unwrap(), 250_000_000);
        assert_eq!(parse_amount("3.").unwrap(), 3_000_000_000);
    }

    #[test]
    fn test_parse_amount_rejects() {
        for bad in ["", ".", "-1", "1e9", "1.0000000001", "abc", "1.2.3", "+5"] {
            assert!(parse_amount(bad).is_err(), "accepted {bad:?}");
        }
        assert!(parse_amount("18446744074").is_err()); // > u64::MAX base units
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "0");
        assert_eq!(format_amount(1_500_000_000), "1.5");
        assert_eq!(format_amount(1), "0.000000001");
    }

    proptest! {
        #[test]
        fn prop_format_then_parse_is_exact(units in any::<u64>()) {
            prop_assert_eq!(parse_amount(&format_amount(units)).unwrap(), units);
        }
    }
}
