//! Conversions between provider amount encodings and [`Decimal`].
//!
//! Providers send amounts as JSON numbers or numeric strings, and expect them back
//! with a fixed number of decimals. Going through [`Decimal`] keeps `100000` from
//! turning into `1e5` or `100000.00000001` along the way.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use std::str::FromStr;

/// Reads an amount from a JSON number or numeric string.
pub fn from_json(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse(&n.to_string()),
        Value::String(s) => parse(s.trim()),
        _ => None,
    }
}

fn parse(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Renders an amount with exactly `scale` decimals.
pub fn format_fixed(amount: Decimal, scale: u32) -> String {
    let mut rounded = amount.round_dp(scale);
    rounded.rescale(scale);
    rounded.to_string()
}

/// Whole currency units, as expected by STK push and B2C/B2B bodies.
///
/// Returns `None` for negative or fractional amounts instead of rounding them:
/// the provider would otherwise move a different amount from the one recorded.
pub fn whole_units(amount: Decimal) -> Option<u64> {
    if !amount.fract().is_zero() {
        return None;
    }
    amount.trunc().to_u64()
}
