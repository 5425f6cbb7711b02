//! Milliunit conversion
//!
//! The ledger stores amounts as signed integers with three implied decimal
//! digits (1000 milliunits = 1.00). Bank statements and callers speak decimal
//! currency. Every crossing between the two goes through this module so the
//! rounding rule lives in one place: multiply by 1000, round half away from zero.

/// Milliunits in one major currency unit
pub const MILLIUNITS_PER_UNIT: i64 = 1000;

/// Largest amount difference (in milliunits) that still counts as a match
pub const AMOUNT_SLACK_MILLIUNITS: i64 = 1000;

/// Largest magnitude (in milliunits) accepted from callers: one trillion units
pub const MAX_AMOUNT_MILLIUNITS: i64 = 1_000_000_000_000_000;

/// Convert a decimal currency amount to milliunits
pub fn to_milliunits(amount: f64) -> i64 {
    (amount * MILLIUNITS_PER_UNIT as f64).round() as i64
}

/// Convert a caller-supplied amount, rejecting non-finite or out-of-range values
pub fn checked_milliunits(amount: f64) -> Option<i64> {
    if !amount.is_finite() {
        return None;
    }
    let milli = (amount * MILLIUNITS_PER_UNIT as f64).round();
    if milli.abs() > MAX_AMOUNT_MILLIUNITS as f64 {
        return None;
    }
    Some(milli as i64)
}

/// Convert milliunits back to a decimal currency amount
pub fn from_milliunits(milli: i64) -> f64 {
    milli as f64 / MILLIUNITS_PER_UNIT as f64
}

/// Format milliunits as a signed two-decimal amount (e.g. `-45.00`)
pub fn format_milliunits(milli: i64) -> String {
    let cents = (milli.unsigned_abs() + 5) / 10;
    let sign = if milli < 0 && cents > 0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}
