//! Saturating fixed-point helpers - no unwrap, no panics

use alloy_primitives::U256;

/// Basis-point denominator (10_000 = 100%)
pub const BPS: u128 = 10_000;

/// Add u128 with saturation at MAX
pub fn add_u128(a: u128, b: u128) -> u128 {
    a.saturating_add(b)
}

/// Subtract u128 with saturation at 0
pub fn sub_u128(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}

/// Divide u128 (returns 0 if divisor is 0)
pub fn div_u128(a: u128, b: u128) -> u128 {
    if b == 0 {
        0
    } else {
        a / b
    }
}

/// Minimum of two u128
pub fn min_u128(a: u128, b: u128) -> u128 {
    if a < b { a } else { b }
}

/// Maximum of two u128
pub fn max_u128(a: u128, b: u128) -> u128 {
    if a > b { a } else { b }
}

/// Absolute difference of two u128
pub fn abs_diff_u128(a: u128, b: u128) -> u128 {
    if a > b { a - b } else { b - a }
}

/// `a * b / d` with a 256-bit intermediate, rounded down.
///
/// Returns 0 when `d` is 0 and saturates at `u128::MAX` when the quotient
/// does not fit.
pub fn mul_div(a: u128, b: u128, d: u128) -> u128 {
    if d == 0 {
        return 0;
    }
    let q = U256::from(a) * U256::from(b) / U256::from(d);
    u128::try_from(q).unwrap_or(u128::MAX)
}

/// `amount * bps / 10_000`, rounded down
pub fn bps_of(amount: u128, bps: u128) -> u128 {
    mul_div(amount, bps, BPS)
}

/// Ratio `part / whole` expressed in bps (0 when `whole` is 0)
pub fn ratio_bps(part: u128, whole: u128) -> u128 {
    mul_div(part, BPS, whole)
}
