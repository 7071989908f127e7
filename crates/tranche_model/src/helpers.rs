//! Split policy and invariant checking helpers

use crate::math::*;
use crate::state::*;

/// Utilisation knee: below it Growth's cut of Protected profit rises slowly
pub const SPLIT_KNEE_BPS: u128 = 8_000;

/// Utilisation ratio `pwrd / gvt` in bps (uncapped, 0 when Growth is empty)
pub fn utilisation(s: &Book) -> u128 {
    ratio_bps(s.pwrd, s.gvt)
}

/// Share (bps) of Protected's pro-rata profit that Growth receives.
///
/// Piecewise linear in the capped utilisation `u`:
///   u <  8_000: u * 3 / 8 + 3_000   (3_000 ..= 6_000)
///   u >= 8_000: (u - 8_000) * 2 + 6_000   (6_000 ..= 10_000)
pub fn split_factor(utilisation_bps: u128) -> u128 {
    let u = min_u128(utilisation_bps, BPS);
    if u < SPLIT_KNEE_BPS {
        u * 3 / 8 + 3_000
    } else {
        (u - SPLIT_KNEE_BPS) * 2 + 6_000
    }
}

/// Split a net profit between the tranches.
///
/// Returns `(to_gvt, to_pwrd)`; the two parts always sum to `profit`.
/// With Protected rebase off, or with an empty book, everything goes to Growth.
pub fn split_profit(s: &Book, profit: u128) -> (u128, u128) {
    let total = s.total();
    if !s.pwrd_rebase || total == 0 || s.pwrd == 0 {
        return (profit, 0);
    }

    // Pro-rata first, then Growth takes its factor of Protected's share
    let pwrd_pro_rata = mul_div(profit, s.pwrd, total);
    let factor = split_factor(utilisation(s));
    let pwrd_kept = sub_u128(pwrd_pro_rata, bps_of(pwrd_pro_rata, factor));

    (profit - pwrd_kept, pwrd_kept)
}

/// Split a withdrawal bonus by post-withdrawal weights.
///
/// Protected's share is rounded down and Growth takes the remainder, so the
/// two parts always sum to `bonus`.
pub fn split_bonus(s: &Book, bonus: u128) -> (u128, u128) {
    let total = s.total();
    if !s.pwrd_rebase || total == 0 {
        return (bonus, 0);
    }
    let to_pwrd = mul_div(bonus, s.pwrd, total);
    (bonus - to_pwrd, to_pwrd)
}

/// Performance fee charged on a strategy gain
pub fn performance_fee(gain: u128, p: &Params) -> u128 {
    bps_of(gain, p.performance_fee_bps)
}

/// Both tranches at or above the floor
pub fn floor_ok(s: &Book, p: &Params) -> bool {
    s.gvt >= p.min_unit && s.pwrd >= p.min_unit
}

/// Total moved by exactly `gain - loss`
pub fn conserved(before: &Book, after: &Book, gain: u128, loss: u128) -> bool {
    before.total().checked_add(gain).and_then(|t| t.checked_sub(loss)) == Some(after.total())
}

/// Protected only lost value if Growth was driven to the floor
pub fn loss_order_ok(before: &Book, after: &Book, p: &Params) -> bool {
    if after.pwrd < before.pwrd {
        after.gvt == p.min_unit
    } else {
        true
    }
}

/// Protected never loses value on a profit distribution
pub fn pwrd_not_debited(before: &Book, after: &Book) -> bool {
    after.pwrd >= before.pwrd
}

#[cfg(test)]
mod tests {
    use super::*;

    const USD: u128 = ONE_USD;

    #[test]
    fn test_split_factor_continuous_at_knee() {
        assert_eq!(split_factor(0), 3_000);
        assert_eq!(split_factor(SPLIT_KNEE_BPS - 1), (SPLIT_KNEE_BPS - 1) * 3 / 8 + 3_000);
        assert_eq!(split_factor(SPLIT_KNEE_BPS), 6_000);
        assert_eq!(split_factor(10_000), 10_000);
        // Capped above 100% utilisation
        assert_eq!(split_factor(25_000), 10_000);
    }

    #[test]
    fn test_split_profit_rebase_off_goes_to_growth() {
        let mut s = Book::new(1_000 * USD, 5_000 * USD);
        s.pwrd_rebase = false;
        assert_eq!(split_profit(&s, 600 * USD), (600 * USD, 0));
    }

    #[test]
    fn test_split_profit_low_utilisation() {
        // u = 50% -> factor = 5_000 * 3 / 8 + 3_000 = 4_875
        let s = Book::new(2_000 * USD, 1_000 * USD);
        let (to_gvt, to_pwrd) = split_profit(&s, 300 * USD);

        // Protected pro-rata = 100, keeps 100 * (1 - 0.4875) = 51.25
        assert_eq!(to_pwrd, 51_250_000_000_000_000_000);
        assert_eq!(to_gvt + to_pwrd, 300 * USD);
    }

    #[test]
    fn test_split_profit_full_utilisation() {
        // u >= 100% -> Protected keeps nothing
        let s = Book::new(1_000 * USD, 5_000 * USD);
        assert_eq!(split_profit(&s, 600 * USD), (600 * USD, 0));
    }

    #[test]
    fn test_split_bonus_exact() {
        let s = Book::new(3 * USD, 7 * USD);
        let (to_gvt, to_pwrd) = split_bonus(&s, 10);
        assert_eq!(to_pwrd, 7);
        assert_eq!(to_gvt, 3);

        let (to_gvt, to_pwrd) = split_bonus(&s, 1);
        assert_eq!(to_gvt + to_pwrd, 1);
    }

    #[test]
    fn test_loss_order_predicate() {
        let p = Params::default();
        let before = Book::new(1_000 * USD, 5_000 * USD);
        let bad = Book::new(500 * USD, 4_900 * USD);
        let good = Book::new(USD, 4_900 * USD);
        assert!(!loss_order_ok(&before, &bad, &p));
        assert!(loss_order_ok(&before, &good, &p));
    }
}
