//! Stable-swap invariant math (A·n^n·Σx + D = A·D·n^n + D^(n+1) / (n^n·Πx))
//!
//! Balances are normalised to 18 decimals before they reach these functions.
//! Intermediates run in 256 bits; results come back as u128.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use strata_common::{normalize, StrataError, DEFAULT_FACTOR};

/// Newton iterations before giving up on convergence
const MAX_ITERATIONS: usize = 255;

/// Snapshot of the external pool, in native token decimals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReserves {
    /// Coin balances (native decimals)
    pub balances: Vec<u128>,
    /// Native decimals per coin
    pub decimals: Vec<u8>,
    /// Amplification coefficient A
    pub amplification: u128,
    /// Outstanding LP supply (18 decimals)
    pub lp_supply: u128,
}

impl PoolReserves {
    pub fn n_coins(&self) -> usize {
        self.balances.len()
    }

    /// Every coin needs its decimals
    pub fn validate(&self) -> Result<(), StrataError> {
        if self.decimals.len() != self.balances.len() {
            return Err(StrataError::PoolUnavailable("decimals do not match balances"));
        }
        Ok(())
    }

    /// Balances scaled to 18 decimals
    pub fn normalized(&self) -> Vec<u128> {
        self.balances
            .iter()
            .zip(self.decimals.iter())
            .map(|(b, d)| normalize(*b, *d))
            .collect()
    }
}

fn to_u128(v: U256) -> Result<u128, StrataError> {
    u128::try_from(v).map_err(|_| StrataError::PoolUnavailable("value exceeds 128 bits"))
}

/// D_P = D^(n+1) / (n^n · Πx), built up one coin at a time
fn d_product(d: U256, xp: &[U256]) -> U256 {
    let n = U256::from(xp.len());
    xp.iter().fold(d, |acc, x| acc * d / (*x * n))
}

fn check_pool(xp: &[u128], amp: u128) -> Result<(), StrataError> {
    if xp.len() < 2 {
        return Err(StrataError::PoolUnavailable("pool needs at least two coins"));
    }
    if amp == 0 {
        return Err(StrataError::PoolUnavailable("zero amplification"));
    }
    if xp.iter().any(|x| *x == 0) {
        return Err(StrataError::PoolUnavailable("empty coin balance"));
    }
    Ok(())
}

/// Compute the invariant D for normalised balances
///
/// # Arguments
/// * `xp` - Balances in 18 decimals
/// * `amp` - Amplification coefficient A (Ann = A · n)
pub fn get_d(xp: &[u128], amp: u128) -> Result<u128, StrataError> {
    check_pool(xp, amp)?;

    let n = U256::from(xp.len());
    let xs: Vec<U256> = xp.iter().map(|x| U256::from(*x)).collect();
    let s = xs.iter().fold(U256::ZERO, |acc, x| acc + *x);
    let ann = U256::from(amp) * n;

    let mut d = s;
    for _ in 0..MAX_ITERATIONS {
        let d_p = d_product(d, &xs);
        let d_prev = d;
        let num = (ann * s + d_p * n) * d;
        let den = (ann - U256::from(1)) * d + (n + U256::from(1)) * d_p;
        d = num / den;

        let diff = if d > d_prev { d - d_prev } else { d_prev - d };
        if diff <= U256::from(1) {
            return to_u128(d);
        }
    }

    Err(StrataError::PoolUnavailable("invariant did not converge"))
}

/// Marginal price of each coin in terms of D (18 decimals; 1e18 at balance)
///
/// p_i = dD/dx_i = D·(Ann·x_i + D_P) / (x_i·((Ann - 1)·D + (n + 1)·D_P))
pub fn marginal_prices(xp: &[u128], amp: u128) -> Result<Vec<u128>, StrataError> {
    let d = U256::from(get_d(xp, amp)?);

    let n = U256::from(xp.len());
    let xs: Vec<U256> = xp.iter().map(|x| U256::from(*x)).collect();
    let ann = U256::from(amp) * n;
    let d_p = d_product(d, &xs);
    let den = (ann - U256::from(1)) * d + (n + U256::from(1)) * d_p;
    let one = U256::from(DEFAULT_FACTOR);

    xs.iter()
        .map(|x| {
            // Divide by x_i before scaling so large pools stay within 256 bits
            let t = (ann * *x + d_p) * d / *x;
            to_u128(t * one / den)
        })
        .collect()
}

/// LP virtual price `D / supply` (18 decimals; 1e18 for an unminted pool)
pub fn virtual_price(pool: &PoolReserves) -> Result<u128, StrataError> {
    if pool.lp_supply == 0 {
        return Ok(DEFAULT_FACTOR);
    }
    let d = get_d(&pool.normalized(), pool.amplification)?;
    to_u128(U256::from(d) * U256::from(DEFAULT_FACTOR) / U256::from(pool.lp_supply))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: u128 = DEFAULT_FACTOR;

    fn balanced(per_coin: u128) -> Vec<u128> {
        vec![per_coin * ONE; 3]
    }

    #[test]
    fn test_balanced_pool_d_equals_sum() {
        let d = get_d(&balanced(1_000_000), 200).unwrap();
        let sum = 3_000_000 * ONE;
        assert!(d.abs_diff(sum) <= 3, "D={} sum={}", d, sum);
    }

    #[test]
    fn test_balanced_pool_prices_at_par() {
        let prices = marginal_prices(&balanced(1_000_000), 200).unwrap();
        for p in prices {
            assert_eq!(p, ONE);
        }
    }

    #[test]
    fn test_scarce_coin_is_dearer() {
        // Coin 1 scarce, coin 2 plentiful
        let xp = vec![1_000_000 * ONE, 200_000 * ONE, 1_800_000 * ONE];
        let prices = marginal_prices(&xp, 200).unwrap();
        assert!(prices[1] > prices[0]);
        assert!(prices[2] < prices[0]);
    }

    #[test]
    fn test_high_amp_keeps_prices_tight() {
        let xp = vec![1_000_000 * ONE, 900_000 * ONE, 1_100_000 * ONE];
        let low = marginal_prices(&xp, 10).unwrap();
        let high = marginal_prices(&xp, 2_000).unwrap();
        assert!(high[1].abs_diff(high[2]) < low[1].abs_diff(low[2]));
    }

    #[test]
    fn test_zero_balance_rejected() {
        let xp = vec![ONE, 0, ONE];
        assert!(matches!(get_d(&xp, 200), Err(StrataError::PoolUnavailable(_))));
    }

    #[test]
    fn test_virtual_price() {
        let pool = PoolReserves {
            balances: vec![1_000_000 * ONE, 1_000_000 * 1_000_000, 1_000_000 * 1_000_000],
            decimals: vec![18, 6, 6],
            amplification: 200,
            lp_supply: 2_900_000 * ONE,
        };
        let vp = virtual_price(&pool).unwrap();
        // D ~= 3M, supply 2.9M -> vp ~= 1.0345
        assert!(vp > 1_034_000_000_000_000_000 && vp < 1_035_000_000_000_000_000);
    }

    #[test]
    fn test_virtual_price_unminted_pool() {
        let pool = PoolReserves {
            balances: vec![ONE, 1_000_000, 1_000_000],
            decimals: vec![18, 6, 6],
            amplification: 200,
            lp_supply: 0,
        };
        assert_eq!(virtual_price(&pool).unwrap(), ONE);
    }
}
