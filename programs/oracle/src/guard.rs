//! Price guard: pool-priced conversions behind a two-sided safety check
//!
//! Every conversion prices coins at the pool's marginal rate and LP units at
//! the pool's virtual price. Before any conversion is honoured the guard
//! checks that
//! 1. the pool's relative coin prices agree with the reference feed within
//!    `oracle_tolerance_bps`, and
//! 2. the pool's relative coin prices have not drifted from the last recorded
//!    snapshot by more than `curve_tolerance_bps`.
//!
//! A failed check aborts the call with `PriceUnsafe`; nothing else is
//! observable.

use serde::{Deserialize, Serialize};
use strata_common::{denormalize, normalize, AssetId, StrataError, DEFAULT_FACTOR, PERCENT_FACTOR};
use tranche_model::math::{abs_diff_u128, mul_div};

use crate::feed::PriceFeed;
use crate::stableswap::{marginal_prices, virtual_price, PoolReserves};

/// Governance-tunable tolerances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardParams {
    /// Max pool vs feed disagreement (bps)
    pub oracle_tolerance_bps: u32,
    /// Max pool drift from the recorded ratios (bps)
    pub curve_tolerance_bps: u32,
}

impl Default for GuardParams {
    fn default() -> Self {
        Self {
            oracle_tolerance_bps: 50, // 0.5%
            curve_tolerance_bps: 20,  // 0.2%
        }
    }
}

/// Which reference prices are distrusted (emergency mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedBypass {
    #[default]
    None,
    /// Skip the feed for one failed asset
    Asset(AssetId),
    /// Skip the feed entirely, pool-only valuation
    All,
}

impl FeedBypass {
    fn skips(&self, asset: AssetId) -> bool {
        match self {
            FeedBypass::None => false,
            FeedBypass::Asset(a) => *a == asset,
            FeedBypass::All => true,
        }
    }

    /// A failed coin's own pool price is expected to move; only the feed
    /// is distrusted under `All`, so the pool stays checked
    fn excludes_from_pool(&self, asset: AssetId) -> bool {
        matches!(self, FeedBypass::Asset(a) if *a == asset)
    }
}

/// Prices that passed the safety check, valid for one call
struct Quote {
    prices: Vec<u128>,
    virtual_price: u128,
}

pub struct PriceGuard<F> {
    feed: F,
    pool: PoolReserves,
    params: GuardParams,
    /// Pool ratios recorded by the last successful `update_ratios`
    last_ratios: Option<Vec<u128>>,
    bypass: FeedBypass,
}

/// Deviation of `actual` from `expected` in bps
fn deviation_bps(actual: u128, expected: u128) -> u128 {
    if expected == 0 {
        return PERCENT_FACTOR as u128;
    }
    mul_div(abs_diff_u128(actual, expected), PERCENT_FACTOR as u128, expected)
}

/// Price of each coin relative to coin 0 (18 decimals)
fn relative_to_first(prices: &[u128]) -> Vec<u128> {
    let base = prices.first().copied().unwrap_or(0);
    prices.iter().map(|p| mul_div(*p, DEFAULT_FACTOR, base)).collect()
}

impl<F: PriceFeed> PriceGuard<F> {
    pub fn new(feed: F, pool: PoolReserves, params: GuardParams) -> Result<Self, StrataError> {
        pool.validate()?;
        Ok(Self {
            feed,
            pool,
            params,
            last_ratios: None,
            bypass: FeedBypass::None,
        })
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn feed_mut(&mut self) -> &mut F {
        &mut self.feed
    }

    pub fn pool(&self) -> &PoolReserves {
        &self.pool
    }

    pub fn params(&self) -> GuardParams {
        self.params
    }

    pub fn bypass(&self) -> FeedBypass {
        self.bypass
    }

    pub fn last_ratios(&self) -> Option<&[u128]> {
        self.last_ratios.as_deref()
    }

    /// Replace the pool snapshot (balances move outside this crate)
    pub fn update_pool(&mut self, pool: PoolReserves) -> Result<(), StrataError> {
        pool.validate()?;
        self.pool = pool;
        Ok(())
    }

    pub fn set_oracle_tolerance(&mut self, bps: u32) {
        log::info!("Guard: oracle tolerance {} -> {} bps", self.params.oracle_tolerance_bps, bps);
        self.params.oracle_tolerance_bps = bps;
    }

    pub fn set_curve_tolerance(&mut self, bps: u32) {
        log::info!("Guard: curve tolerance {} -> {} bps", self.params.curve_tolerance_bps, bps);
        self.params.curve_tolerance_bps = bps;
    }

    pub fn set_bypass(&mut self, bypass: FeedBypass) {
        if bypass != FeedBypass::None {
            log::warn!("Guard: reference feed bypass enabled: {:?}", bypass);
        }
        self.bypass = bypass;
    }

    fn check_asset(&self, asset: AssetId) -> Result<(), StrataError> {
        if asset >= self.pool.n_coins() {
            return Err(StrataError::UnknownAsset(asset));
        }
        Ok(())
    }

    fn pool_prices(&self) -> Result<Vec<u128>, StrataError> {
        marginal_prices(&self.pool.normalized(), self.pool.amplification)
    }

    /// Pool vs reference feed, relative to the first trusted coin
    fn oracle_check(&self, prices: &[u128]) -> Result<(), StrataError> {
        let trusted: Vec<AssetId> = (0..prices.len()).filter(|i| !self.bypass.skips(*i)).collect();
        let Some((&base, rest)) = trusted.split_first() else {
            return Ok(());
        };

        let feed_base = self.feed.latest_price(base)?;
        for &i in rest {
            let feed_i = self.feed.latest_price(i)?;
            let pool_ratio = mul_div(prices[i], DEFAULT_FACTOR, prices[base]);
            let feed_ratio = mul_div(feed_i, DEFAULT_FACTOR, feed_base);

            let dev = deviation_bps(pool_ratio, feed_ratio);
            if dev > self.params.oracle_tolerance_bps as u128 {
                log::warn!(
                    "Guard: asset {} pool/feed deviation {} bps > {} bps",
                    i,
                    dev,
                    self.params.oracle_tolerance_bps
                );
                return Err(StrataError::PriceUnsafe { asset: i, deviation_bps: dev });
            }
        }
        Ok(())
    }

    /// Pool vs its own recorded ratios, relative to the first coin still
    /// counted
    fn curve_check(&self, prices: &[u128]) -> Result<(), StrataError> {
        let Some(last) = self.last_ratios.as_ref() else {
            return Ok(());
        };

        let counted: Vec<AssetId> = (0..prices.len().min(last.len()))
            .filter(|i| !self.bypass.excludes_from_pool(*i))
            .collect();
        let Some((&base, rest)) = counted.split_first() else {
            return Ok(());
        };

        for &i in rest {
            let now = mul_div(prices[i], DEFAULT_FACTOR, prices[base]);
            let then = mul_div(last[i], DEFAULT_FACTOR, last[base]);
            let dev = deviation_bps(now, then);
            if dev > self.params.curve_tolerance_bps as u128 {
                log::warn!(
                    "Guard: asset {} pool drift {} bps > {} bps",
                    i,
                    dev,
                    self.params.curve_tolerance_bps
                );
                return Err(StrataError::PriceUnsafe { asset: i, deviation_bps: dev });
            }
        }
        Ok(())
    }

    fn checked_quote(&self) -> Result<Quote, StrataError> {
        let prices = self.pool_prices()?;
        self.oracle_check(&prices)?;
        self.curve_check(&prices)?;
        Ok(Quote {
            prices,
            virtual_price: virtual_price(&self.pool)?,
        })
    }

    /// Run both checks without converting anything
    pub fn safety_check(&self) -> Result<(), StrataError> {
        self.checked_quote().map(|_| ())
    }

    /// Record the current pool ratios as the drift reference.
    ///
    /// Only recorded when the pool agrees with the reference feed.
    pub fn update_ratios(&mut self) -> Result<(), StrataError> {
        let prices = self.pool_prices()?;
        self.oracle_check(&prices)?;
        let ratios = relative_to_first(&prices);
        log::debug!("Guard: recorded pool ratios {:?}", ratios);
        self.last_ratios = Some(ratios);
        Ok(())
    }

    /// Checked marginal prices (18 decimals)
    pub fn prices(&self) -> Result<Vec<u128>, StrataError> {
        Ok(self.checked_quote()?.prices)
    }

    /// Checked LP virtual price (18 decimals)
    pub fn virtual_price(&self) -> Result<u128, StrataError> {
        Ok(self.checked_quote()?.virtual_price)
    }

    fn amount_to_usd(&self, q: &Quote, amount: u128, asset: AssetId) -> u128 {
        mul_div(normalize(amount, self.pool.decimals[asset]), q.prices[asset], DEFAULT_FACTOR)
    }

    fn usd_to_amount(&self, q: &Quote, usd: u128, asset: AssetId) -> u128 {
        denormalize(mul_div(usd, DEFAULT_FACTOR, q.prices[asset]), self.pool.decimals[asset])
    }

    /// USD value of a basket of native coin amounts
    pub fn stable_to_usd(&self, amounts: &[u128]) -> Result<u128, StrataError> {
        if amounts.len() != self.pool.n_coins() {
            return Err(StrataError::UnknownAsset(amounts.len()));
        }
        let q = self.checked_quote()?;
        Ok(amounts
            .iter()
            .enumerate()
            .fold(0u128, |acc, (i, a)| acc.saturating_add(self.amount_to_usd(&q, *a, i))))
    }

    /// LP units worth the same as a basket of coins
    pub fn stable_to_lp(&self, amounts: &[u128]) -> Result<u128, StrataError> {
        let usd = self.stable_to_usd(amounts)?;
        self.usd_to_lp(usd)
    }

    pub fn usd_to_lp(&self, usd: u128) -> Result<u128, StrataError> {
        let q = self.checked_quote()?;
        Ok(mul_div(usd, DEFAULT_FACTOR, q.virtual_price))
    }

    pub fn lp_to_usd(&self, lp: u128) -> Result<u128, StrataError> {
        let q = self.checked_quote()?;
        Ok(mul_div(lp, q.virtual_price, DEFAULT_FACTOR))
    }

    pub fn single_stable_to_usd(&self, amount: u128, asset: AssetId) -> Result<u128, StrataError> {
        self.check_asset(asset)?;
        let q = self.checked_quote()?;
        Ok(self.amount_to_usd(&q, amount, asset))
    }

    /// Native amount of `asset` worth `usd` (rounded down)
    pub fn single_stable_from_usd(&self, usd: u128, asset: AssetId) -> Result<u128, StrataError> {
        self.check_asset(asset)?;
        let q = self.checked_quote()?;
        Ok(self.usd_to_amount(&q, usd, asset))
    }

    pub fn single_stable_from_lp(&self, lp: u128, asset: AssetId) -> Result<u128, StrataError> {
        self.check_asset(asset)?;
        let q = self.checked_quote()?;
        let usd = mul_div(lp, q.virtual_price, DEFAULT_FACTOR);
        Ok(self.usd_to_amount(&q, usd, asset))
    }
}
