//! Reference price feed
//!
//! Supplies an independent USD price per stablecoin, used to cross-check the
//! pool-derived rates. Prices carry `FEED_DECIMALS` (8) decimals.

use strata_common::{AssetId, StrataError};

/// `$1.00` at feed precision
pub const FEED_ONE: u128 = 100_000_000;

/// Source of reference prices
pub trait PriceFeed {
    /// Latest price for `asset` (8 decimals)
    fn latest_price(&self, asset: AssetId) -> Result<u128, StrataError>;
}

/// In-memory feed, updated by whoever owns it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticFeed {
    prices: Vec<u128>,
}

impl StaticFeed {
    pub fn new(prices: Vec<u128>) -> Self {
        Self { prices }
    }

    /// Every asset at `$1.00`
    pub fn at_par(n_assets: usize) -> Self {
        Self::new(vec![FEED_ONE; n_assets])
    }

    pub fn prices(&self) -> &[u128] {
        &self.prices
    }

    pub fn set_price(&mut self, asset: AssetId, price: u128) -> Result<(), StrataError> {
        let slot = self.prices.get_mut(asset).ok_or(StrataError::UnknownAsset(asset))?;
        *slot = price;
        Ok(())
    }
}

impl PriceFeed for StaticFeed {
    fn latest_price(&self, asset: AssetId) -> Result<u128, StrataError> {
        match self.prices.get(asset) {
            Some(0) => Err(StrataError::PriceUnsafe {
                asset,
                deviation_bps: 10_000,
            }),
            Some(p) => Ok(*p),
            None => Err(StrataError::UnknownAsset(asset)),
        }
    }
}

impl<T: PriceFeed + ?Sized> PriceFeed for &T {
    fn latest_price(&self, asset: AssetId) -> Result<u128, StrataError> {
        (**self).latest_price(asset)
    }
}
