//! Units and asset descriptors shared by every component

use serde::{Deserialize, Serialize};

pub use tranche_model::Side as TrancheKind;

/// USD and LP values are fixed point with 18 decimals
pub const DEFAULT_FACTOR: u128 = tranche_model::ONE_USD;

/// Smallest value a tranche may hold after a PnL event ($1)
pub const MIN_UNIT: u128 = DEFAULT_FACTOR;

/// Basis-point denominator (10_000 = 100%)
pub const PERCENT_FACTOR: u32 = 10_000;

/// Reference feed prices carry 8 decimals
pub const FEED_DECIMALS: u8 = 8;

/// Index of a stablecoin in the pool and in every per-asset vector
pub type AssetId = usize;

/// A stablecoin the protocol accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    /// Native decimals of the token (18 for DAI, 6 for USDC/USDT)
    pub decimals: u8,
}

impl Asset {
    pub fn new(symbol: &str, decimals: u8) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
        }
    }

    /// `10^decimals`
    pub fn unit(&self) -> u128 {
        10u128.pow(self.decimals as u32)
    }
}

/// Scale a native token amount to 18 decimals
pub fn normalize(amount: u128, decimals: u8) -> u128 {
    if decimals <= 18 {
        amount.saturating_mul(10u128.pow((18 - decimals) as u32))
    } else {
        amount / 10u128.pow((decimals - 18) as u32)
    }
}

/// Scale an 18-decimal amount back to native token decimals (rounds down)
pub fn denormalize(amount: u128, decimals: u8) -> u128 {
    if decimals <= 18 {
        amount / 10u128.pow((18 - decimals) as u32)
    } else {
        amount.saturating_mul(10u128.pow((decimals - 18) as u32))
    }
}

/// Sum of a bps vector (u64 so it cannot wrap on long inputs)
pub fn bps_sum(values: &[u32]) -> u64 {
    values.iter().map(|v| *v as u64).sum()
}

/// The three-coin deployment the protocol launched with
pub fn default_assets() -> Vec<Asset> {
    vec![Asset::new("DAI", 18), Asset::new("USDC", 6), Asset::new("USDT", 6)]
}
