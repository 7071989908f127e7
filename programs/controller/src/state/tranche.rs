//! Tranche accounting record

use strata_common::{TrancheKind, MIN_UNIT};

/// Last computed value of one share class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tranche {
    pub kind: TrancheKind,
    /// Total USD value at the last accounting step (18 decimals)
    pub last_assets: u128,
    /// Whether value changes reach holder balances through a rebase
    pub rebase_enabled: bool,
}

impl Tranche {
    pub fn new(kind: TrancheKind, last_assets: u128, rebase_enabled: bool) -> Self {
        Self {
            kind,
            last_assets,
            rebase_enabled,
        }
    }

    /// Value a withdrawal may remove without breaching the floor
    pub fn withdrawable(&self) -> u128 {
        self.last_assets.saturating_sub(MIN_UNIT)
    }
}
