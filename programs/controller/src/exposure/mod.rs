//! Exposure of the protocol's capital to stablecoins, protocols and the pool
//!
//! `SystemState` is a read-only snapshot collected once per action;
//! everything in this module is a pure function of it.

pub mod calculator;
pub mod snapshot;

pub use calculator::*;
pub use snapshot::*;

use serde::{Deserialize, Serialize};
use strata_common::{AssetId, PERCENT_FACTOR};

/// A fixed share of the pool vault known to sit in one protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolOverride {
    pub protocol: usize,
    /// Share of the pool vault exposure attributed to `protocol` (bps)
    pub share_bps: u32,
}

/// Snapshot of where capital sits, valued in USD (18 decimals)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemState {
    /// Everything valued: vaults, pool vault and pending deposits
    pub total_usd: u128,
    /// Pool LP vault value
    pub curve_usd: u128,
    /// Pool LP vault holdings (LP units)
    pub curve_lp: u128,
    /// Unrouted deposits per coin
    pub pending_usd: Vec<u128>,
    /// Stablecoin vault values
    pub vault_usd: Vec<u128>,
    /// Stablecoin vault holdings (native units)
    pub vault_amounts: Vec<u128>,
    /// Strategy values per vault: `[vault][strategy]`
    pub strategy_usd: Vec<Vec<u128>>,
    /// Protected / Growth (bps)
    pub utilisation_bps: u128,
    pub stablecoin_percents: Vec<u32>,
    pub curve_vault_percent: u32,
    pub exposure_buffer_bps: u32,
    /// Share of pending deposits headed for the pool vault (bps)
    pub skim_bps: u32,
    /// Asset left out of valuation in emergency mode
    pub excluded: Option<AssetId>,
}

impl SystemState {
    pub fn n_assets(&self) -> usize {
        self.vault_usd.len()
    }

    pub fn pending_total(&self) -> u128 {
        self.pending_usd.iter().sum()
    }

    /// Protocols referenced by any vault strategy
    pub fn n_protocols(&self) -> usize {
        self.strategy_usd.iter().map(|s| s.len()).max().unwrap_or(0)
    }
}

/// Current exposure in bps of total assets
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExposureSnapshot {
    pub stablecoin_exposure: Vec<u32>,
    pub protocol_exposure: Vec<u32>,
    pub curve_exposure: u32,
    /// Some stablecoin is outside its band
    pub stablecoin_exposed: bool,
    /// Some protocol is over its ceiling plus buffer
    pub protocol_exposed: bool,
    /// The pool vault is outside its band
    pub curve_exposed: bool,
}

impl ExposureSnapshot {
    pub fn any_exposed(&self) -> bool {
        self.stablecoin_exposed || self.protocol_exposed || self.curve_exposed
    }

    /// Pool plus stablecoin exposure; 10_000 for a non-empty system
    pub fn total_bps(&self) -> u64 {
        self.stablecoin_exposure.iter().map(|v| *v as u64).sum::<u64>() + self.curve_exposure as u64
    }
}

pub(crate) fn bps_u32(v: u128) -> u32 {
    v.min(PERCENT_FACTOR as u128) as u32
}
