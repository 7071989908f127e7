//! Protocol configuration
//!
//! Every section deserializes from TOML with per-field defaults, so a config
//! file only needs the values it overrides.

use serde::{Deserialize, Serialize};
use strata_common::{bps_sum, default_assets, AllocationIssue, Asset, StrataError, PERCENT_FACTOR};
use strata_oracle::GuardParams;

use crate::exposure::ProtocolOverride;
use crate::state::{AllocationTarget, VaultPolicy};

/// Tranche accounting parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PnlParams {
    /// Share of strategy gains paid to Growth as a performance bonus (bps)
    pub performance_fee_bps: u32,
    /// Withdrawal fee charged on Growth redemptions (bps)
    pub withdrawal_fee_gvt_bps: u32,
    /// Withdrawal fee charged on Protected redemptions (bps)
    pub withdrawal_fee_pwrd_bps: u32,
    /// Move in total assets, relative to the ledger, that counts as a price event (bps)
    pub price_change_threshold_bps: u32,
    /// Protected tranche participates in profit and bonuses
    pub pwrd_rebase: bool,
    /// Max utilisation a Protected deposit may push the book to (bps)
    pub utilisation_limit_pwrd_bps: u32,
    /// Max utilisation a Growth withdrawal may push the book to (bps)
    pub utilisation_limit_gvt_bps: u32,
}

impl Default for PnlParams {
    fn default() -> Self {
        Self {
            performance_fee_bps: 2_000, // 20%
            withdrawal_fee_gvt_bps: 50,
            withdrawal_fee_pwrd_bps: 50,
            price_change_threshold_bps: 1,
            pwrd_rebase: true,
            utilisation_limit_pwrd_bps: 10_000,
            utilisation_limit_gvt_bps: 10_000,
        }
    }
}

/// Per-protocol exposure adjustments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureParams {
    pub overrides: Vec<ProtocolOverride>,
}

impl Default for ExposureParams {
    fn default() -> Self {
        Self {
            // Part of the pool vault sits in the secondary lending protocol
            overrides: vec![ProtocolOverride { protocol: 1, share_bps: 3_119 }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultParams {
    /// Policy applied to every stablecoin vault
    pub stable: VaultPolicy,
    /// Policy of the pool LP vault
    pub curve: VaultPolicy,
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            stable: VaultPolicy::default(),
            curve: VaultPolicy::single_strategy(),
        }
    }
}

/// Routing and rebalancing parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalanceParams {
    /// Moves smaller than this many whole tokens are skipped
    pub swap_threshold: u64,
    /// A deposit above this share of total assets is routed immediately (bps)
    pub big_fish_threshold_bps: u32,
    /// ...and above this absolute size (whole USD)
    pub big_fish_absolute_usd: u64,
    /// Pending deposits are skimmed into the pool vault while it holds less than this (bps)
    pub curve_percent_threshold_bps: u32,
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self {
            swap_threshold: 2,
            big_fish_threshold_bps: 1_000, // 10%
            big_fish_absolute_usd: 200,
            curve_percent_threshold_bps: 1_200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub assets: Vec<Asset>,
    pub pnl: PnlParams,
    pub guard: GuardParams,
    pub allocation: AllocationTarget,
    pub exposure: ExposureParams,
    pub vaults: VaultParams,
    pub rebalance: RebalanceParams,
    /// Ledger holder receiving performance bonuses
    pub reward_holder: String,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            pnl: PnlParams::default(),
            guard: GuardParams::default(),
            allocation: AllocationTarget::default(),
            exposure: ExposureParams::default(),
            vaults: VaultParams::default(),
            rebalance: RebalanceParams::default(),
            reward_holder: "rewards".to_string(),
        }
    }
}

impl StrataConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reject inconsistent percentages before any component is built
    pub fn validate(&self) -> Result<(), StrataError> {
        self.allocation.validate(self.assets.len())?;

        // Overrides carve up the pool vault, so together they cannot exceed it
        let shares: Vec<u32> = self.exposure.overrides.iter().map(|o| o.share_bps).collect();
        let sum = bps_sum(&shares);
        if sum > PERCENT_FACTOR as u64 {
            return Err(StrataError::AllocationInvariantViolation(AllocationIssue::PercentSum {
                expected: PERCENT_FACTOR as u64,
                actual: sum,
            }));
        }

        for bps in [
            self.pnl.performance_fee_bps,
            self.pnl.withdrawal_fee_gvt_bps,
            self.pnl.withdrawal_fee_pwrd_bps,
            self.vaults.stable.reserve_ratio_bps,
            self.vaults.curve.reserve_ratio_bps,
        ] {
            if bps > PERCENT_FACTOR {
                return Err(StrataError::AllocationInvariantViolation(AllocationIssue::OutOfRange(bps)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = StrataConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.assets.len(), 3);
        assert_eq!(config.pnl.performance_fee_bps, 2_000);
        assert_eq!(config.guard.oracle_tolerance_bps, 50);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = StrataConfig::from_toml_str(
            r#"
            reward_holder = "treasury"

            [pnl]
            performance_fee_bps = 1000

            [allocation]
            stablecoin_percents = [2000, 5000, 3000]
            "#,
        )
        .unwrap();

        assert_eq!(config.reward_holder, "treasury");
        assert_eq!(config.pnl.performance_fee_bps, 1_000);
        assert_eq!(config.pnl.withdrawal_fee_gvt_bps, 50);
        assert_eq!(config.allocation.stablecoin_percents, vec![2_000, 5_000, 3_000]);
        assert_eq!(config.allocation.curve_vault_percent, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = StrataConfig::default();
        let s = config.to_toml_string().unwrap();
        assert_eq!(StrataConfig::from_toml_str(&s).unwrap(), config);
    }

    #[test]
    fn test_bad_fee_rejected() {
        let mut config = StrataConfig::default();
        config.pnl.performance_fee_bps = 12_000;
        assert!(config.validate().is_err());
    }
}
