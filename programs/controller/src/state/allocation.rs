//! Governance allocation targets

use serde::{Deserialize, Serialize};
use strata_common::{AllocationIssue, StrataError, PERCENT_FACTOR};

use super::vault::validate_percents;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationTarget {
    /// Target split of stablecoin-vault capital per asset (bps, sums to 10_000)
    pub stablecoin_percents: Vec<u32>,
    /// Target share of total assets in the pool LP vault (bps)
    pub curve_vault_percent: u32,
    /// Tolerance band around every target (bps)
    pub exposure_buffer_bps: u32,
}

impl Default for AllocationTarget {
    fn default() -> Self {
        Self {
            stablecoin_percents: vec![3_000, 4_000, 3_000],
            curve_vault_percent: 1_000, // 10%
            exposure_buffer_bps: 50,
        }
    }
}

impl AllocationTarget {
    pub fn validate(&self, n_assets: usize) -> Result<(), StrataError> {
        validate_percents(&self.stablecoin_percents, n_assets)?;
        if self.curve_vault_percent > PERCENT_FACTOR {
            return Err(StrataError::AllocationInvariantViolation(AllocationIssue::OutOfRange(
                self.curve_vault_percent,
            )));
        }
        Ok(())
    }

    pub fn set_stablecoin_percents(&mut self, percents: &[u32]) -> Result<(), StrataError> {
        validate_percents(percents, self.stablecoin_percents.len())?;
        self.stablecoin_percents = percents.to_vec();
        Ok(())
    }

    pub fn set_curve_vault_percent(&mut self, bps: u32) -> Result<(), StrataError> {
        if bps > PERCENT_FACTOR {
            return Err(StrataError::AllocationInvariantViolation(AllocationIssue::OutOfRange(bps)));
        }
        self.curve_vault_percent = bps;
        Ok(())
    }

    /// Share of total assets each stablecoin vault should hold (bps of total)
    pub fn stable_share_of_total(&self, asset: usize) -> u32 {
        let pct = self.stablecoin_percents.get(asset).copied().unwrap_or(0) as u64;
        (pct * (PERCENT_FACTOR - self.curve_vault_percent) as u64 / PERCENT_FACTOR as u64) as u32
    }
}
