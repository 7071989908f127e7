//! Vault position: idle buffer plus capital deployed into strategies
//!
//! Amounts are in the vault's own token (native coin decimals for a
//! stablecoin vault, 18-decimal LP units for the pool vault).

use serde::{Deserialize, Serialize};
use strata_common::{bps_sum, AllocationIssue, StrataError, PERCENT_FACTOR};
use tranche_model::math::{bps_of, min_u128, sub_u128};

/// Funds held by one strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrategyPosition {
    pub invested: u128,
}

/// Investment policy knobs for one vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultPolicy {
    /// Share of total assets kept liquid (bps)
    pub reserve_ratio_bps: u32,
    /// Minimum idle buffer before investing (whole tokens)
    pub invest_threshold: u64,
    /// Initial split across strategies (bps, sums to 10_000)
    pub strategy_ratios: Vec<u32>,
    /// Ratio change needed before existing positions are re-split (bps)
    pub strategy_ratio_buffer_bps: u32,
}

impl Default for VaultPolicy {
    fn default() -> Self {
        Self {
            reserve_ratio_bps: 500,     // 5%
            invest_threshold: 100,      // 100 tokens
            strategy_ratios: vec![6_000, 4_000],
            strategy_ratio_buffer_bps: 500,
        }
    }
}

impl VaultPolicy {
    /// Pool vault default: one strategy taking everything
    pub fn single_strategy() -> Self {
        Self {
            strategy_ratios: vec![10_000],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPosition {
    /// Token decimals (18 for LP units)
    pub decimals: u8,
    /// Uninvested balance
    pub buffer: u128,
    pub strategies: Vec<StrategyPosition>,
    /// Current target split across strategies (bps)
    pub strategy_ratios: Vec<u32>,
    /// Split in force at the last full re-split
    pub last_invested_ratios: Vec<u32>,
    pub reserve_ratio_bps: u32,
    pub invest_threshold: u128,
    pub strategy_ratio_buffer_bps: u32,
}

pub(crate) fn validate_percents(values: &[u32], expected_len: usize) -> Result<(), StrataError> {
    if values.len() != expected_len {
        return Err(StrataError::AllocationInvariantViolation(AllocationIssue::Length {
            expected: expected_len,
            actual: values.len(),
        }));
    }
    if let Some(v) = values.iter().find(|v| **v > PERCENT_FACTOR) {
        return Err(StrataError::AllocationInvariantViolation(AllocationIssue::OutOfRange(*v)));
    }
    let sum = bps_sum(values);
    if sum != PERCENT_FACTOR as u64 {
        return Err(StrataError::AllocationInvariantViolation(AllocationIssue::PercentSum {
            expected: PERCENT_FACTOR as u64,
            actual: sum,
        }));
    }
    Ok(())
}

/// Split `amount` by `ratios`; the last slot absorbs rounding
pub(crate) fn split_by_ratios(amount: u128, ratios: &[u32]) -> Vec<u128> {
    let mut parts: Vec<u128> = ratios.iter().map(|r| bps_of(amount, *r as u128)).collect();
    let assigned: u128 = parts.iter().sum();
    if let Some(last) = parts.last_mut() {
        *last += amount - assigned;
    }
    parts
}

impl VaultPosition {
    pub fn new(decimals: u8, policy: &VaultPolicy) -> Result<Self, StrataError> {
        validate_percents(&policy.strategy_ratios, policy.strategy_ratios.len().max(1))?;
        Ok(Self {
            decimals,
            buffer: 0,
            strategies: vec![StrategyPosition::default(); policy.strategy_ratios.len()],
            strategy_ratios: policy.strategy_ratios.clone(),
            last_invested_ratios: policy.strategy_ratios.clone(),
            reserve_ratio_bps: policy.reserve_ratio_bps,
            invest_threshold: policy.invest_threshold as u128,
            strategy_ratio_buffer_bps: policy.strategy_ratio_buffer_bps,
        })
    }

    pub fn unit(&self) -> u128 {
        10u128.pow(self.decimals as u32)
    }

    pub fn invested(&self) -> u128 {
        self.strategies.iter().map(|s| s.invested).sum()
    }

    pub fn total_assets(&self) -> u128 {
        self.buffer.saturating_add(self.invested())
    }

    /// Amount the policy keeps liquid
    pub fn hold(&self) -> u128 {
        bps_of(self.total_assets(), self.reserve_ratio_bps as u128)
    }

    /// Buffer above both the invest threshold and the hold
    pub fn invest_trigger(&self) -> bool {
        let threshold = self.invest_threshold.saturating_mul(self.unit());
        self.buffer > threshold && self.buffer - threshold > self.hold()
    }

    fn ratio_change_bps(&self) -> u32 {
        self.strategy_ratios
            .iter()
            .zip(self.last_invested_ratios.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0)
    }

    /// Move the buffer down to the hold, deploying the rest by `strategy_ratios`.
    ///
    /// Existing positions are only re-split when the ratios moved by more than
    /// `strategy_ratio_buffer_bps` since the last re-split. Returns the amount
    /// that left the buffer.
    pub fn invest(&mut self) -> u128 {
        let hold = self.hold();
        if self.buffer <= hold {
            return 0;
        }

        let moved = self.buffer - hold;
        if self.ratio_change_bps() > self.strategy_ratio_buffer_bps {
            // Full re-split of everything above the hold
            let deployable = self.total_assets() - hold;
            let parts = split_by_ratios(deployable, &self.strategy_ratios);
            for (s, amount) in self.strategies.iter_mut().zip(parts) {
                s.invested = amount;
            }
            self.last_invested_ratios = self.strategy_ratios.clone();
        } else {
            let parts = split_by_ratios(moved, &self.last_invested_ratios);
            for (s, amount) in self.strategies.iter_mut().zip(parts) {
                s.invested = s.invested.saturating_add(amount);
            }
        }
        self.buffer = hold;
        moved
    }

    pub fn deposit(&mut self, amount: u128) {
        self.buffer = self.buffer.saturating_add(amount);
    }

    /// Free up to `amount`: buffer first, then strategies from the last one
    /// backwards. Returns what was actually freed.
    pub fn withdraw(&mut self, amount: u128) -> u128 {
        let from_buffer = min_u128(self.buffer, amount);
        self.buffer -= from_buffer;
        let mut remaining = amount - from_buffer;

        for s in self.strategies.iter_mut().rev() {
            if remaining == 0 {
                break;
            }
            let take = min_u128(s.invested, remaining);
            s.invested -= take;
            remaining -= take;
        }
        amount - remaining
    }

    /// Move up to `amount` from strategy `index` into the buffer
    pub fn divest_strategy(&mut self, index: usize, amount: u128) -> Result<u128, StrataError> {
        let s = self
            .strategies
            .get_mut(index)
            .ok_or(StrataError::UnknownStrategy { vault: 0, strategy: index })?;
        let take = min_u128(s.invested, amount);
        s.invested -= take;
        self.buffer = self.buffer.saturating_add(take);
        Ok(take)
    }

    pub fn set_strategy_ratios(&mut self, ratios: &[u32]) -> Result<(), StrataError> {
        validate_percents(ratios, self.strategies.len())?;
        self.strategy_ratios = ratios.to_vec();
        Ok(())
    }

    /// Apply a harvest report to one strategy
    pub fn report(&mut self, index: usize, profit: u128, loss: u128) -> Result<(), StrataError> {
        let s = self
            .strategies
            .get_mut(index)
            .ok_or(StrataError::UnknownStrategy { vault: 0, strategy: index })?;
        s.invested = sub_u128(s.invested.saturating_add(profit), loss);
        Ok(())
    }
}
