//! Rebalance execution
//!
//! Applies the planner's output to the holdings in a fixed order:
//! 1. route pending deposits into the vaults,
//! 2. pull over-exposed protocols back into vault buffers,
//! 3. withdraw surplus slots,
//! 4. deposit the proceeds into deficit slots by the deficit percents.
//!
//! Coins change hands at the guard's marginal prices. A vault that cannot
//! free the full amount leaves the allocation partially improved; that is
//! logged, not treated as a failure.

use strata_common::{AllocationIssue, StrataError};
use strata_oracle::{PriceFeed, PriceGuard};
use tranche_model::math::bps_of;

use super::planner::{calc_protocol_withdrawal, calc_vault_target_delta, pro_rata};
use crate::config::RebalanceParams;
use crate::exposure::{prepare_calculation, strategy_targets, ExposureCalculator, SystemState};
use crate::state::{AllocationTarget, Holdings};

/// What one rebalance moved (USD, 18 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebalanceReport {
    pub routed_usd: u128,
    pub pulled_down_usd: u128,
    pub withdrawn_usd: u128,
    pub deposited_usd: u128,
    /// Requested withdrawals the vaults could not free
    pub shortfall_usd: u128,
}

pub struct Rebalancer<'a, F> {
    guard: &'a PriceGuard<F>,
    calculator: &'a ExposureCalculator,
    target: &'a AllocationTarget,
    params: &'a RebalanceParams,
    utilisation_bps: u128,
}

impl<'a, F: PriceFeed> Rebalancer<'a, F> {
    pub fn new(
        guard: &'a PriceGuard<F>,
        calculator: &'a ExposureCalculator,
        target: &'a AllocationTarget,
        params: &'a RebalanceParams,
        utilisation_bps: u128,
    ) -> Self {
        Self {
            guard,
            calculator,
            target,
            params,
            utilisation_bps,
        }
    }

    fn snapshot(&self, holdings: &Holdings) -> Result<SystemState, StrataError> {
        prepare_calculation(self.guard, holdings, self.target, self.utilisation_bps, 0, None)
    }

    /// Move every pending deposit into its vault, skimming `skim_bps` of it
    /// into the pool vault as LP units. Returns the USD routed.
    pub fn route_pending(&self, holdings: &mut Holdings, skim_bps: u32) -> Result<u128, StrataError> {
        let mut routed = 0u128;
        for asset in 0..holdings.n_assets() {
            let amount = holdings.pending[asset];
            if amount == 0 {
                continue;
            }
            let skim = bps_of(amount, skim_bps as u128);
            if skim > 0 {
                let lp = self.guard.usd_to_lp(self.guard.single_stable_to_usd(skim, asset)?)?;
                holdings.curve_vault.deposit(lp);
            }
            holdings.vaults[asset].deposit(amount - skim);
            holdings.pending[asset] = 0;
            routed = routed.saturating_add(self.guard.single_stable_to_usd(amount, asset)?);
            log::debug!("Rebalance: routed {} of asset {} ({} skimmed)", amount, asset, skim);
        }
        Ok(routed)
    }

    /// Bring every two-strategy vault's split in line with the utilisation
    /// and move strategy capital above the protocol ceilings into buffers.
    pub fn pull_down_protocols(&self, holdings: &mut Holdings) -> Result<u128, StrataError> {
        let targets = strategy_targets(self.utilisation_bps);
        for vault in holdings.vaults.iter_mut().filter(|v| v.strategies.len() == targets.len()) {
            vault.set_strategy_ratios(&targets)?;
        }

        let s = self.snapshot(holdings)?;
        let mut pulled = 0u128;
        for pull in calc_protocol_withdrawal(self.calculator, &s) {
            for (asset, usd) in pull.per_vault.iter().enumerate().filter(|(_, usd)| **usd > 0) {
                let amount = self.guard.single_stable_from_usd(*usd, asset)?;
                let moved = holdings.vaults[asset].divest_strategy(pull.protocol, amount)?;
                pulled = pulled.saturating_add(self.guard.single_stable_to_usd(moved, asset)?);
            }
            log::debug!("Rebalance: protocol {} pulled down by {} USD", pull.protocol, pull.usd);
        }
        Ok(pulled)
    }

    fn withdraw_slot(&self, holdings: &mut Holdings, slot: usize, usd: u128) -> Result<(u128, u128), StrataError> {
        if slot == holdings.n_assets() {
            let lp = self.guard.usd_to_lp(usd)?;
            let got = holdings.curve_vault.withdraw(lp);
            let got_usd = self.guard.lp_to_usd(got)?;
            return Ok((got_usd, usd.saturating_sub(got_usd)));
        }
        let amount = self.guard.single_stable_from_usd(usd, slot)?;
        let got = holdings.vaults[slot].withdraw(amount);
        let got_usd = self.guard.single_stable_to_usd(got, slot)?;
        let short = if got < amount { usd.saturating_sub(got_usd) } else { 0 };
        Ok((got_usd, short))
    }

    fn deposit_slot(&self, holdings: &mut Holdings, slot: usize, usd: u128) -> Result<(), StrataError> {
        if slot == holdings.n_assets() {
            holdings.curve_vault.deposit(self.guard.usd_to_lp(usd)?);
        } else {
            holdings.vaults[slot].deposit(self.guard.single_stable_from_usd(usd, slot)?);
        }
        Ok(())
    }

    /// Run the full sequence, then confirm no protocol ended above its
    /// ceiling plus the exposure buffer.
    pub fn rebalance(&self, holdings: &mut Holdings, skim_bps: u32) -> Result<RebalanceReport, StrataError> {
        let mut report = RebalanceReport {
            routed_usd: self.route_pending(holdings, skim_bps)?,
            pulled_down_usd: self.pull_down_protocols(holdings)?,
            ..RebalanceReport::default()
        };

        let s = self.snapshot(holdings)?;
        let delta = calc_vault_target_delta(&s, self.params.swap_threshold);
        if !delta.is_empty() {
            for (slot, usd) in delta.withdraw_usd.iter().enumerate().filter(|(_, usd)| **usd > 0) {
                let (got, short) = self.withdraw_slot(holdings, slot, *usd)?;
                report.withdrawn_usd = report.withdrawn_usd.saturating_add(got);
                report.shortfall_usd = report.shortfall_usd.saturating_add(short);
                log::debug!("Rebalance: slot {} withdrew {} of {} USD", slot, got, usd);
            }
            if report.shortfall_usd > 0 {
                log::warn!(
                    "Rebalance: vaults short by {} USD, allocation only partially restored",
                    report.shortfall_usd
                );
            }

            let weights: Vec<u128> = delta.deposit_percents.iter().map(|p| *p as u128).collect();
            let parts = pro_rata(report.withdrawn_usd, &weights);
            for (slot, usd) in parts.into_iter().enumerate().filter(|(_, usd)| *usd > 0) {
                self.deposit_slot(holdings, slot, usd)?;
                report.deposited_usd = report.deposited_usd.saturating_add(usd);
                log::debug!("Rebalance: slot {} received {} USD", slot, usd);
            }
        }

        self.verify(holdings)?;
        log::info!(
            "Rebalance: routed={} pulled_down={} withdrawn={} deposited={}",
            report.routed_usd,
            report.pulled_down_usd,
            report.withdrawn_usd,
            report.deposited_usd
        );
        Ok(report)
    }

    fn verify(&self, holdings: &Holdings) -> Result<(), StrataError> {
        let s = self.snapshot(holdings)?;
        let exposure = self.calculator.get_exact_risk_exposure(&s);
        let ceilings = self.calculator.ceilings(s.utilisation_bps, s.curve_vault_percent, exposure.protocol_exposure.len());
        let buffer = s.exposure_buffer_bps;

        for (protocol, (e, c)) in exposure.protocol_exposure.iter().zip(ceilings.iter()).enumerate() {
            if *e > c.saturating_add(buffer) {
                return Err(StrataError::AllocationInvariantViolation(AllocationIssue::ProtocolOverCeiling {
                    protocol,
                    exposure: *e,
                    ceiling: *c,
                }));
            }
        }
        Ok(())
    }
}
