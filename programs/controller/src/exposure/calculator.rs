//! Exposure calculation and utilisation-derived protocol ceilings

use strata_common::PERCENT_FACTOR;
use tranche_model::math::{abs_diff_u128, bps_of, mul_div, ratio_bps};

use super::{bps_u32, ExposureSnapshot, ProtocolOverride, SystemState};
use crate::state::vault::split_by_ratios;

const BPS: u128 = PERCENT_FACTOR as u128;

/// Target split between a vault's primary and secondary strategy.
///
/// primary = 1 / (1 + u), secondary = u / (1 + u), in bps.
pub fn strategy_targets(utilisation_bps: u128) -> [u32; 2] {
    let primary = bps_u32(mul_div(BPS, BPS, BPS.saturating_add(utilisation_bps)));
    [primary, PERCENT_FACTOR - primary]
}

/// Exposure ceiling per protocol: strategy target scaled by the non-pool share
pub fn protocol_ceilings(utilisation_bps: u128, curve_vault_percent: u32) -> [u32; 2] {
    let non_curve = (PERCENT_FACTOR - curve_vault_percent.min(PERCENT_FACTOR)) as u128;
    strategy_targets(utilisation_bps).map(|t| bps_u32(bps_of(t as u128, non_curve)))
}

pub struct ExposureCalculator {
    overrides: Vec<ProtocolOverride>,
}

impl ExposureCalculator {
    pub fn new(overrides: Vec<ProtocolOverride>) -> Self {
        Self { overrides }
    }

    pub fn overrides(&self) -> &[ProtocolOverride] {
        &self.overrides
    }

    /// Per-protocol ceilings including the fixed share each override carries
    /// through the pool vault. Protocols without a strategy slot are uncapped.
    pub fn ceilings(&self, utilisation_bps: u128, curve_vault_percent: u32, n_protocols: usize) -> Vec<u32> {
        let base = protocol_ceilings(utilisation_bps, curve_vault_percent);
        let mut ceilings: Vec<u32> = (0..n_protocols)
            .map(|j| base.get(j).copied().unwrap_or(PERCENT_FACTOR))
            .collect();
        for o in &self.overrides {
            if let Some(c) = ceilings.get_mut(o.protocol) {
                let extra = bps_u32(bps_of(curve_vault_percent as u128, o.share_bps as u128));
                *c = c.saturating_add(extra).min(PERCENT_FACTOR);
            }
        }
        ceilings
    }

    /// Fast exposure: pending deposits are treated as already routed, the
    /// skim fraction to the pool vault and the rest by target percents.
    pub fn calc_risk_exposure(&self, s: &SystemState) -> ExposureSnapshot {
        let pending = s.pending_total();
        let to_curve = bps_of(pending, s.skim_bps as u128);
        let routed = split_by_ratios(pending - to_curve, &s.stablecoin_percents);

        let stable: Vec<u128> = s
            .vault_usd
            .iter()
            .enumerate()
            .map(|(i, v)| v.saturating_add(routed.get(i).copied().unwrap_or(0)))
            .collect();
        self.build(s, &stable, s.curve_usd.saturating_add(to_curve))
    }

    /// Exact exposure: pending deposits counted by their actual coin, no skim
    pub fn get_exact_risk_exposure(&self, s: &SystemState) -> ExposureSnapshot {
        let stable: Vec<u128> = s
            .vault_usd
            .iter()
            .zip(s.pending_usd.iter())
            .map(|(v, p)| v.saturating_add(*p))
            .collect();
        self.build(s, &stable, s.curve_usd)
    }

    fn build(&self, s: &SystemState, stable_usd: &[u128], curve_usd: u128) -> ExposureSnapshot {
        let total = s.total_usd;
        if total == 0 {
            return ExposureSnapshot {
                stablecoin_exposure: s.stablecoin_percents.clone(),
                protocol_exposure: vec![0; s.n_protocols()],
                ..ExposureSnapshot::default()
            };
        }

        let curve_exposure = bps_u32(ratio_bps(curve_usd, total));
        let mut stablecoin_exposure: Vec<u32> =
            stable_usd.iter().map(|v| bps_u32(ratio_bps(*v, total))).collect();

        // Last valued coin absorbs rounding so everything sums to 10_000
        let assigned: u32 = stablecoin_exposure.iter().sum::<u32>() + curve_exposure;
        let last = (0..stablecoin_exposure.len()).rev().find(|i| Some(*i) != s.excluded);
        if let Some(last) = last {
            stablecoin_exposure[last] += PERCENT_FACTOR.saturating_sub(assigned);
        }

        let n_protocols = self
            .overrides
            .iter()
            .map(|o| o.protocol + 1)
            .max()
            .unwrap_or(0)
            .max(s.n_protocols());
        let mut protocol_exposure: Vec<u32> = (0..n_protocols)
            .map(|j| {
                let usd: u128 = s.strategy_usd.iter().filter_map(|v| v.get(j)).sum();
                bps_u32(ratio_bps(usd, total))
            })
            .collect();
        for o in &self.overrides {
            let extra = bps_u32(bps_of(curve_exposure as u128, o.share_bps as u128));
            protocol_exposure[o.protocol] = protocol_exposure[o.protocol].saturating_add(extra).min(PERCENT_FACTOR);
        }

        let buffer = s.exposure_buffer_bps as u128;
        let stablecoin_exposed = stablecoin_exposure.iter().enumerate().any(|(i, e)| {
            if Some(i) == s.excluded {
                return false;
            }
            let pct = s.stablecoin_percents.get(i).copied().unwrap_or(0) as u128;
            let target = bps_of(pct, BPS - s.curve_vault_percent as u128);
            abs_diff_u128(*e as u128, target) > buffer
        });

        let ceilings = self.ceilings(s.utilisation_bps, s.curve_vault_percent, n_protocols);
        let protocol_exposed = protocol_exposure
            .iter()
            .zip(ceilings.iter())
            .any(|(e, c)| *e as u128 > *c as u128 + buffer);

        let curve_exposed = abs_diff_u128(curve_exposure as u128, s.curve_vault_percent as u128) > buffer;

        ExposureSnapshot {
            stablecoin_exposure,
            protocol_exposure,
            curve_exposure,
            stablecoin_exposed,
            protocol_exposed,
            curve_exposed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USD: u128 = 1_000_000_000_000_000_000;

    /// $10k system on target: 10% pool, 27/36/27 across coins
    fn on_target() -> SystemState {
        SystemState {
            total_usd: 10_000 * USD,
            curve_usd: 1_000 * USD,
            curve_lp: 1_000 * USD,
            pending_usd: vec![0, 0, 0],
            vault_usd: vec![2_700 * USD, 3_600 * USD, 2_700 * USD],
            vault_amounts: vec![2_700 * USD, 3_600_000_000, 2_700_000_000],
            strategy_usd: vec![
                vec![2_700 * USD, 0],
                vec![3_600 * USD, 0],
                vec![2_700 * USD, 0],
            ],
            utilisation_bps: 0,
            stablecoin_percents: vec![3_000, 4_000, 3_000],
            curve_vault_percent: 1_000,
            exposure_buffer_bps: 50,
            skim_bps: 1_000,
            excluded: None,
        }
    }

    fn calc() -> ExposureCalculator {
        ExposureCalculator::new(vec![])
    }

    #[test]
    fn test_strategy_targets() {
        assert_eq!(strategy_targets(0), [10_000, 0]);
        assert_eq!(strategy_targets(10_000), [5_000, 5_000]);
        // u = 25% -> 1 / 1.25 = 80%
        assert_eq!(strategy_targets(2_500), [8_000, 2_000]);
    }

    #[test]
    fn test_protocol_ceilings() {
        assert_eq!(protocol_ceilings(10_000, 1_000), [4_500, 4_500]);
        assert_eq!(protocol_ceilings(0, 1_000), [9_000, 0]);
    }

    #[test]
    fn test_on_target_not_exposed() {
        let e = calc().get_exact_risk_exposure(&on_target());
        assert_eq!(e.stablecoin_exposure, vec![2_700, 3_600, 2_700]);
        assert_eq!(e.curve_exposure, 1_000);
        assert_eq!(e.total_bps(), 10_000);
        assert!(!e.any_exposed());
    }

    #[test]
    fn test_pending_attribution_differs() {
        let mut s = on_target();
        s.total_usd += 1_000 * USD;
        s.pending_usd = vec![1_000 * USD, 0, 0];

        let exact = calc().get_exact_risk_exposure(&s);
        let approx = calc().calc_risk_exposure(&s);

        // Exact: all pending is DAI
        assert_eq!(exact.stablecoin_exposure[0], 3_363); // 3_700 / 11_000
        assert!(exact.stablecoin_exposed);
        // Approx: 10% skimmed to the pool, rest spread by target
        assert_eq!(approx.curve_exposure, 1_000); // 1_100 / 11_000
        assert!(!approx.stablecoin_exposed);
        assert_eq!(exact.total_bps(), 10_000);
        assert_eq!(approx.total_bps(), 10_000);
    }

    #[test]
    fn test_rounding_absorbed_by_last_coin() {
        let mut s = on_target();
        s.total_usd = 3 * USD;
        s.curve_usd = 0;
        s.vault_usd = vec![USD, USD, USD];
        s.strategy_usd = vec![vec![0, 0]; 3];

        let e = calc().get_exact_risk_exposure(&s);
        assert_eq!(e.stablecoin_exposure, vec![3_333, 3_333, 3_334]);
    }

    #[test]
    fn test_protocol_over_ceiling() {
        let mut s = on_target();
        // u = 100% -> ceilings 45% each, but primary holds 90%
        s.utilisation_bps = 10_000;
        let e = calc().get_exact_risk_exposure(&s);
        assert_eq!(e.protocol_exposure, vec![9_000, 0]);
        assert!(e.protocol_exposed);
    }

    #[test]
    fn test_override_adds_pool_share() {
        let calc = ExposureCalculator::new(vec![ProtocolOverride { protocol: 1, share_bps: 3_119 }]);
        let e = calc.get_exact_risk_exposure(&on_target());
        // 10% pool exposure * 31.19%
        assert_eq!(e.protocol_exposure[1], 311);
        assert!(e.protocol_exposure.iter().map(|v| *v as u64).sum::<u64>() <= 10_000);
        // The override share is part of the ceiling, so sitting on target is fine
        assert_eq!(calc.ceilings(0, 1_000, 2), vec![9_000, 311]);
        assert!(!e.protocol_exposed);
    }

    #[test]
    fn test_empty_system() {
        let s = SystemState {
            stablecoin_percents: vec![3_000, 4_000, 3_000],
            vault_usd: vec![0; 3],
            pending_usd: vec![0; 3],
            ..SystemState::default()
        };
        let e = calc().calc_risk_exposure(&s);
        assert_eq!(e.total_bps(), 10_000);
        assert!(!e.any_exposed());
    }
}
