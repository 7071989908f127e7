//! Allocation planning
//!
//! Pure functions of a `SystemState`: given where capital sits and where the
//! targets say it should sit, produce the transfers that close the gap.
//! Slots are the stablecoin vaults in asset order followed by the pool vault.

use strata_common::PERCENT_FACTOR;
use tranche_model::math::{bps_of, mul_div};

use crate::exposure::{ExposureCalculator, ExposureSnapshot, SystemState};
use crate::state::vault::split_by_ratios;
use crate::state::whole_usd;

/// Any stablecoin, protocol or pool exposure outside its band
pub fn rebalance_trigger(exposure: &ExposureSnapshot) -> bool {
    exposure.any_exposed()
}

/// Transfers restoring the allocation targets
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VaultTargetDelta {
    /// USD to pull out of each slot (stables, then pool)
    pub withdraw_usd: Vec<u128>,
    /// Share of the withdrawn USD each slot receives (bps, stables, then pool).
    /// Sums to 10_000 whenever anything is withdrawn.
    pub deposit_percents: Vec<u32>,
    pub total_withdraw_usd: u128,
}

impl VaultTargetDelta {
    pub fn is_empty(&self) -> bool {
        self.total_withdraw_usd == 0
    }

    /// Signed pool vault change: positive deposits, negative withdraws
    pub fn curve_delta(&self) -> i128 {
        let withdraw = self.withdraw_usd.last().copied().unwrap_or(0);
        let deposit = self
            .deposit_percents
            .last()
            .map(|p| bps_of(self.total_withdraw_usd, *p as u128))
            .unwrap_or(0);
        deposit as i128 - withdraw as i128
    }
}

/// Target USD per slot; the last stablecoin absorbs rounding
fn slot_targets(s: &SystemState) -> Vec<u128> {
    let curve_target = bps_of(s.total_usd, s.curve_vault_percent as u128);
    let mut targets = split_by_ratios(s.total_usd - curve_target, &s.stablecoin_percents);
    targets.push(curve_target);
    targets
}

fn slot_current(s: &SystemState) -> Vec<u128> {
    let mut current: Vec<u128> = s
        .vault_usd
        .iter()
        .zip(s.pending_usd.iter())
        .map(|(v, p)| v.saturating_add(*p))
        .collect();
    current.push(s.curve_usd);
    current
}

/// Spread `amount` over `weights`; the last non-zero weight absorbs rounding
pub(crate) fn pro_rata(amount: u128, weights: &[u128]) -> Vec<u128> {
    let total: u128 = weights.iter().sum();
    let mut parts: Vec<u128> = weights.iter().map(|w| mul_div(amount, *w, total)).collect();
    if let Some(last) = weights.iter().rposition(|w| *w > 0) {
        let assigned: u128 = parts.iter().sum();
        parts[last] += amount.saturating_sub(assigned);
    }
    parts
}

/// Per-slot withdrawals and deficit percents that move every slot to target.
///
/// Slots off target by no more than `swap_threshold` whole tokens are left
/// alone. Only `min(surplus, deficit)` moves, so nothing is withdrawn that
/// has nowhere to go.
pub fn calc_vault_target_delta(s: &SystemState, swap_threshold: u64) -> VaultTargetDelta {
    let targets = slot_targets(s);
    let current = slot_current(s);
    let threshold = whole_usd(swap_threshold);

    let mut surplus = vec![0u128; targets.len()];
    let mut need = vec![0u128; targets.len()];
    for k in 0..targets.len() {
        if Some(k) == s.excluded {
            continue;
        }
        if current[k] > targets[k] && current[k] - targets[k] > threshold {
            surplus[k] = current[k] - targets[k];
        } else if targets[k] > current[k] && targets[k] - current[k] > threshold {
            need[k] = targets[k] - current[k];
        }
    }

    let total_surplus: u128 = surplus.iter().sum();
    let total_need: u128 = need.iter().sum();
    let total_withdraw = total_surplus.min(total_need);
    if total_withdraw == 0 {
        return VaultTargetDelta {
            withdraw_usd: vec![0; targets.len()],
            deposit_percents: vec![0; targets.len()],
            total_withdraw_usd: 0,
        };
    }

    let withdraw_usd = pro_rata(total_withdraw, &surplus);
    let deposit_percents = pro_rata(PERCENT_FACTOR as u128, &need)
        .into_iter()
        .map(|p| p as u32)
        .collect();

    VaultTargetDelta {
        withdraw_usd,
        deposit_percents,
        total_withdraw_usd: total_withdraw,
    }
}

/// Strategy capital to pull back for one over-exposed protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolWithdrawal {
    pub protocol: usize,
    pub usd: u128,
    /// USD taken from each stablecoin vault's strategy `protocol`
    pub per_vault: Vec<u128>,
}

/// Pull-downs for every protocol above its ceiling.
///
/// The excess is taken from vaults in proportion to what each holds in that
/// protocol. Under-exposed protocols are never padded.
pub fn calc_protocol_withdrawal(calculator: &ExposureCalculator, s: &SystemState) -> Vec<ProtocolWithdrawal> {
    let n_protocols = s.n_protocols();
    let ceilings = calculator.ceilings(s.utilisation_bps, s.curve_vault_percent, n_protocols);

    (0..n_protocols)
        .filter_map(|j| {
            let holdings: Vec<u128> = s
                .strategy_usd
                .iter()
                .map(|v| v.get(j).copied().unwrap_or(0))
                .collect();
            let held: u128 = holdings.iter().sum();
            let via_pool: u128 = calculator
                .overrides()
                .iter()
                .filter(|o| o.protocol == j)
                .map(|o| bps_of(s.curve_usd, o.share_bps as u128))
                .sum();
            let ceiling_usd = bps_of(s.total_usd, ceilings[j] as u128);

            let usd = held.saturating_add(via_pool).saturating_sub(ceiling_usd).min(held);
            if usd == 0 {
                return None;
            }
            Some(ProtocolWithdrawal {
                protocol: j,
                usd,
                per_vault: pro_rata(usd, &holdings),
            })
        })
        .collect()
}
