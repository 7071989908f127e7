//! Building a `SystemState` from live holdings

use strata_common::{AssetId, StrataError};
use strata_oracle::{PriceFeed, PriceGuard};

use super::SystemState;
use crate::state::{AllocationTarget, Holdings};

/// Value every holding through the guard and freeze the result.
///
/// An `excluded` asset (emergency mode) contributes nothing: its vault,
/// strategies and pending deposits are valued at zero.
pub fn prepare_calculation<F: PriceFeed>(
    guard: &PriceGuard<F>,
    holdings: &Holdings,
    target: &AllocationTarget,
    utilisation_bps: u128,
    skim_bps: u32,
    excluded: Option<AssetId>,
) -> Result<SystemState, StrataError> {
    let n = holdings.n_assets();
    let mut vault_usd = vec![0u128; n];
    let mut pending_usd = vec![0u128; n];
    let mut vault_amounts = vec![0u128; n];
    let mut strategy_usd = Vec::with_capacity(n);

    for (i, vault) in holdings.vaults.iter().enumerate() {
        if Some(i) == excluded {
            strategy_usd.push(vec![0; vault.strategies.len()]);
            continue;
        }
        vault_amounts[i] = vault.total_assets();
        vault_usd[i] = guard.single_stable_to_usd(vault.total_assets(), i)?;
        pending_usd[i] = guard.single_stable_to_usd(holdings.pending[i], i)?;
        strategy_usd.push(
            vault
                .strategies
                .iter()
                .map(|s| guard.single_stable_to_usd(s.invested, i))
                .collect::<Result<Vec<_>, _>>()?,
        );
    }

    let curve_lp = holdings.curve_vault.total_assets();
    let curve_usd = guard.lp_to_usd(curve_lp)?;
    let total_usd = vault_usd
        .iter()
        .chain(pending_usd.iter())
        .fold(curve_usd, |acc, v| acc.saturating_add(*v));

    Ok(SystemState {
        total_usd,
        curve_usd,
        curve_lp,
        pending_usd,
        vault_usd,
        vault_amounts,
        strategy_usd,
        utilisation_bps,
        stablecoin_percents: target.stablecoin_percents.clone(),
        curve_vault_percent: target.curve_vault_percent,
        exposure_buffer_bps: target.exposure_buffer_bps,
        skim_bps,
        excluded,
    })
}
