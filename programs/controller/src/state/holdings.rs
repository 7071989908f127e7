//! Where the protocol's coins physically sit

use serde::{Deserialize, Serialize};
use strata_common::{Asset, AssetId, StrataError, DEFAULT_FACTOR};

use super::vault::{VaultPolicy, VaultPosition};

/// Vault selector shared by harvests and keeper decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultId {
    Stable(AssetId),
    Curve,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    /// One vault per stablecoin, indexed by asset
    pub vaults: Vec<VaultPosition>,
    /// Pool LP vault (18-decimal LP units)
    pub curve_vault: VaultPosition,
    /// Deposits not yet routed into vaults (native units per coin)
    pub pending: Vec<u128>,
}

impl Holdings {
    pub fn new(assets: &[Asset], stable: &VaultPolicy, curve: &VaultPolicy) -> Result<Self, StrataError> {
        let vaults = assets
            .iter()
            .map(|a| VaultPosition::new(a.decimals, stable))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            vaults,
            curve_vault: VaultPosition::new(18, curve)?,
            pending: vec![0; assets.len()],
        })
    }

    pub fn n_assets(&self) -> usize {
        self.vaults.len()
    }

    pub fn vault(&self, id: VaultId) -> Result<&VaultPosition, StrataError> {
        match id {
            VaultId::Stable(i) => self.vaults.get(i).ok_or(StrataError::UnknownAsset(i)),
            VaultId::Curve => Ok(&self.curve_vault),
        }
    }

    pub fn vault_mut(&mut self, id: VaultId) -> Result<&mut VaultPosition, StrataError> {
        match id {
            VaultId::Stable(i) => self.vaults.get_mut(i).ok_or(StrataError::UnknownAsset(i)),
            VaultId::Curve => Ok(&mut self.curve_vault),
        }
    }

    /// Native coin amounts held per asset: vault plus pending
    pub fn coin_amounts(&self) -> Vec<u128> {
        self.vaults
            .iter()
            .zip(self.pending.iter())
            .map(|(v, p)| v.total_assets().saturating_add(*p))
            .collect()
    }

    pub fn pending_is_empty(&self) -> bool {
        self.pending.iter().all(|p| *p == 0)
    }
}

/// USD threshold equivalent of `count` whole tokens
pub fn whole_usd(count: u64) -> u128 {
    (count as u128).saturating_mul(DEFAULT_FACTOR)
}
