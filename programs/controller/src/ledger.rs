//! Holder balances of the two share classes
//!
//! The controller only tells the ledger how much USD entered or left a
//! tranche and what the tranche is worth after each accounting step; how
//! that maps onto holder balances is the ledger's business.

use std::collections::HashMap;

use strata_common::{StrataError, TrancheKind};
use tranche_model::math::mul_div;

pub trait TokenLedger {
    /// USD value of the whole tranche
    fn total_assets(&self, kind: TrancheKind) -> u128;
    /// USD value of one holder's position
    fn assets_of(&self, kind: TrancheKind, holder: &str) -> u128;
    fn total_supply_base(&self, kind: TrancheKind) -> u128;
    fn balance_of_base(&self, kind: TrancheKind, holder: &str) -> u128;
    /// Set the tranche's value; every holder's value moves pro rata
    fn rebase(&mut self, kind: TrancheKind, total_assets: u128);
    fn mint(&mut self, kind: TrancheKind, holder: &str, usd: u128) -> Result<(), StrataError>;
    fn burn(&mut self, kind: TrancheKind, holder: &str, usd: u128) -> Result<(), StrataError>;
}

#[derive(Debug, Clone, Default)]
struct Pool {
    total_assets: u128,
    total_base: u128,
    balances: HashMap<String, u128>,
}

impl Pool {
    fn base_for(&self, usd: u128) -> u128 {
        if self.total_base == 0 || self.total_assets == 0 {
            usd
        } else {
            mul_div(usd, self.total_base, self.total_assets)
        }
    }

    fn value_of(&self, base: u128) -> u128 {
        mul_div(base, self.total_assets, self.total_base)
    }
}

/// In-memory rebasing share ledger
#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    growth: Pool,
    protected: Pool,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn pool(&self, kind: TrancheKind) -> &Pool {
        match kind {
            TrancheKind::Growth => &self.growth,
            TrancheKind::Protected => &self.protected,
        }
    }

    fn pool_mut(&mut self, kind: TrancheKind) -> &mut Pool {
        match kind {
            TrancheKind::Growth => &mut self.growth,
            TrancheKind::Protected => &mut self.protected,
        }
    }
}

impl TokenLedger for ShareLedger {
    fn total_assets(&self, kind: TrancheKind) -> u128 {
        self.pool(kind).total_assets
    }

    fn assets_of(&self, kind: TrancheKind, holder: &str) -> u128 {
        let pool = self.pool(kind);
        pool.value_of(pool.balances.get(holder).copied().unwrap_or(0))
    }

    fn total_supply_base(&self, kind: TrancheKind) -> u128 {
        self.pool(kind).total_base
    }

    fn balance_of_base(&self, kind: TrancheKind, holder: &str) -> u128 {
        self.pool(kind).balances.get(holder).copied().unwrap_or(0)
    }

    fn rebase(&mut self, kind: TrancheKind, total_assets: u128) {
        let pool = self.pool_mut(kind);
        log::debug!("Ledger: {:?} rebased {} -> {}", kind, pool.total_assets, total_assets);
        pool.total_assets = total_assets;
    }

    fn mint(&mut self, kind: TrancheKind, holder: &str, usd: u128) -> Result<(), StrataError> {
        let pool = self.pool_mut(kind);
        let base = pool.base_for(usd);
        *pool.balances.entry(holder.to_string()).or_default() += base;
        pool.total_base = pool.total_base.saturating_add(base);
        pool.total_assets = pool.total_assets.saturating_add(usd);
        Ok(())
    }

    fn burn(&mut self, kind: TrancheKind, holder: &str, usd: u128) -> Result<(), StrataError> {
        let pool = self.pool_mut(kind);
        let held = pool.balances.get(holder).copied().unwrap_or(0);
        let available = pool.value_of(held);
        if usd > available {
            return Err(StrataError::InsufficientLiquidity { requested: usd, available });
        }

        // Burning the whole position clears any rounding dust with it
        let base = if usd == available { held } else { pool.base_for(usd).min(held) };
        if let Some(balance) = pool.balances.get_mut(holder) {
            *balance -= base;
        }
        pool.total_base -= base;
        pool.total_assets = pool.total_assets.saturating_sub(usd);
        Ok(())
    }
}
