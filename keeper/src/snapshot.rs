//! System snapshot the keeper operates on
//!
//! The snapshot carries everything the controller cannot derive itself:
//! pool reserves, reference prices, vault holdings, the two tranche values
//! and the operating mode. Market data (`pool`, `feed_prices`) is re-read on
//! every tick; the rest only seeds the controller at start-up.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strata_controller::lifecycle::Mode;
use strata_controller::pnl::PnlEngine;
use strata_controller::state::Holdings;
use strata_controller::{Controller, ScriptedYield, ShareLedger, StrataConfig, TokenLedger};
use strata_common::TrancheKind;
use strata_oracle::{PoolReserves, StaticFeed};

pub type KeeperController = Controller<StaticFeed, ScriptedYield, ShareLedger>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub pool: PoolReserves,
    /// Reference price per asset (8 decimals)
    pub feed_prices: Vec<u128>,
    pub holdings: Holdings,
    /// Growth tranche value (18 decimals)
    pub growth_assets: u128,
    /// Protected tranche value (18 decimals)
    pub protected_assets: u128,
    #[serde(default)]
    pub mode: Mode,
}

impl SystemSnapshot {
    pub fn load(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let bytes =
            std::fs::read(expanded.as_ref()).context(format!("Failed to read snapshot from {}", path))?;
        serde_json::from_slice(&bytes).context("Failed to parse snapshot JSON")
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let expanded = shellexpand::tilde(path);
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize snapshot")?;
        std::fs::write(expanded.as_ref(), json).context(format!("Failed to write snapshot to {}", path))
    }

    /// Rebuild a controller around this snapshot.
    ///
    /// The ledger only tracks tranche totals here; holder balances live
    /// elsewhere.
    pub fn restore(&self, config: StrataConfig) -> Result<KeeperController> {
        let mut ledger = ShareLedger::new();
        ledger.rebase(TrancheKind::Growth, self.growth_assets);
        ledger.rebase(TrancheKind::Protected, self.protected_assets);

        let pnl = PnlEngine::with_assets(config.pnl.clone(), self.growth_assets, self.protected_assets);
        let mut controller = Controller::restore(
            config,
            StaticFeed::new(self.feed_prices.clone()),
            self.pool.clone(),
            ScriptedYield::new(),
            ledger,
            self.holdings.clone(),
            pnl,
            self.mode,
        )
        .context("Failed to restore controller from snapshot")?;

        // Drift is measured from the pool as first seen
        if let Err(e) = controller.update_ratios() {
            log::warn!("Pool ratios not recorded at start-up: {}", e);
        }
        Ok(controller)
    }

    /// Copy the controller's current state, market data included, back into
    /// the snapshot
    pub fn capture(&mut self, controller: &KeeperController) {
        let (gvt, pwrd) = controller.calc_pnl();
        self.growth_assets = gvt;
        self.protected_assets = pwrd;
        self.holdings = controller.holdings().clone();
        self.pool = controller.guard().pool().clone();
        self.feed_prices = controller.guard().feed().prices().to_vec();
        self.mode = controller.emergency_state();
    }
}
