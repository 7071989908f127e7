//! Strategy harvest results

use std::collections::{HashMap, VecDeque};

use strata_common::StrataError;

use crate::state::VaultId;

/// Realised result of one strategy since its last harvest (vault token units)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarvestReport {
    pub profit: u128,
    pub loss: u128,
}

pub trait YieldSource {
    /// # Arguments
    /// * `vault` - Vault owning the strategy
    /// * `strategy` - Strategy index within the vault
    /// * `invested` - Amount the vault currently has deployed in it
    fn harvest(&mut self, vault: VaultId, strategy: usize, invested: u128) -> Result<HarvestReport, StrataError>;
}

/// Replays queued reports per strategy; an empty queue harvests nothing
#[derive(Debug, Clone, Default)]
pub struct ScriptedYield {
    queued: HashMap<(VaultId, usize), VecDeque<HarvestReport>>,
}

impl ScriptedYield {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, vault: VaultId, strategy: usize, report: HarvestReport) {
        self.queued.entry((vault, strategy)).or_default().push_back(report);
    }
}

impl YieldSource for ScriptedYield {
    fn harvest(&mut self, vault: VaultId, strategy: usize, invested: u128) -> Result<HarvestReport, StrataError> {
        let report = self
            .queued
            .get_mut(&(vault, strategy))
            .and_then(|q| q.pop_front())
            .unwrap_or_default();
        // A strategy cannot lose more than it holds
        Ok(HarvestReport {
            profit: report.profit,
            loss: report.loss.min(invested),
        })
    }
}
