//! Strata Integration Tests
//!
//! Drives the full controller (price guard, PnL engine, vaults, rebalancer)
//! over an in-memory pool, reference feed, yield source and share ledger.

use strata_common::{TrancheKind, DEFAULT_FACTOR};
use strata_controller::{Controller, ScriptedYield, ShareLedger, StrataConfig};
use strata_oracle::{PoolReserves, StaticFeed};

pub const USD: u128 = DEFAULT_FACTOR;
pub const DAI: u128 = DEFAULT_FACTOR;
pub const USDC: u128 = 1_000_000;
pub const USDT: u128 = 1_000_000;

pub type TestController = Controller<StaticFeed, ScriptedYield, ShareLedger>;

/// Balanced DAI/USDC/USDT pool, 10M of each
pub fn balanced_pool(lp_supply: u128) -> PoolReserves {
    PoolReserves {
        balances: vec![10_000_000 * DAI, 10_000_000 * USDC, 10_000_000 * USDT],
        decimals: vec![18, 6, 6],
        amplification: 200,
        lp_supply,
    }
}

/// Fresh controller with default parameters; vaults invest from the first token
pub fn controller() -> TestController {
    let mut config = StrataConfig::default();
    config.vaults.stable.invest_threshold = 0;
    config.vaults.curve.invest_threshold = 0;
    Controller::new(
        config,
        StaticFeed::at_par(3),
        balanced_pool(30_000_000 * USD),
        ScriptedYield::new(),
        ShareLedger::new(),
    )
    .expect("default config is valid")
}

/// Growth 10_000 USD (alice), Protected 5_000 USD (bob), both routed
pub fn seeded() -> TestController {
    let mut c = controller();
    c.deposit(TrancheKind::Growth, "alice", &[3_000 * DAI, 4_000 * USDC, 3_000 * USDT], 0)
        .expect("growth deposit");
    c.deposit(TrancheKind::Protected, "bob", &[1_500 * DAI, 2_000 * USDC, 1_500 * USDT], 0)
        .expect("protected deposit");
    c
}

/// USD value of everything the protocol holds, at current prices
pub fn live_total(c: &TestController) -> u128 {
    c.prepare_calculation().expect("prices are safe").total_usd
}

/// Sum of both tranche values
pub fn book_total(c: &TestController) -> u128 {
    let (gvt, pwrd) = c.calc_pnl();
    gvt + pwrd
}
