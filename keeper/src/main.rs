//! Strata Keeper
//!
//! Off-chain scheduler that watches the protocol's triggers and runs the
//! periodic actions: booking price moves, investing pending deposits and
//! vault buffers, and rebalancing when exposure drifts.

mod config;
mod priority_queue;
mod snapshot;

use anyhow::{Context, Result};
use config::KeeperConfig;
use priority_queue::{InvestQueue, VaultSurplus};
use snapshot::{KeeperController, SystemSnapshot};
use std::time::Duration;
use strata_controller::lifecycle::Mode;
use strata_controller::state::VaultId;
use strata_oracle::StaticFeed;
use tokio::time;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting Strata Keeper");

    let config = KeeperConfig::load().unwrap_or_else(|_| {
        log::warn!("Failed to load config, using default local config");
        KeeperConfig::default_local()
    });

    let protocol = config.protocol()?;
    let mut snapshot = SystemSnapshot::load(&config.snapshot_path)?;
    let mut controller = snapshot.restore(protocol)?;
    log::info!("Loaded snapshot from {}", config.snapshot_path);
    if config.dry_run {
        log::info!("Dry run: decisions are logged, nothing is executed");
    }

    let mut queue = InvestQueue::new();
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs));

    loop {
        interval.tick().await;

        if let Err(e) = refresh_market(&mut controller, &config) {
            log::error!("Error refreshing market data: {:#}", e);
            continue;
        }

        match run_tick(&mut controller, &mut queue, &config) {
            Ok(0) => log::debug!("Nothing due"),
            Ok(actions) => {
                log::info!("Executed {} actions", actions);
                snapshot.capture(&controller);
                if let Err(e) = snapshot.save(&config.snapshot_path) {
                    log::error!("Error saving snapshot: {:#}", e);
                }
            }
            Err(e) => log::error!("Error running tick: {:#}", e),
        }
    }
}

/// Pull the latest pool reserves and reference prices from the snapshot file
fn refresh_market(controller: &mut KeeperController, config: &KeeperConfig) -> Result<()> {
    let latest = SystemSnapshot::load(&config.snapshot_path)?;
    controller
        .update_pool(latest.pool)
        .context("Snapshot pool does not match the configured assets")?;
    *controller.guard_mut().feed_mut() = StaticFeed::new(latest.feed_prices);
    Ok(())
}

/// Evaluate every trigger and execute what is due. Returns the number of
/// actions executed.
fn run_tick(controller: &mut KeeperController, queue: &mut InvestQueue, config: &KeeperConfig) -> Result<usize> {
    let mode = controller.emergency_state();
    if mode != Mode::Normal {
        log::debug!("Protocol is {}, skipping", mode.name());
        return Ok(0);
    }

    if let Err(e) = controller.safety_check() {
        log::warn!("Price guard rejects current pool: {}", e);
        return Ok(0);
    }

    let mut actions = 0;

    // Price moves are booked before anything looks at exposure
    if controller.pnl_trigger()? {
        log::info!("PnL trigger set, booking price change");
        if !config.dry_run {
            if let Some(event) = controller.execute_pnl()? {
                log::info!(
                    "Price event: gvt {} -> {}, pwrd {} -> {}",
                    event.before_gvt,
                    event.after_gvt,
                    event.before_pwrd,
                    event.after_pwrd
                );
            }
            actions += 1;
        }
    }

    if !controller.holdings().pending_is_empty() {
        log::info!("Pending deposits waiting, investing");
        if !config.dry_run {
            let routed = controller.invest_pending()?;
            log::info!("Routed {} USD of pending deposits", routed);
            actions += 1;
        }
    }

    actions += invest_vaults(controller, queue, config)?;

    if controller.rebalance_trigger()? {
        log::info!("Exposure over limits, rebalancing");
        if !config.dry_run {
            let report = controller.rebalance()?;
            log::info!(
                "Rebalanced: withdrew {} USD, deposited {} USD, pulled down {} USD",
                report.withdrawn_usd,
                report.deposited_usd,
                report.pulled_down_usd
            );
            actions += 1;
        }
    }

    Ok(actions)
}

/// Invest the vaults whose buffer crossed their threshold, largest surplus
/// first
fn invest_vaults(controller: &mut KeeperController, queue: &mut InvestQueue, config: &KeeperConfig) -> Result<usize> {
    queue.clear();
    let holdings = controller.holdings();
    let vaults = (0..holdings.n_assets()).map(VaultId::Stable).chain([VaultId::Curve]);
    for vault in vaults {
        if controller.invest_trigger(vault)? {
            queue.push(VaultSurplus::of(vault, controller.holdings().vault(vault)?));
        }
    }

    if queue.is_empty() {
        return Ok(0);
    }
    log::debug!("Invest queue size: {}", queue.len());

    let mut actions = 0;
    while actions < config.max_invests_per_tick {
        let Some(next) = queue.pop() else {
            break;
        };
        log::info!("Investing {:?} (surplus {})", next.vault, next.surplus);
        if config.dry_run {
            continue;
        }
        match controller.invest_vault(next.vault) {
            Ok(moved) => {
                log::info!("Invested {} from {:?}", moved, next.vault);
                actions += 1;
            }
            Err(e) => log::error!("Failed to invest {:?}: {}", next.vault, e),
        }
    }
    Ok(actions)
}
