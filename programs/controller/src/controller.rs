//! Protocol controller
//!
//! Wires the price guard, PnL engine, vaults and rebalancer together and
//! exposes the user and governance actions. Every action works on a clone of
//! the `ProtocolBook` and only replaces the live book once it has fully
//! succeeded; ledger updates follow the commit.
//!
//! Within one action tranche accounting always runs before exposure or
//! rebalancing is recomputed.

use arrayvec::ArrayVec;
use strata_common::{AssetId, StrataError, TrancheKind};
use strata_oracle::{FeedBypass, PoolReserves, PriceFeed, PriceGuard};
use tranche_model::math::{bps_of, min_u128, mul_div, ratio_bps};

use crate::config::StrataConfig;
use crate::exposure::{self, strategy_targets, ExposureCalculator, ExposureSnapshot, SystemState};
use crate::ledger::TokenLedger;
use crate::lifecycle::Mode;
use crate::pnl::{PnlEngine, PnlEvent};
use crate::rebalance::planner::pro_rata;
use crate::rebalance::{rebalance_trigger, RebalanceReport, Rebalancer};
use crate::state::{whole_usd, AllocationTarget, Holdings, VaultId};
use crate::yield_source::YieldSource;

/// Events emitted by one action, in order
pub type PnlEvents = ArrayVec<PnlEvent, 2>;

/// Everything an action may change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolBook {
    pub pnl: PnlEngine,
    pub holdings: Holdings,
    pub target: AllocationTarget,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    pub usd: u128,
    pub lp: u128,
    /// Deposit was large enough to be routed immediately
    pub routed: bool,
    pub events: PnlEvents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawReceipt {
    /// Tranche value redeemed, fee included
    pub usd: u128,
    pub fee: u128,
    /// Native coin amounts paid out per asset
    pub amounts: Vec<u128>,
    pub events: PnlEvents,
}

#[derive(Clone, Copy)]
enum Payout<'a> {
    Single { asset: AssetId, min_amount: u128 },
    Balanced { min_amounts: &'a [u128] },
}

/// How much of the holder's position a withdrawal redeems
#[derive(Debug, Clone, Copy)]
enum Redeem {
    Usd(u128),
    /// Sized in pool LP units at the checked virtual price
    Lp(u128),
    All,
}

#[derive(Debug, Clone, Copy)]
enum Flow {
    Mint,
    Burn,
    BurnAll,
}

/// Holder balance change that goes with a commit. `priced` is the tranche
/// book the holder's coins moved at: after any price event, before the
/// holder's own flow.
#[derive(Debug, Clone, Copy)]
struct Transfer<'a> {
    kind: TrancheKind,
    holder: &'a str,
    usd: u128,
    flow: Flow,
    priced: (u128, u128),
}

pub struct Controller<F, Y, L> {
    guard: PriceGuard<F>,
    yields: Y,
    ledger: L,
    config: StrataConfig,
    calculator: ExposureCalculator,
    book: ProtocolBook,
    events: Vec<PnlEvent>,
}

impl<F: PriceFeed, Y: YieldSource, L: TokenLedger> Controller<F, Y, L> {
    pub fn new(config: StrataConfig, feed: F, pool: PoolReserves, yields: Y, ledger: L) -> Result<Self, StrataError> {
        let holdings = Holdings::new(&config.assets, &config.vaults.stable, &config.vaults.curve)?;
        let pnl = PnlEngine::new(config.pnl.clone());
        Self::restore(config, feed, pool, yields, ledger, holdings, pnl, Mode::Normal)
    }

    /// Rebuild a controller around previously recorded state
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        config: StrataConfig,
        feed: F,
        pool: PoolReserves,
        yields: Y,
        ledger: L,
        holdings: Holdings,
        pnl: PnlEngine,
        mode: Mode,
    ) -> Result<Self, StrataError> {
        config.validate()?;
        if pool.n_coins() != config.assets.len() || holdings.n_assets() != config.assets.len() {
            return Err(StrataError::UnknownAsset(pool.n_coins()));
        }

        let mut guard = PriceGuard::new(feed, pool, config.guard)?;
        guard.set_bypass(bypass_for(mode));

        Ok(Self {
            guard,
            yields,
            ledger,
            calculator: ExposureCalculator::new(config.exposure.overrides.clone()),
            book: ProtocolBook {
                pnl,
                holdings,
                target: config.allocation.clone(),
                mode,
            },
            config,
            events: Vec::new(),
        })
    }

    pub fn guard(&self) -> &PriceGuard<F> {
        &self.guard
    }

    pub fn guard_mut(&mut self) -> &mut PriceGuard<F> {
        &mut self.guard
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn yields_mut(&mut self) -> &mut Y {
        &mut self.yields
    }

    pub fn config(&self) -> &StrataConfig {
        &self.config
    }

    pub fn book(&self) -> &ProtocolBook {
        &self.book
    }

    pub fn holdings(&self) -> &Holdings {
        &self.book.holdings
    }

    /// Every event committed so far
    pub fn events(&self) -> &[PnlEvent] {
        &self.events
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    fn snapshot_of(&self, book: &ProtocolBook, skim_bps: u32) -> Result<SystemState, StrataError> {
        exposure::prepare_calculation(
            &self.guard,
            &book.holdings,
            &book.target,
            book.pnl.utilisation_ratio(),
            skim_bps,
            book.mode.failed_asset(),
        )
    }

    fn live_total(&self, book: &ProtocolBook) -> Result<u128, StrataError> {
        Ok(self.snapshot_of(book, 0)?.total_usd)
    }

    fn skim_of(&self, book: &ProtocolBook) -> Result<u32, StrataError> {
        let s = self.snapshot_of(book, 0)?;
        if s.total_usd == 0 {
            return Ok(book.target.curve_vault_percent);
        }
        let curve_share = ratio_bps(s.curve_usd, s.total_usd);
        if curve_share < self.config.rebalance.curve_percent_threshold_bps as u128 {
            Ok(book.target.curve_vault_percent)
        } else {
            Ok(0)
        }
    }

    /// Share of pending deposits routed into the pool vault (bps).
    ///
    /// Pending deposits top the pool vault up to its target only while it
    /// sits below the skim threshold.
    pub fn calc_skim(&self) -> Result<u32, StrataError> {
        self.skim_of(&self.book)
    }

    pub fn prepare_calculation(&self) -> Result<SystemState, StrataError> {
        let skim = self.calc_skim()?;
        self.snapshot_of(&self.book, skim)
    }

    pub fn calc_risk_exposure(&self) -> Result<ExposureSnapshot, StrataError> {
        Ok(self.calculator.calc_risk_exposure(&self.prepare_calculation()?))
    }

    pub fn get_exact_risk_exposure(&self) -> Result<ExposureSnapshot, StrataError> {
        Ok(self.calculator.get_exact_risk_exposure(&self.prepare_calculation()?))
    }

    pub fn rebalance_trigger(&self) -> Result<bool, StrataError> {
        Ok(rebalance_trigger(&self.calc_risk_exposure()?))
    }

    // ------------------------------------------------------------------
    // PnL
    // ------------------------------------------------------------------

    pub fn calc_pnl(&self) -> (u128, u128) {
        self.book.pnl.calc_pnl()
    }

    pub fn utilisation_ratio(&self) -> u128 {
        self.book.pnl.utilisation_ratio()
    }

    pub fn pnl_trigger(&self) -> Result<bool, StrataError> {
        Ok(self.book.pnl.pnl_trigger(self.live_total(&self.book)?))
    }

    pub fn total_assets_change_trigger(&self) -> Result<bool, StrataError> {
        Ok(self.book.pnl.total_assets_change_trigger(self.live_total(&self.book)?))
    }

    /// Book a material move of the live total as a price event
    fn price_pass(&self, book: &mut ProtocolBook) -> Result<Option<PnlEvent>, StrataError> {
        let live = self.live_total(book)?;
        if !book.pnl.total_assets_change_trigger(live) {
            return Ok(None);
        }
        Ok(book.pnl.distribute_price_change(live))
    }

    /// Bring the ledger in line with the live total
    pub fn execute_pnl(&mut self) -> Result<Option<PnlEvent>, StrataError> {
        if self.book.mode == Mode::Paused {
            return Err(StrataError::InvalidState {
                operation: "execute_pnl",
                mode: self.book.mode.name(),
            });
        }
        let mut book = self.book.clone();
        let live = self.live_total(&book)?;
        let event = book.pnl.distribute_price_change(live);
        self.commit(book, event.as_slice(), None)?;
        Ok(event)
    }

    pub fn set_performance_fee(&mut self, bps: u32) -> Result<(), StrataError> {
        self.book.pnl.set_performance_fee(bps)
    }

    pub fn set_rebase(&mut self, enabled: bool) {
        self.book.pnl.set_rebase(enabled);
    }

    /// Replace the live book, record its events and push the new values to
    /// the ledger.
    ///
    /// A holder transfer is applied with the ledger at the transfer's priced
    /// book, so existing holders keep their value; the ledger is then
    /// brought to the final book.
    fn commit(
        &mut self,
        book: ProtocolBook,
        events: &[PnlEvent],
        transfer: Option<Transfer<'_>>,
    ) -> Result<(), StrataError> {
        let priced = transfer.map_or_else(|| book.pnl.calc_pnl(), |t| t.priced);
        self.book = book;
        self.events.extend_from_slice(events);

        // Bonus shares are minted at the post-event price so the reward
        // holder receives exactly the bonus value
        let bonus = bonus_of(events);
        if bonus > 0 {
            self.ledger.rebase(TrancheKind::Growth, priced.0.saturating_sub(bonus));
            self.ledger.mint(TrancheKind::Growth, &self.config.reward_holder, bonus)?;
        }

        if let Some(t) = transfer {
            self.rebase_ledger(priced);
            match t.flow {
                Flow::Mint => self.ledger.mint(t.kind, t.holder, t.usd)?,
                Flow::Burn => self.ledger.burn(t.kind, t.holder, t.usd)?,
                Flow::BurnAll => {
                    let held = self.ledger.assets_of(t.kind, t.holder);
                    self.ledger.burn(t.kind, t.holder, held)?
                }
            }
        }

        let settled = self.book.pnl.calc_pnl();
        self.rebase_ledger(settled);
        Ok(())
    }

    fn rebase_ledger(&mut self, (gvt, pwrd): (u128, u128)) {
        self.ledger.rebase(TrancheKind::Growth, gvt);
        if self.book.pnl.tranche(TrancheKind::Protected).rebase_enabled {
            self.ledger.rebase(TrancheKind::Protected, pwrd);
        }
    }

    /// Value of `holder`'s position once the ledger is at `priced`, before
    /// any bonus in `events` is minted
    fn priced_assets_of(&self, kind: TrancheKind, holder: &str, priced: (u128, u128), events: &[PnlEvent]) -> u128 {
        let supply = self.ledger.total_supply_base(kind);
        if supply == 0 {
            return 0;
        }
        let tranche_value = match kind {
            TrancheKind::Growth => priced.0.saturating_sub(bonus_of(events)),
            TrancheKind::Protected if self.book.pnl.tranche(kind).rebase_enabled => priced.1,
            TrancheKind::Protected => self.ledger.total_assets(kind),
        };
        mul_div(self.ledger.balance_of_base(kind, holder), tranche_value, supply)
    }

    // ------------------------------------------------------------------
    // Deposits and withdrawals
    // ------------------------------------------------------------------

    /// Accept a basket of coins into `kind`, crediting `holder`.
    ///
    /// Coins wait as pending deposits unless the deposit is large relative to
    /// the protocol, in which case they are routed and rebalanced at once.
    pub fn deposit(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        amounts: &[u128],
        min_lp: u128,
    ) -> Result<DepositReceipt, StrataError> {
        self.book.mode.require_normal("deposit")?;
        if amounts.len() != self.book.holdings.n_assets() {
            return Err(StrataError::UnknownAsset(amounts.len()));
        }

        let mut book = self.book.clone();
        let mut events = PnlEvents::new();
        if let Some(e) = self.price_pass(&mut book)? {
            events.push(e);
        }

        let priced = book.pnl.calc_pnl();
        let usd = self.guard.stable_to_usd(amounts)?;
        let lp = self.guard.usd_to_lp(usd)?;
        if lp < min_lp {
            return Err(StrataError::SlippageExceeded { minimum: min_lp, actual: lp });
        }

        if kind == TrancheKind::Protected {
            let utilisation = book.pnl.utilisation_after(kind, usd, 0);
            let limit = self.config.pnl.utilisation_limit_pwrd_bps;
            if utilisation > limit as u128 {
                return Err(StrataError::UtilisationLimitExceeded { utilisation, limit });
            }
        }

        let total_before = book.pnl.last_total();
        for (pending, amount) in book.holdings.pending.iter_mut().zip(amounts) {
            *pending = pending.saturating_add(*amount);
        }
        book.pnl.increase_last_assets(kind, usd);

        let rebalance = &self.config.rebalance;
        let big_fish = usd > whole_usd(rebalance.big_fish_absolute_usd)
            && usd > bps_of(total_before, rebalance.big_fish_threshold_bps as u128);
        if big_fish {
            log::info!("Deposit: {} USD into {:?} routed immediately", usd, kind);
            self.route_and_rebalance(&mut book)?;
        }

        let transfer = Transfer {
            kind,
            holder,
            usd,
            flow: Flow::Mint,
            priced,
        };
        self.commit(book, &events, Some(transfer))?;
        log::info!("Deposit: {} credited {} USD of {:?} ({} LP)", holder, usd, kind, lp);

        Ok(DepositReceipt {
            usd,
            lp,
            routed: big_fish,
            events,
        })
    }

    fn route_and_rebalance(&self, book: &mut ProtocolBook) -> Result<(), StrataError> {
        let skim = self.skim_of(book)?;
        let utilisation = book.pnl.utilisation_ratio();
        let rebalancer = Rebalancer::new(
            &self.guard,
            &self.calculator,
            &book.target,
            &self.config.rebalance,
            utilisation,
        );
        rebalancer.route_pending(&mut book.holdings, skim)?;

        let s = self.snapshot_of(book, 0)?;
        if rebalance_trigger(&self.calculator.calc_risk_exposure(&s)) {
            rebalancer.rebalance(&mut book.holdings, 0)?;
        }
        Ok(())
    }

    /// Redeem `usd` of `kind` from `holder`, paid out in one coin
    pub fn withdraw_single(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        usd: u128,
        asset: AssetId,
        min_amount: u128,
    ) -> Result<WithdrawReceipt, StrataError> {
        let payout = self.single_payout(asset, min_amount)?;
        self.withdraw_with(kind, holder, Redeem::Usd(usd), payout)
    }

    /// Redeem `usd` of `kind` from `holder`, paid out across coins in
    /// proportion to current holdings
    pub fn withdraw_balanced(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        usd: u128,
        min_amounts: &[u128],
    ) -> Result<WithdrawReceipt, StrataError> {
        let payout = self.balanced_payout(min_amounts)?;
        self.withdraw_with(kind, holder, Redeem::Usd(usd), payout)
    }

    /// Redeem the value of `lp` pool LP units, paid out in one coin
    pub fn withdraw_by_lp_single(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        lp: u128,
        asset: AssetId,
        min_amount: u128,
    ) -> Result<WithdrawReceipt, StrataError> {
        let payout = self.single_payout(asset, min_amount)?;
        self.withdraw_with(kind, holder, Redeem::Lp(lp), payout)
    }

    pub fn withdraw_by_lp_balanced(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        lp: u128,
        min_amounts: &[u128],
    ) -> Result<WithdrawReceipt, StrataError> {
        let payout = self.balanced_payout(min_amounts)?;
        self.withdraw_with(kind, holder, Redeem::Lp(lp), payout)
    }

    /// Redeem the holder's whole position, paid out in one coin
    pub fn withdraw_all_single(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        asset: AssetId,
        min_amount: u128,
    ) -> Result<WithdrawReceipt, StrataError> {
        let payout = self.single_payout(asset, min_amount)?;
        self.withdraw_with(kind, holder, Redeem::All, payout)
    }

    pub fn withdraw_all_balanced(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        min_amounts: &[u128],
    ) -> Result<WithdrawReceipt, StrataError> {
        let payout = self.balanced_payout(min_amounts)?;
        self.withdraw_with(kind, holder, Redeem::All, payout)
    }

    fn single_payout(&self, asset: AssetId, min_amount: u128) -> Result<Payout<'static>, StrataError> {
        self.book.mode.require_withdrawable("withdraw", Some(asset))?;
        if asset >= self.book.holdings.n_assets() {
            return Err(StrataError::UnknownAsset(asset));
        }
        Ok(Payout::Single { asset, min_amount })
    }

    fn balanced_payout<'a>(&self, min_amounts: &'a [u128]) -> Result<Payout<'a>, StrataError> {
        self.book.mode.require_withdrawable("withdraw", None)?;
        if min_amounts.len() != self.book.holdings.n_assets() {
            return Err(StrataError::UnknownAsset(min_amounts.len()));
        }
        Ok(Payout::Balanced { min_amounts })
    }

    fn withdraw_with(
        &mut self,
        kind: TrancheKind,
        holder: &str,
        redeem: Redeem,
        payout: Payout<'_>,
    ) -> Result<WithdrawReceipt, StrataError> {
        let mut book = self.book.clone();
        let mut events = PnlEvents::new();
        if let Some(e) = self.price_pass(&mut book)? {
            events.push(e);
        }

        let priced = book.pnl.calc_pnl();
        let held = self.priced_assets_of(kind, holder, priced, &events);
        let usd = match redeem {
            Redeem::Usd(usd) => usd,
            Redeem::Lp(lp) => self.guard.lp_to_usd(lp)?,
            Redeem::All => held,
        };
        if usd == 0 {
            return Err(StrataError::InsufficientLiquidity { requested: 0, available: held });
        }

        let available = min_u128(book.pnl.tranche(kind).withdrawable(), held);
        if usd > available {
            return Err(StrataError::InsufficientLiquidity { requested: usd, available });
        }

        if kind == TrancheKind::Growth {
            let utilisation = book.pnl.utilisation_after(kind, 0, usd);
            let limit = self.config.pnl.utilisation_limit_gvt_bps;
            if utilisation > limit as u128 {
                return Err(StrataError::UtilisationLimitExceeded { utilisation, limit });
            }
        }

        let fee = book.pnl.withdrawal_fee(kind, usd);
        let net = usd - fee;
        let n = book.holdings.n_assets();

        let split: Vec<(AssetId, u128)> = match payout {
            Payout::Single { asset, .. } => vec![(asset, net)],
            Payout::Balanced { .. } => {
                let failed = book.mode.failed_asset();
                let s = self.snapshot_of(&book, 0)?;
                let weights: Vec<u128> = (0..n)
                    .map(|i| if Some(i) == failed { 0 } else { s.vault_usd[i].saturating_add(s.pending_usd[i]) })
                    .collect();
                pro_rata(net, &weights).into_iter().enumerate().collect()
            }
        };

        let mut amounts = vec![0u128; n];
        for (asset, part) in split {
            let amount = if part > 0 {
                self.guard.single_stable_from_usd(part, asset)?
            } else {
                0
            };
            let minimum = match payout {
                Payout::Single { min_amount, .. } => min_amount,
                Payout::Balanced { min_amounts } => min_amounts[asset],
            };
            if amount < minimum {
                return Err(StrataError::SlippageExceeded { minimum, actual: amount });
            }
            if amount > 0 {
                self.take_coin(&mut book.holdings, asset, amount)?;
            }
            amounts[asset] = amount;
        }

        events.push(book.pnl.decrease_last_assets(kind, usd, fee));

        let flow = match redeem {
            Redeem::All => Flow::BurnAll,
            _ => Flow::Burn,
        };
        let transfer = Transfer {
            kind,
            holder,
            usd,
            flow,
            priced,
        };
        self.commit(book, &events, Some(transfer))?;
        log::info!("Withdraw: {} redeemed {} USD of {:?} (fee {})", holder, usd, kind, fee);

        Ok(WithdrawReceipt {
            usd,
            fee,
            amounts,
            events,
        })
    }

    /// Free `amount` of coin `asset`: pending deposits, then its vault, then
    /// LP units out of the pool vault
    fn take_coin(&self, holdings: &mut Holdings, asset: AssetId, amount: u128) -> Result<(), StrataError> {
        let from_pending = min_u128(holdings.pending[asset], amount);
        holdings.pending[asset] -= from_pending;
        let mut remaining = amount - from_pending;

        remaining -= holdings.vaults[asset].withdraw(remaining);
        if remaining == 0 {
            return Ok(());
        }

        // Round the LP requirement up by one unit so the payout is covered
        let lp_needed = self
            .guard
            .usd_to_lp(self.guard.single_stable_to_usd(remaining, asset)?)?
            .saturating_add(1);
        let lp = holdings.curve_vault.withdraw(lp_needed);
        let got = self.guard.single_stable_from_lp(lp, asset)?;
        if got < remaining {
            return Err(StrataError::InsufficientLiquidity {
                requested: amount,
                available: amount - remaining + got,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Investing and harvesting
    // ------------------------------------------------------------------

    /// Route every pending deposit into the vaults. Returns the USD routed.
    pub fn invest_pending(&mut self) -> Result<u128, StrataError> {
        self.book.mode.require_normal("invest")?;
        let mut book = self.book.clone();
        let skim = self.skim_of(&book)?;
        let rebalancer = Rebalancer::new(
            &self.guard,
            &self.calculator,
            &book.target,
            &self.config.rebalance,
            book.pnl.utilisation_ratio(),
        );
        let routed = rebalancer.route_pending(&mut book.holdings, skim)?;
        self.commit(book, &[], None)?;
        Ok(routed)
    }

    pub fn invest_trigger(&self, vault: VaultId) -> Result<bool, StrataError> {
        Ok(self.book.holdings.vault(vault)?.invest_trigger())
    }

    /// Deploy a vault's buffer above its hold. Stablecoin vaults first take
    /// the strategy split implied by the current utilisation.
    pub fn invest_vault(&mut self, vault: VaultId) -> Result<u128, StrataError> {
        self.book.mode.require_normal("invest")?;
        self.guard.safety_check()?;

        let mut book = self.book.clone();
        let targets = strategy_targets(book.pnl.utilisation_ratio());
        let position = book.holdings.vault_mut(vault)?;
        if matches!(vault, VaultId::Stable(_)) && position.strategies.len() == targets.len() {
            position.set_strategy_ratios(&targets)?;
        }
        let moved = position.invest();
        log::debug!("Invest: {:?} deployed {}", vault, moved);
        self.commit(book, &[], None)?;
        Ok(moved)
    }

    /// Harvest one strategy and book the result.
    ///
    /// Emits the invest event, then a price event when the live total still
    /// differs materially from the ledger.
    pub fn strategy_harvest(&mut self, vault: VaultId, strategy: usize) -> Result<PnlEvents, StrataError> {
        self.book.mode.require_normal("harvest")?;
        self.guard.safety_check()?;

        let mut book = self.book.clone();
        let vault_index = match vault {
            VaultId::Stable(i) => i,
            VaultId::Curve => book.holdings.n_assets(),
        };
        let invested = book
            .holdings
            .vault(vault)?
            .strategies
            .get(strategy)
            .map(|s| s.invested)
            .ok_or(StrataError::UnknownStrategy {
                vault: vault_index,
                strategy,
            })?;

        let report = self.yields.harvest(vault, strategy, invested)?;
        book.holdings.vault_mut(vault)?.report(strategy, report.profit, report.loss)?;

        let (gain, loss) = match vault {
            VaultId::Stable(i) => (
                self.guard.single_stable_to_usd(report.profit, i)?,
                self.guard.single_stable_to_usd(report.loss, i)?,
            ),
            VaultId::Curve => (self.guard.lp_to_usd(report.profit)?, self.guard.lp_to_usd(report.loss)?),
        };

        let mut events = PnlEvents::new();
        events.push(book.pnl.distribute_strategy_gain_loss(gain, loss));
        if let Some(e) = self.price_pass(&mut book)? {
            events.push(e);
        }

        self.commit(book, &events, None)?;
        Ok(events)
    }

    // ------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------

    pub fn rebalance(&mut self) -> Result<RebalanceReport, StrataError> {
        self.book.mode.require_normal("rebalance")?;
        let mut book = self.book.clone();
        let price_event = self.price_pass(&mut book)?;

        let skim = self.skim_of(&book)?;
        let rebalancer = Rebalancer::new(
            &self.guard,
            &self.calculator,
            &book.target,
            &self.config.rebalance,
            book.pnl.utilisation_ratio(),
        );
        let report = rebalancer.rebalance(&mut book.holdings, skim)?;
        self.commit(book, price_event.as_slice(), None)?;
        Ok(report)
    }

    pub fn set_underlying_token_percents(&mut self, percents: &[u32]) -> Result<(), StrataError> {
        self.book.target.set_stablecoin_percents(percents)?;
        log::info!("Allocation: stablecoin percents {:?}", percents);
        Ok(())
    }

    pub fn set_curve_vault_percent(&mut self, bps: u32) -> Result<(), StrataError> {
        self.book.target.set_curve_vault_percent(bps)?;
        log::info!("Allocation: pool vault percent {}", bps);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Price guard
    // ------------------------------------------------------------------

    pub fn safety_check(&self) -> Result<(), StrataError> {
        self.guard.safety_check()
    }

    pub fn update_ratios(&mut self) -> Result<(), StrataError> {
        self.guard.update_ratios()
    }

    pub fn update_pool(&mut self, pool: PoolReserves) -> Result<(), StrataError> {
        if pool.n_coins() != self.book.holdings.n_assets() {
            return Err(StrataError::UnknownAsset(pool.n_coins()));
        }
        self.guard.update_pool(pool)
    }

    pub fn set_oracle_tolerance(&mut self, bps: u32) {
        self.guard.set_oracle_tolerance(bps);
    }

    pub fn set_curve_tolerance(&mut self, bps: u32) {
        self.guard.set_curve_tolerance(bps);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn emergency_state(&self) -> Mode {
        self.book.mode
    }

    pub fn pause(&mut self) -> Result<(), StrataError> {
        self.book.mode = self.book.mode.pause()?;
        log::warn!("Lifecycle: paused");
        Ok(())
    }

    pub fn unpause(&mut self) -> Result<(), StrataError> {
        self.book.mode = self.book.mode.unpause()?;
        log::info!("Lifecycle: unpaused");
        Ok(())
    }

    /// Enter emergency mode. `asset` names the failed stablecoin, `None`
    /// distrusts the reference feed as a whole. The book is forced onto the
    /// total valued without the failed asset.
    pub fn emergency(&mut self, asset: Option<AssetId>) -> Result<PnlEvent, StrataError> {
        if let Some(a) = asset {
            if a >= self.book.holdings.n_assets() {
                return Err(StrataError::UnknownAsset(a));
            }
        }
        let mode = self.book.mode.emergency(asset)?;

        let previous = self.guard.bypass();
        self.guard.set_bypass(bypass_for(mode));

        let mut book = self.book.clone();
        book.mode = mode;
        let total = match self.live_total(&book) {
            Ok(total) => total,
            Err(e) => {
                self.guard.set_bypass(previous);
                return Err(e);
            }
        };
        let event = book.pnl.emergency_recompute(total);
        self.commit(book, &[event], None)?;
        log::warn!("Lifecycle: emergency, failed asset {:?}", asset);
        Ok(event)
    }

    /// Leave emergency mode with fresh stablecoin targets
    pub fn restart(&mut self, percents: &[u32]) -> Result<(), StrataError> {
        let mode = self.book.mode.restart()?;
        let mut target = self.book.target.clone();
        target.set_stablecoin_percents(percents)?;

        self.book.target = target;
        self.book.mode = mode;
        self.guard.set_bypass(FeedBypass::None);
        log::info!("Lifecycle: restarted with stablecoin percents {:?}", percents);
        Ok(())
    }
}

fn bonus_of(events: &[PnlEvent]) -> u128 {
    events.iter().map(|e| e.performance_bonus).sum()
}

fn bypass_for(mode: Mode) -> FeedBypass {
    match mode {
        Mode::Emergency(Some(asset)) => FeedBypass::Asset(asset),
        Mode::Emergency(None) => FeedBypass::All,
        _ => FeedBypass::None,
    }
}
