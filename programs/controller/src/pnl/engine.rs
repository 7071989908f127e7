//! Tranche accounting engine
//!
//! Owns the two tranche records and applies every value change through the
//! pure `tranche_model` transitions. Each operation that changes the split
//! returns a `PnlEvent` describing the step.

use strata_common::{AllocationIssue, StrataError, TrancheKind, PERCENT_FACTOR};
use tranche_model::math::{abs_diff_u128, bps_of, ratio_bps};
use tranche_model::Book;

use super::event::{signed_delta, PnlEvent, PnlEventKind};
use crate::config::PnlParams;
use crate::state::model_bridge::{apply_book, pnl_params_to_model, tranches_to_book};
use crate::state::Tranche;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PnlEngine {
    growth: Tranche,
    protected: Tranche,
    params: PnlParams,
}

impl PnlEngine {
    pub fn new(params: PnlParams) -> Self {
        Self {
            growth: Tranche::new(TrancheKind::Growth, 0, true),
            protected: Tranche::new(TrancheKind::Protected, 0, params.pwrd_rebase),
            params,
        }
    }

    /// Resume from recorded tranche values
    pub fn with_assets(params: PnlParams, gvt: u128, pwrd: u128) -> Self {
        let mut engine = Self::new(params);
        engine.growth.last_assets = gvt;
        engine.protected.last_assets = pwrd;
        engine
    }

    pub fn params(&self) -> &PnlParams {
        &self.params
    }

    pub fn tranche(&self, kind: TrancheKind) -> &Tranche {
        match kind {
            TrancheKind::Growth => &self.growth,
            TrancheKind::Protected => &self.protected,
        }
    }

    fn book(&self) -> Book {
        tranches_to_book(&self.growth, &self.protected)
    }

    fn commit(&mut self, book: &Book) {
        apply_book(book, &mut self.growth, &mut self.protected);
    }

    /// Last recorded `(gvt, pwrd)` values
    pub fn calc_pnl(&self) -> (u128, u128) {
        (self.growth.last_assets, self.protected.last_assets)
    }

    pub fn last_total(&self) -> u128 {
        self.book().total()
    }

    /// Protected / Growth in bps
    pub fn utilisation_ratio(&self) -> u128 {
        tranche_model::utilisation(&self.book())
    }

    /// Utilisation after a hypothetical change to one tranche.
    ///
    /// Protected value with no Growth behind it is unbounded utilisation.
    pub fn utilisation_after(&self, kind: TrancheKind, add: u128, sub: u128) -> u128 {
        let book = tranche_model::withdraw(tranche_model::deposit(self.book(), kind, add), kind, sub);
        if book.gvt == 0 && book.pwrd > 0 {
            return u128::MAX;
        }
        tranche_model::utilisation(&book)
    }

    pub fn pnl_trigger(&self, current_total: u128) -> bool {
        current_total != self.last_total()
    }

    /// Live total differs from the ledger by more than the price threshold
    pub fn total_assets_change_trigger(&self, current_total: u128) -> bool {
        let last = self.last_total();
        if last == 0 {
            return current_total != 0;
        }
        ratio_bps(abs_diff_u128(current_total, last), last) > self.params.price_change_threshold_bps as u128
    }

    pub fn set_performance_fee(&mut self, bps: u32) -> Result<(), StrataError> {
        if bps > PERCENT_FACTOR {
            return Err(StrataError::AllocationInvariantViolation(AllocationIssue::OutOfRange(bps)));
        }
        log::info!("PnL: performance fee {} -> {} bps", self.params.performance_fee_bps, bps);
        self.params.performance_fee_bps = bps;
        Ok(())
    }

    pub fn set_rebase(&mut self, enabled: bool) {
        log::info!("PnL: protected rebase {}", if enabled { "enabled" } else { "disabled" });
        self.params.pwrd_rebase = enabled;
        self.protected.rebase_enabled = enabled;
    }

    pub fn increase_last_assets(&mut self, kind: TrancheKind, usd: u128) {
        let book = tranche_model::deposit(self.book(), kind, usd);
        self.commit(&book);
    }

    /// Remove a withdrawal and spread its fee by post-withdrawal weights.
    ///
    /// The event's "before" values are taken after the withdrawal itself, so
    /// it shows only the bonus redistribution.
    pub fn decrease_last_assets(&mut self, kind: TrancheKind, usd: u128, bonus: u128) -> PnlEvent {
        let withdrawn = tranche_model::withdraw(self.book(), kind, usd);
        let before = (withdrawn.gvt, withdrawn.pwrd);
        let after = tranche_model::apply_bonus(withdrawn, bonus);
        self.commit(&after);

        let mut event = PnlEvent::new(PnlEventKind::Withdrawal, before, (after.gvt, after.pwrd));
        event.withdrawal_bonus = bonus;
        log::debug!("PnL: withdrawal of {} from {:?}, bonus {}", usd, kind, bonus);
        event
    }

    fn apply_loss(&self, book: Book, loss: u128) -> Book {
        let p = pnl_params_to_model(&self.params);
        let after = tranche_model::handle_loss(book, loss, &p);
        if after.pwrd < book.pwrd {
            log::warn!(
                "PnL: loss of {} exhausted growth, protected debited {}",
                loss,
                book.pwrd - after.pwrd
            );
            if after.total() > book.total().saturating_sub(loss) {
                log::error!("PnL: protected at floor, loss not fully absorbed; needs intervention");
            }
        }
        after
    }

    /// Book a harvest. Gain and loss are netted; a net gain pays the
    /// performance fee to Growth before the rest is split.
    pub fn distribute_strategy_gain_loss(&mut self, gain: u128, loss: u128) -> PnlEvent {
        let book = self.book();
        let p = pnl_params_to_model(&self.params);

        let (after, bonus) = if gain >= loss {
            let net = gain - loss;
            (tranche_model::handle_invest_gain(book, net, &p), tranche_model::performance_fee(net, &p))
        } else {
            (self.apply_loss(book, loss - gain), 0)
        };
        self.commit(&after);

        let mut event = PnlEvent::new(PnlEventKind::Invest, (book.gvt, book.pwrd), (after.gvt, after.pwrd));
        event.invest_pnl = signed_delta(gain, loss);
        event.performance_bonus = bonus;
        log::info!(
            "PnL: invest {:+} (bonus {}) gvt {} -> {} pwrd {} -> {}",
            event.invest_pnl,
            bonus,
            book.gvt,
            after.gvt,
            book.pwrd,
            after.pwrd
        );
        event
    }

    /// Move the book to the live total. Gains go to Growth, losses follow the
    /// loss rule. Nothing happens when the totals already agree.
    pub fn distribute_price_change(&mut self, current_total: u128) -> Option<PnlEvent> {
        let book = self.book();
        let last = book.total();
        if current_total == last {
            return None;
        }

        let after = if current_total > last {
            tranche_model::handle_price_gain(book, current_total - last)
        } else {
            self.apply_loss(book, last - current_total)
        };
        self.commit(&after);

        let mut event = PnlEvent::new(PnlEventKind::Price, (book.gvt, book.pwrd), (after.gvt, after.pwrd));
        event.price_pnl = signed_delta(current_total, last);
        log::info!(
            "PnL: price {:+} gvt {} -> {} pwrd {} -> {}",
            event.price_pnl,
            book.gvt,
            after.gvt,
            book.pwrd,
            after.pwrd
        );
        Some(event)
    }

    /// Force the book onto `current_total`, preserving Protected where the
    /// total allows it.
    pub fn emergency_recompute(&mut self, current_total: u128) -> PnlEvent {
        let book = self.book();
        let p = pnl_params_to_model(&self.params);
        let after = tranche_model::force_distribute(book, current_total, &p);
        self.commit(&after);

        let mut event = PnlEvent::new(PnlEventKind::Emergency, (book.gvt, book.pwrd), (after.gvt, after.pwrd));
        event.price_pnl = signed_delta(after.total(), book.total());
        log::warn!(
            "PnL: emergency recompute to {} gvt {} -> {} pwrd {} -> {}",
            current_total,
            book.gvt,
            after.gvt,
            book.pwrd,
            after.pwrd
        );
        event
    }

    /// Withdrawal fee for a tranche
    pub fn withdrawal_fee(&self, kind: TrancheKind, usd: u128) -> u128 {
        let bps = match kind {
            TrancheKind::Growth => self.params.withdrawal_fee_gvt_bps,
            TrancheKind::Protected => self.params.withdrawal_fee_pwrd_bps,
        };
        bps_of(usd, bps as u128)
    }
}
