//! Tranche accounting through the full controller
//!
//! Covers the loss waterfall, the Growth floor, withdrawal bonus
//! conservation and the ordering of harvest events.

use proptest::prelude::*;
use strata_common::{TrancheKind, MIN_UNIT};
use strata_controller::pnl::{PnlEngine, PnlEventKind};
use strata_controller::state::VaultId;
use strata_controller::{HarvestReport, PnlParams, TokenLedger};
use strata_integration_tests::*;

#[test]
fn test_harvest_loss_hits_growth_first() {
    let mut c = seeded();
    c.invest_vault(VaultId::Stable(0)).unwrap();
    c.yields_mut()
        .push(VaultId::Stable(0), 0, HarvestReport { profit: 0, loss: 500 * DAI });

    let events = c.strategy_harvest(VaultId::Stable(0), 0).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, PnlEventKind::Invest);
    assert_eq!(events[0].invest_pnl, -((500 * USD) as i128));
    assert_eq!(c.calc_pnl(), (9_500 * USD, 5_000 * USD));
    assert_eq!(c.ledger().assets_of(TrancheKind::Growth, "alice"), 9_500 * USD);
    assert_eq!(c.ledger().assets_of(TrancheKind::Protected, "bob"), 5_000 * USD);
}

#[test]
fn test_loss_beyond_growth_keeps_floor() {
    let mut e = PnlEngine::with_assets(PnlParams::default(), 1_000 * USD, 5_000 * USD);

    e.distribute_strategy_gain_loss(0, 500 * USD);
    assert_eq!(e.calc_pnl(), (500 * USD, 5_000 * USD));

    let mut e = PnlEngine::with_assets(PnlParams::default(), 1_000 * USD, 5_000 * USD);
    e.distribute_strategy_gain_loss(0, 1_200 * USD);
    assert_eq!(e.calc_pnl(), (MIN_UNIT, 5_000 * USD - 200 * USD - MIN_UNIT));
}

#[test]
fn test_withdrawal_bonus_conserved() {
    let mut c = seeded();
    let before = book_total(&c);

    let receipt = c
        .withdraw_balanced(TrancheKind::Protected, "bob", 1_000 * USD, &[0, 0, 0])
        .unwrap();

    assert_eq!(receipt.fee, 5 * USD);
    assert_eq!(book_total(&c), before - 1_000 * USD + 5 * USD);

    let event = receipt.events.last().unwrap();
    assert_eq!(event.kind, PnlEventKind::Withdrawal);
    assert_eq!(event.withdrawal_bonus, 5 * USD);
    assert_eq!(event.after_total(), event.before_total() + 5 * USD);
}

#[test]
fn test_harvest_without_price_move_emits_one_event() {
    let mut c = seeded();
    c.invest_vault(VaultId::Stable(0)).unwrap();
    c.yields_mut()
        .push(VaultId::Stable(0), 0, HarvestReport { profit: 100 * DAI, loss: 0 });

    let events = c.strategy_harvest(VaultId::Stable(0), 0).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, PnlEventKind::Invest);
    assert_eq!(book_total(&c), 15_100 * USD);
}

#[test]
fn test_harvest_with_price_move_emits_two_events() {
    let mut c = seeded();
    c.invest_vault(VaultId::Stable(0)).unwrap();

    // LP supply shrinks, so each pool vault unit is worth ~1% more
    c.update_pool(balanced_pool(29_700_000 * USD)).unwrap();
    c.yields_mut()
        .push(VaultId::Stable(0), 0, HarvestReport { profit: 100 * DAI, loss: 0 });

    let events = c.strategy_harvest(VaultId::Stable(0), 0).unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, PnlEventKind::Invest);
    assert_eq!(events[1].kind, PnlEventKind::Price);
    assert!(events[1].price_pnl > 0);
    assert_eq!(events[1].before_total(), events[0].after_total());
    assert_eq!(book_total(&c), live_total(&c));
    assert_eq!(c.events().len(), 2);
}

#[test]
fn test_price_gain_goes_to_growth() {
    let mut c = seeded();
    c.update_pool(balanced_pool(29_700_000 * USD)).unwrap();
    assert!(c.pnl_trigger().unwrap());

    let event = c.execute_pnl().unwrap().unwrap();
    let (gvt, pwrd) = c.calc_pnl();
    assert_eq!(pwrd, 5_000 * USD);
    assert_eq!(gvt, event.after_gvt);
    assert_eq!(book_total(&c), live_total(&c));
    assert!(!c.pnl_trigger().unwrap());
}

proptest! {
    #[test]
    fn prop_loss_never_breaks_floor(
        gvt in 1u128..=1_000_000,
        pwrd in 1u128..=1_000_000,
        loss_pct in 0u128..=300,
    ) {
        let gvt = gvt * USD;
        let pwrd = pwrd * USD;
        let loss = (gvt + pwrd) * loss_pct / 100;

        let mut e = PnlEngine::with_assets(PnlParams::default(), gvt, pwrd);
        e.distribute_strategy_gain_loss(0, loss);
        let (gvt_after, pwrd_after) = e.calc_pnl();

        prop_assert!(gvt_after >= MIN_UNIT);
        prop_assert!(pwrd_after >= MIN_UNIT);
        if loss <= gvt - MIN_UNIT {
            prop_assert_eq!(gvt_after, gvt - loss);
            prop_assert_eq!(pwrd_after, pwrd);
        } else {
            prop_assert_eq!(gvt_after, MIN_UNIT);
        }
    }

    #[test]
    fn prop_gain_never_debits_protected(
        gvt in 1u128..=1_000_000,
        pwrd in 0u128..=1_000_000,
        gain in 0u128..=100_000,
    ) {
        let mut e = PnlEngine::with_assets(PnlParams::default(), gvt * USD, pwrd * USD);
        let event = e.distribute_strategy_gain_loss(gain * USD, 0);
        let (gvt_after, pwrd_after) = e.calc_pnl();

        prop_assert!(pwrd_after >= pwrd * USD);
        prop_assert!(gvt_after >= gvt * USD + event.performance_bonus);
        prop_assert_eq!(gvt_after + pwrd_after, (gvt + pwrd + gain) * USD);
    }
}
