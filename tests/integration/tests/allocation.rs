//! Allocation, rebalancing and the price guard through the full controller

use proptest::prelude::*;
use strata_common::{StrataError, TrancheKind};
use strata_controller::state::VaultId;
use strata_controller::TokenLedger;
use strata_integration_tests::*;

/// Conversions round down by at most one unit of a 6-decimal coin each
const DUST: u128 = 100 * 1_000_000_000_000;

#[test]
fn test_routing_conserves_value() {
    let c = seeded();
    let s = c.prepare_calculation().unwrap();

    let vaults: u128 = s.vault_usd.iter().sum();
    let pending: u128 = s.pending_usd.iter().sum();
    assert_eq!(s.total_usd, vaults + pending + s.curve_usd);
    assert!(s.total_usd <= book_total(&c));
    assert!(book_total(&c) - s.total_usd <= DUST);
}

#[test]
fn test_rebalance_converges_after_target_change() {
    let mut c = seeded();
    assert!(!c.rebalance_trigger().unwrap());

    c.set_underlying_token_percents(&[2_000, 5_000, 3_000]).unwrap();
    assert!(c.rebalance_trigger().unwrap());
    let before = live_total(&c);

    let report = c.rebalance().unwrap();

    assert_eq!(report.shortfall_usd, 0);
    assert!(!c.rebalance_trigger().unwrap(), "{:?}", c.calc_risk_exposure().unwrap());
    let after = live_total(&c);
    assert!(after <= before && before - after <= DUST);
}

#[test]
fn test_pending_deposits_invested() {
    let mut c = seeded();
    c.deposit(TrancheKind::Growth, "carol", &[0, 700 * USDC, 0], 0).unwrap();
    assert!(!c.holdings().pending_is_empty());

    let routed = c.invest_pending().unwrap();

    assert_eq!(routed, 700 * USD);
    assert!(c.holdings().pending_is_empty());
    // Pool vault sits under its skim threshold, so 10% went to it
    assert!(c.holdings().vault(VaultId::Stable(1)).unwrap().total_assets() > 5_400 * USDC);
}

#[test]
fn test_guard_rejection_leaves_state_untouched() {
    let mut c = seeded();
    c.guard_mut().feed_mut().set_price(1, 98_000_000).unwrap();
    let book = c.book().clone();
    let alice = c.ledger().balance_of_base(TrancheKind::Growth, "alice");

    let err = c
        .deposit(TrancheKind::Growth, "alice", &[0, 1_000 * USDC, 0], 0)
        .unwrap_err();
    assert!(matches!(err, StrataError::PriceUnsafe { asset: 1, .. }));

    assert!(matches!(c.rebalance(), Err(StrataError::PriceUnsafe { .. })));
    assert!(matches!(c.invest_vault(VaultId::Curve), Err(StrataError::PriceUnsafe { .. })));
    assert!(c
        .withdraw_single(TrancheKind::Growth, "alice", 100 * USD, 0, 0)
        .is_err());

    assert_eq!(c.book(), &book);
    assert_eq!(c.ledger().balance_of_base(TrancheKind::Growth, "alice"), alice);
}

#[test]
fn test_drifted_pool_rejected() {
    let mut c = seeded();
    c.update_ratios().unwrap();

    let mut pool = balanced_pool(30_000_000 * USD);
    pool.balances[1] = 20_000_000 * USDC;
    c.update_pool(pool).unwrap();
    // Wide enough for the feed check, so only the drift check can fail
    c.set_oracle_tolerance(10_000);

    assert!(matches!(c.safety_check(), Err(StrataError::PriceUnsafe { .. })));
    c.set_curve_tolerance(10_000);
    assert!(c.safety_check().is_ok());
}

proptest! {
    #[test]
    fn prop_deposit_withdraw_round_trip(tokens in 1u128..=1_000, asset in 0usize..3) {
        let mut c = seeded();
        let unit = [DAI, USDC, USDT][asset];
        let mut amounts = [0u128; 3];
        amounts[asset] = tokens * unit;

        let receipt = c.deposit(TrancheKind::Growth, "carol", &amounts, 0).unwrap();
        prop_assert!(!receipt.routed);
        prop_assert_eq!(receipt.usd, tokens * USD);

        let out = c
            .withdraw_single(TrancheKind::Growth, "carol", receipt.usd, asset, 0)
            .unwrap();
        // 50 bps withdrawal fee stays behind
        prop_assert_eq!(out.amounts[asset], tokens * unit * 995 / 1_000);
        prop_assert_eq!(c.ledger().balance_of_base(TrancheKind::Growth, "carol"), 0);
    }
}
