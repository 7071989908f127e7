//! Several holders sharing one tranche

use strata_common::TrancheKind;
use strata_controller::TokenLedger;
use strata_integration_tests::*;

#[test]
fn test_second_depositor_gets_fair_share() {
    let mut c = seeded();
    c.deposit(TrancheKind::Growth, "carol", &[10_000 * DAI, 0, 0], 0).unwrap();

    let ledger = c.ledger();
    assert_eq!(c.calc_pnl().0, 20_000 * USD);
    assert_eq!(ledger.assets_of(TrancheKind::Growth, "alice"), 10_000 * USD);
    assert_eq!(ledger.assets_of(TrancheKind::Growth, "carol"), 10_000 * USD);
    assert_eq!(ledger.total_assets(TrancheKind::Growth), 20_000 * USD);
}

#[test]
fn test_partial_withdrawal_spreads_fee_pro_rata() {
    let mut c = seeded();
    c.deposit(TrancheKind::Growth, "carol", &[1_000 * DAI, 0, 0], 0).unwrap();

    let receipt = c
        .withdraw_single(TrancheKind::Growth, "alice", 1_000 * USD, 0, 0)
        .unwrap();
    assert_eq!(receipt.fee, 5 * USD);

    let (gvt, pwrd) = c.calc_pnl();
    assert_eq!(gvt + pwrd, 15_005 * USD);

    // alice holds 9/10 of Growth shares and carol 1/10 after the burn
    let ledger = c.ledger();
    let alice = ledger.assets_of(TrancheKind::Growth, "alice");
    let carol = ledger.assets_of(TrancheKind::Growth, "carol");
    assert_eq!(carol, gvt / 10);
    assert_eq!(alice, gvt * 9 / 10);
    assert!(carol > 1_000 * USD && carol < 1_001 * USD);
    assert!(alice > 9_000 * USD && alice < 9_004 * USD);
    assert_eq!(ledger.assets_of(TrancheKind::Protected, "bob"), pwrd);
}

#[test]
fn test_protected_withdrawal_does_not_move_value_between_holders() {
    let mut c = seeded();
    c.deposit(TrancheKind::Protected, "dave", &[1_000 * DAI, 0, 0], 0).unwrap();
    assert_eq!(c.ledger().assets_of(TrancheKind::Protected, "dave"), 1_000 * USD);

    let receipt = c
        .withdraw_balanced(TrancheKind::Protected, "dave", 500 * USD, &[0, 0, 0])
        .unwrap();
    assert_eq!(receipt.fee, 5 * USD / 2);

    let (_, pwrd) = c.calc_pnl();
    let ledger = c.ledger();
    let bob = ledger.assets_of(TrancheKind::Protected, "bob");
    let dave = ledger.assets_of(TrancheKind::Protected, "dave");

    // Only the withdrawal bonus reaches the remaining holders
    assert!(bob >= 5_000 * USD && bob < 5_001 * USD);
    assert!(dave >= 500 * USD && dave < 501 * USD);
    assert!(bob.abs_diff(10 * dave) <= 10);
    assert!(bob + dave <= pwrd && pwrd - (bob + dave) <= 2);
}

#[test]
fn test_withdraw_all_leaves_others_whole() {
    let mut c = seeded();
    c.deposit(TrancheKind::Protected, "dave", &[0, 0, 800 * USDT], 0).unwrap();

    let receipt = c.withdraw_all_single(TrancheKind::Protected, "dave", 2, 0).unwrap();
    assert_eq!(receipt.usd, 800 * USD);
    assert_eq!(receipt.amounts[2], 796 * USDT);
    assert_eq!(c.ledger().balance_of_base(TrancheKind::Protected, "dave"), 0);
    assert!(c.ledger().assets_of(TrancheKind::Protected, "bob") >= 5_000 * USD);
}
