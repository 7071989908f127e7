//! Pause and emergency handling through the full controller

use strata_common::{StrataError, TrancheKind};
use strata_controller::lifecycle::Mode;
use strata_controller::TokenLedger;
use strata_integration_tests::*;

#[test]
fn test_withdraw_while_paused() {
    let mut c = seeded();
    c.pause().unwrap();

    assert!(matches!(
        c.deposit(TrancheKind::Growth, "alice", &[100 * DAI, 0, 0], 0),
        Err(StrataError::InvalidState { operation: "deposit", .. })
    ));
    assert!(matches!(c.rebalance(), Err(StrataError::InvalidState { .. })));

    let receipt = c
        .withdraw_balanced(TrancheKind::Growth, "alice", 1_000 * USD, &[0, 0, 0])
        .unwrap();
    assert_eq!(receipt.fee, 5 * USD);
    assert!(c.ledger().assets_of(TrancheKind::Growth, "alice") < 9_004 * USD);

    c.unpause().unwrap();
    assert_eq!(c.emergency_state(), Mode::Normal);
}

#[test]
fn test_emergency_after_depeg() {
    let mut c = seeded();
    c.update_ratios().unwrap();

    // USDC floods the pool as it loses its peg
    let mut pool = balanced_pool(30_000_000 * USD);
    pool.balances[1] = 25_000_000 * USDC;
    c.update_pool(pool).unwrap();
    c.guard_mut().feed_mut().set_price(1, 95_000_000).unwrap();
    assert!(matches!(c.safety_check(), Err(StrataError::PriceUnsafe { asset: 1, .. })));

    c.pause().unwrap();
    c.emergency(Some(1)).unwrap();
    assert_eq!(c.emergency_state(), Mode::Emergency(Some(1)));
    assert!(c.safety_check().is_ok());

    // Growth absorbs the excluded coin, Protected keeps its value
    let (gvt, pwrd) = c.calc_pnl();
    assert_eq!(pwrd, 5_000 * USD);
    assert!(gvt < 10_000 * USD);

    assert!(matches!(
        c.withdraw_single(TrancheKind::Protected, "bob", 100 * USD, 1, 0),
        Err(StrataError::InvalidState { operation: "withdraw", .. })
    ));
    let receipt = c
        .withdraw_single(TrancheKind::Protected, "bob", 100 * USD, 0, 0)
        .unwrap();
    // Paid at the skewed pool's DAI price, still close to par
    assert!(receipt.amounts[0].abs_diff(995 * DAI / 10) < DAI);
    assert_eq!(receipt.amounts[1], 0);
    assert!(c.ledger().assets_of(TrancheKind::Protected, "bob") < 4_901 * USD);
}
