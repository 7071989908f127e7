use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PnlEventKind {
    /// Strategy harvest
    Invest,
    /// Live total moved against the ledger
    Price,
    /// Withdrawal fee redistributed
    Withdrawal,
    /// Book forced onto the live total
    Emergency,
}

/// One accounting step, before and after (USD, 18 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnlEvent {
    pub kind: PnlEventKind,
    pub before_gvt: u128,
    pub before_pwrd: u128,
    pub after_gvt: u128,
    pub after_pwrd: u128,
    pub invest_pnl: i128,
    pub price_pnl: i128,
    pub performance_bonus: u128,
    pub withdrawal_bonus: u128,
}

impl PnlEvent {
    pub(crate) fn new(kind: PnlEventKind, before: (u128, u128), after: (u128, u128)) -> Self {
        Self {
            kind,
            before_gvt: before.0,
            before_pwrd: before.1,
            after_gvt: after.0,
            after_pwrd: after.1,
            invest_pnl: 0,
            price_pnl: 0,
            performance_bonus: 0,
            withdrawal_bonus: 0,
        }
    }

    pub fn before_total(&self) -> u128 {
        self.before_gvt.saturating_add(self.before_pwrd)
    }

    pub fn after_total(&self) -> u128 {
        self.after_gvt.saturating_add(self.after_pwrd)
    }
}

/// Signed difference `a - b`
pub(crate) fn signed_delta(a: u128, b: u128) -> i128 {
    if a >= b {
        i128::try_from(a - b).unwrap_or(i128::MAX)
    } else {
        i128::try_from(b - a).map(|d| -d).unwrap_or(i128::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_delta() {
        assert_eq!(signed_delta(10, 3), 7);
        assert_eq!(signed_delta(3, 10), -7);
        assert_eq!(signed_delta(u128::MAX, 0), i128::MAX);
    }

    #[test]
    fn test_totals() {
        let e = PnlEvent::new(PnlEventKind::Price, (10, 20), (15, 20));
        assert_eq!(e.before_total(), 30);
        assert_eq!(e.after_total(), 35);
        assert_eq!(e.price_pnl, 0);
    }
}
