//! Protocol operating mode
//!
//! ```text
//! Normal --pause--> Paused --emergency(asset)--> Emergency
//!    ^                 |                             |
//!    +----unpause------+                             |
//!    +---------------restart(percents)---------------+
//! ```

use serde::{Deserialize, Serialize};
use strata_common::{AssetId, StrataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Normal,
    Paused,
    /// `Some(asset)` when a single stablecoin failed, `None` when the
    /// reference feed as a whole is distrusted
    Emergency(Option<AssetId>),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Paused => "paused",
            Mode::Emergency(_) => "emergency",
        }
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, Mode::Emergency(_))
    }

    /// Asset excluded from valuation and withdrawals
    pub fn failed_asset(&self) -> Option<AssetId> {
        match self {
            Mode::Emergency(asset) => *asset,
            _ => None,
        }
    }

    fn invalid(&self, operation: &'static str) -> StrataError {
        StrataError::InvalidState {
            operation,
            mode: self.name(),
        }
    }

    pub fn pause(self) -> Result<Mode, StrataError> {
        match self {
            Mode::Normal => Ok(Mode::Paused),
            _ => Err(self.invalid("pause")),
        }
    }

    pub fn unpause(self) -> Result<Mode, StrataError> {
        match self {
            Mode::Paused => Ok(Mode::Normal),
            _ => Err(self.invalid("unpause")),
        }
    }

    pub fn emergency(self, asset: Option<AssetId>) -> Result<Mode, StrataError> {
        match self {
            Mode::Paused => Ok(Mode::Emergency(asset)),
            _ => Err(self.invalid("emergency")),
        }
    }

    pub fn restart(self) -> Result<Mode, StrataError> {
        match self {
            Mode::Emergency(_) => Ok(Mode::Normal),
            _ => Err(self.invalid("restart")),
        }
    }

    /// Gate for deposits, rebalances and investing
    pub fn require_normal(&self, operation: &'static str) -> Result<(), StrataError> {
        match self {
            Mode::Normal => Ok(()),
            _ => Err(self.invalid(operation)),
        }
    }

    /// Gate for withdrawals: holders can always exit, just never into the
    /// failed asset
    pub fn require_withdrawable(&self, operation: &'static str, asset: Option<AssetId>) -> Result<(), StrataError> {
        match self {
            Mode::Normal | Mode::Paused => Ok(()),
            Mode::Emergency(failed) if failed.is_none() || *failed != asset => Ok(()),
            _ => Err(self.invalid(operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let m = Mode::Normal.pause().unwrap();
        let m = m.emergency(Some(1)).unwrap();
        assert_eq!(m.failed_asset(), Some(1));
        assert!(m.is_emergency());
        assert_eq!(m.restart().unwrap(), Mode::Normal);
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(matches!(
            Mode::Normal.emergency(None),
            Err(StrataError::InvalidState { operation: "emergency", mode: "normal" })
        ));
        assert!(Mode::Normal.unpause().is_err());
        assert!(Mode::Paused.pause().is_err());
        assert!(Mode::Paused.restart().is_err());
        assert!(Mode::Emergency(None).pause().is_err());
    }

    #[test]
    fn test_gates() {
        assert!(Mode::Normal.require_normal("deposit").is_ok());
        assert!(Mode::Paused.require_normal("deposit").is_err());

        let m = Mode::Emergency(Some(2));
        assert!(m.require_normal("rebalance").is_err());
        assert!(m.require_withdrawable("withdraw", Some(0)).is_ok());
        assert!(m.require_withdrawable("withdraw", None).is_ok());
        assert!(m.require_withdrawable("withdraw", Some(2)).is_err());
        assert!(Mode::Paused.require_withdrawable("withdraw", Some(0)).is_ok());
        assert!(Mode::Paused.require_withdrawable("withdraw", None).is_ok());
    }
}
