//! Error taxonomy shared by the price guard and the controller

use crate::types::AssetId;
use thiserror::Error;

/// Why an allocation setting or a rebalance outcome was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationIssue {
    /// A percentage vector does not sum to 10_000 bps
    PercentSum { expected: u64, actual: u64 },
    /// A percentage vector has the wrong number of entries
    Length { expected: usize, actual: usize },
    /// A single percentage is above 10_000 bps
    OutOfRange(u32),
    /// Protocol exposure still over its ceiling after a rebalance
    ProtocolOverCeiling { protocol: usize, exposure: u32, ceiling: u32 },
}

impl core::fmt::Display for AllocationIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocationIssue::PercentSum { expected, actual } => {
                write!(f, "percents sum to {} bps, expected {}", actual, expected)
            }
            AllocationIssue::Length { expected, actual } => {
                write!(f, "{} entries, expected {}", actual, expected)
            }
            AllocationIssue::OutOfRange(v) => write!(f, "{} bps is above 100%", v),
            AllocationIssue::ProtocolOverCeiling { protocol, exposure, ceiling } => write!(
                f,
                "protocol {} exposure {} bps over ceiling {} bps",
                protocol, exposure, ceiling
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrataError {
    #[error("price unsafe for asset {asset}: {deviation_bps} bps deviation")]
    PriceUnsafe { asset: AssetId, deviation_bps: u128 },

    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    #[error("slippage exceeded: minimum {minimum}, actual {actual}")]
    SlippageExceeded { minimum: u128, actual: u128 },

    #[error("allocation invariant violated: {0}")]
    AllocationInvariantViolation(AllocationIssue),

    #[error("{operation} not allowed in {mode} mode")]
    InvalidState { operation: &'static str, mode: &'static str },

    #[error("utilisation {utilisation} bps above limit {limit} bps")]
    UtilisationLimitExceeded { utilisation: u128, limit: u32 },

    #[error("unknown asset {0}")]
    UnknownAsset(AssetId),

    #[error("unknown strategy {strategy} in vault {vault}")]
    UnknownStrategy { vault: usize, strategy: usize },

    #[error("pool unavailable: {0}")]
    PoolUnavailable(&'static str),
}

pub type Result<T> = core::result::Result<T, StrataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = StrataError::PriceUnsafe { asset: 1, deviation_bps: 75 };
        assert_eq!(e.to_string(), "price unsafe for asset 1: 75 bps deviation");

        let e = StrataError::AllocationInvariantViolation(AllocationIssue::PercentSum {
            expected: 10_000,
            actual: 9_999,
        });
        assert_eq!(
            e.to_string(),
            "allocation invariant violated: percents sum to 9999 bps, expected 10000"
        );
    }
}
