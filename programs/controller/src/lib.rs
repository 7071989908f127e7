//! Strata protocol core
//!
//! Two tranches share one pool of stablecoins: Growth absorbs losses first
//! and takes the upside, Protected keeps its principal while Growth capital
//! remains. The crate keeps the tranche accounting, decides where capital
//! sits across the stablecoin vaults and the pool vault, and prices every
//! conversion through `strata_oracle::PriceGuard`.

pub mod config;
pub mod state;
pub mod exposure;
pub mod rebalance;
pub mod pnl;
pub mod lifecycle;
pub mod ledger;
pub mod yield_source;
pub mod controller;

pub use config::*;
pub use controller::*;
pub use ledger::*;
pub use lifecycle::*;
pub use yield_source::*;
