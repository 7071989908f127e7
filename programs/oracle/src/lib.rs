//! Stable-swap pricing and the price guard
//!
//! Converts between stablecoin amounts, LP units and USD at pool-derived
//! rates, refusing to do so when the pool disagrees with the reference feed
//! or with its own recorded ratios.

pub mod feed;
pub mod guard;
pub mod stableswap;

pub use feed::*;
pub use guard::*;
pub use stableswap::*;
