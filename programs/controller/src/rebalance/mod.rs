//! Allocation planning and rebalance execution

pub mod executor;
pub mod planner;

pub use executor::*;
pub use planner::*;
