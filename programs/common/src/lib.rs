//! Shared units, asset descriptors and errors

pub mod types;
pub mod error;

pub use types::*;
pub use error::*;
