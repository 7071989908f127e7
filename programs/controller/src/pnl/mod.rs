//! Profit and loss accounting between the Growth and Protected tranches

pub mod engine;
pub mod event;

pub use engine::*;
pub use event::*;
