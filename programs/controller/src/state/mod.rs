pub mod tranche;
pub mod vault;
pub mod allocation;
pub mod holdings;
pub mod model_bridge;

pub use tranche::*;
pub use vault::*;
pub use allocation::*;
pub use holdings::*;
