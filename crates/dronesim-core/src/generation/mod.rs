//! Generation - procedural creation of the fleet, merchants and orders

mod fleet;
mod orders;

pub use fleet::*;
pub use orders::*;
