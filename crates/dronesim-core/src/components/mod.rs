//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod common;
mod drone;
mod merchant;

pub use common::*;
pub use drone::*;
pub use merchant::*;
