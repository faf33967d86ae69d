//! DroneSim Core - Delivery Fleet Simulation Engine
//!
//! A discrete-time simulation of delivery drones serving time-bound orders
//! picked up at merchants and dropped at customers.
//!
//! # Architecture
//!
//! The engine keeps drones and merchants in an ECS world via `hecs`:
//! - **Entities**: drones, merchants
//! - **Components**: pure data (`Drone`, `Position`, `Movement`, `Cargo`,
//!   `ExecutionMode`, `Merchant`)
//! - **Systems**: per-tick logic that queries and updates components
//!
//! Orders live in the [`orders::OrderBook`] resource next to the world.
//! [`engine::DeliveryEngine`] owns both and is the only place that mutates
//! them; allocators and decision sources see [`snapshot::WorldSnapshot`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use dronesim_core::prelude::*;
//!
//! let mut engine = DeliveryEngine::new(SimConfig::default()).unwrap();
//! let mut allocator = GreedyAllocator;
//! let mut policy = CargoFirstPolicy;
//!
//! loop {
//!     let outcome = run_tick(&mut engine, &mut allocator, &mut policy).unwrap();
//!     if outcome.info.truncated {
//!         break;
//!     }
//! }
//! ```

pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod generation;
pub mod metrics;
pub mod orders;
pub mod policy;
pub mod snapshot;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{ExecutionStrategy, SimConfig};
    pub use crate::engine::{DeliveryEngine, StepInfo, StepOutcome};
    pub use crate::error::{ConsistencyError, InvalidAssignment, ItineraryError};
    pub use crate::metrics::EpisodeStats;
    pub use crate::policy::*;
    pub use crate::snapshot::WorldSnapshot;
    pub use dronesim_logic::geometry::Vec2;
    pub use dronesim_logic::lifecycle::{DroneStatus, OrderStatus};
    pub use dronesim_logic::ranking::Candidate;
    pub use dronesim_logic::{DroneId, MerchantId, OrderId};
}
