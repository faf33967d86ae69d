//! Pure simulation rules for DroneSim.
//!
//! This crate contains the delivery rules that do not need the ECS world:
//! functions take plain data and return results, so they are unit-testable
//! and shared by the engine, the harness, and any external allocator.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | Default tuning values (speeds, thresholds, SLA) |
//! | [`deadline`] | Deadline and on-time arithmetic |
//! | [`gate`] | Pickup/delivery precondition checks with reason codes |
//! | [`geometry`] | 2D vector and straight-line navigation primitive |
//! | [`lifecycle`] | Order/drone status enums and legal order transitions |
//! | [`ranking`] | Candidate tiers, ordering, and sentinel padding |
//! | [`selection`] | Decoding raw choices, speed mapping, fallback selection |

pub mod constants;
pub mod deadline;
pub mod gate;
pub mod geometry;
pub mod lifecycle;
pub mod ranking;
pub mod selection;

/// Drone identifier (dense, `0..num_drones`).
pub type DroneId = u32;
/// Merchant identifier (dense, `0..num_merchants`).
pub type MerchantId = u32;
/// Order identifier (monotonically increasing per episode).
pub type OrderId = u64;
