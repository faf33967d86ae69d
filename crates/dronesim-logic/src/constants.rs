//! Default tuning values shared by the engine config and the harness.

/// Side length of the square service area.
pub const GRID_SIZE: f32 = 16.0;

/// Distance units a drone covers per step at speed multiplier 1.0.
pub const DRONE_SPEED: f32 = 1.0;

/// A drone closer than this to its target has arrived.
pub const ARRIVAL_THRESHOLD: f32 = 0.5;

/// Maximum number of orders a drone may hold (cargo + pending pickups).
pub const DRONE_CAPACITY: usize = 10;

/// Service-level window, in steps after an order becomes ready.
pub const SLA_STEPS: u64 = 6;

/// Multiplier on `SLA_STEPS` giving the cancellation deadline.
pub const TIMEOUT_FACTOR: u64 = 8;

/// Candidate list length per drone (K).
pub const NUM_CANDIDATES: usize = 20;

/// Speed multiplier range reachable through decisions.
pub const MIN_SPEED_MULTIPLIER: f32 = 0.5;
pub const MAX_SPEED_MULTIPLIER: f32 = 1.5;

/// Battery drained per distance unit flown (battery is 0.0..=1.0).
pub const ENERGY_PER_UNIT: f32 = 0.01;

/// Idle drones below this battery level head home to charge.
pub const LOW_BATTERY_THRESHOLD: f32 = 0.2;

/// Battery restored per step while charging.
pub const CHARGE_RATE: f32 = 0.1;
