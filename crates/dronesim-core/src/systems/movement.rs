//! Movement system - straight-line flight toward each drone's target

use dronesim_logic::geometry::step_toward;
use hecs::World;

use crate::components::{Drone, Movement, Position};
use crate::metrics::EpisodeStats;

/// Advance every drone with a target by one step of its effective speed.
///
/// Drones snap onto the target when it is within one step. The `Movement`
/// component stays in place; the arrival system decides what happens next.
pub fn movement_system(world: &mut World, energy_per_unit: f32, stats: &mut EpisodeStats) {
    for (_, (drone, pos, movement)) in world.query_mut::<(&mut Drone, &mut Position, &Movement)>() {
        let result = step_toward(pos.location, movement.destination, drone.effective_speed());
        pos.location = result.position;

        let energy = result.travelled * energy_per_unit;
        drone.battery = (drone.battery - energy).max(0.0);
        stats.flight_distance += result.travelled as f64;
        stats.energy_used += energy as f64;
    }
}
