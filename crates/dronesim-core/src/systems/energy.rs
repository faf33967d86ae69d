//! Energy system - low-battery returns and charging

use dronesim_logic::lifecycle::DroneStatus;
use hecs::World;
use log::debug;

use crate::components::{Drone, ExecutionMode};
use crate::config::SimConfig;
use crate::generation::FleetLayout;
use crate::metrics::EpisodeStats;
use crate::orders::OrderBook;
use crate::systems::{has_work, location_of, mode_of, set_course};

/// Charge docked drones and send idle, drained drones home.
///
/// Only a drone with no commitment, no cargo and no owed pickups turns
/// back; loaded drones finish their work first.
pub fn energy_system(
    world: &mut World,
    orders: &OrderBook,
    layout: &FleetLayout,
    config: &SimConfig,
    stats: &mut EpisodeStats,
) {
    for (drone_id, entity) in layout.drone_ids() {
        let Ok((status, battery, home)) = world
            .get::<&Drone>(entity)
            .map(|d| (d.status, d.battery, d.home))
        else {
            continue;
        };

        match status {
            DroneStatus::Charging => {
                let charged = (battery + config.charge_rate).min(1.0);
                if let Ok(mut drone) = world.get::<&mut Drone>(entity) {
                    drone.battery = charged;
                    if charged >= 1.0 {
                        drone.status = DroneStatus::Idle;
                    }
                }
                if charged >= 1.0 {
                    stats.charge_cycles += 1;
                    debug!("drone {} fully charged", drone_id);
                }
            }
            DroneStatus::Idle if battery < config.low_battery_threshold => {
                if mode_of(world, entity) != ExecutionMode::Unassigned
                    || has_work(world, orders, entity, drone_id)
                {
                    continue;
                }
                let at_home = location_of(world, entity)
                    .is_some_and(|l| l.is_near(&home, config.arrival_threshold));
                if at_home {
                    set_course(world, entity, DroneStatus::Charging, None);
                } else {
                    debug!("drone {} low on battery ({:.2}), returning to base", drone_id, battery);
                    set_course(world, entity, DroneStatus::ReturningToBase, Some(home));
                }
            }
            _ => {}
        }
    }
}
