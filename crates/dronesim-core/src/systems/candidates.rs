//! Candidate generation - fixed-width ranked order lists per drone

use dronesim_logic::lifecycle::OrderStatus;
use dronesim_logic::ranking::{rank_candidates, Candidate, CandidateEntry, CandidateTier};
use dronesim_logic::DroneId;
use hecs::World;

use crate::components::{Cargo, Drone};
use crate::generation::FleetLayout;
use crate::orders::OrderBook;
use crate::systems::location_of;

/// Build the ranked candidate list for one drone.
///
/// Cargo orders rank by distance to their customer; owned pickups and
/// fresh `Ready` orders by distance to their merchant. The `Ready` tier is
/// omitted once the drone's load reaches capacity. Unknown drones get an
/// all-sentinel list.
pub fn build_candidates(
    world: &World,
    orders: &OrderBook,
    layout: &FleetLayout,
    drone_id: DroneId,
    k: usize,
) -> Vec<Candidate> {
    let Some(entity) = layout.drone(drone_id) else {
        return vec![Candidate::NoOp; k];
    };
    let Some(location) = location_of(world, entity) else {
        return vec![Candidate::NoOp; k];
    };
    let capacity = world.get::<&Drone>(entity).map(|d| d.capacity).unwrap_or(0);

    let mut entries = Vec::new();
    let mut load = 0;

    if let Ok(cargo) = world.get::<&Cargo>(entity) {
        for &id in &cargo.orders {
            let Some(order) = orders.get(id) else {
                continue;
            };
            if order.status != OrderStatus::PickedUp || !order.is_owned_by(drone_id) {
                continue;
            }
            load += 1;
            entries.push(CandidateEntry {
                order_id: id,
                tier: CandidateTier::Cargo,
                distance: location.distance(&order.customer_location),
                ready_step: order.ready_step.unwrap_or(0),
            });
        }
    }

    for order in orders.pending_pickups(drone_id) {
        load += 1;
        entries.push(CandidateEntry {
            order_id: order.id,
            tier: CandidateTier::Assigned,
            distance: location.distance(&order.merchant_location),
            ready_step: order.ready_step.unwrap_or(0),
        });
    }

    if load < capacity {
        for order in orders.iter().filter(|o| o.is_open()) {
            entries.push(CandidateEntry {
                order_id: order.id,
                tier: CandidateTier::Ready,
                distance: location.distance(&order.merchant_location),
                ready_step: order.ready_step.unwrap_or(0),
            });
        }
    }

    rank_candidates(entries, k)
}

/// Candidate lists for every drone, indexed by drone id.
pub fn publish_candidates(
    world: &World,
    orders: &OrderBook,
    layout: &FleetLayout,
    k: usize,
) -> Vec<Vec<Candidate>> {
    layout
        .drone_ids()
        .map(|(id, _)| build_candidates(world, orders, layout, id, k))
        .collect()
}
