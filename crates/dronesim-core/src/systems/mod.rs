//! Systems - logic that operates on components

mod arrival;
mod candidates;
mod deadline;
mod decision;
mod dispatch;
mod energy;
mod gate;
mod invariants;
mod movement;
mod readiness;

pub use arrival::*;
pub use candidates::*;
pub use deadline::*;
pub use decision::*;
pub use dispatch::*;
pub use energy::*;
pub use gate::*;
pub use invariants::*;
pub use movement::*;
pub use readiness::*;

use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::DroneStatus;
use dronesim_logic::{DroneId, MerchantId};
use hecs::{Entity, World};

use crate::components::{Cargo, Drone, ExecutionMode, Movement, Position};
use crate::generation::FleetLayout;
use crate::orders::OrderBook;

pub(crate) fn location_of(world: &World, entity: Entity) -> Option<Vec2> {
    world.get::<&Position>(entity).ok().map(|p| p.location)
}

pub(crate) fn target_of(world: &World, entity: Entity) -> Option<Vec2> {
    world.get::<&Movement>(entity).ok().map(|m| m.destination)
}

/// Set a drone's status and flight target together.
pub(crate) fn set_course(
    world: &mut World,
    entity: Entity,
    status: DroneStatus,
    target: Option<Vec2>,
) {
    if let Ok(mut drone) = world.get::<&mut Drone>(entity) {
        drone.status = status;
    }
    match target {
        Some(destination) => {
            let _ = world.insert_one(entity, Movement::to(destination));
        }
        None => {
            let _ = world.remove_one::<Movement>(entity);
        }
    }
}

pub(crate) fn set_mode(world: &mut World, entity: Entity, mode: ExecutionMode) {
    if let Ok(mut current) = world.get::<&mut ExecutionMode>(entity) {
        *current = mode;
    }
}

/// Release any commitment and park the drone.
pub(crate) fn go_idle(world: &mut World, entity: Entity) {
    set_mode(world, entity, ExecutionMode::Unassigned);
    set_course(world, entity, DroneStatus::Idle, None);
}

/// Nearest merchant within `threshold` of `point`.
pub(crate) fn merchant_at(
    world: &World,
    layout: &FleetLayout,
    point: Vec2,
    threshold: f32,
) -> Option<MerchantId> {
    layout
        .merchants
        .iter()
        .enumerate()
        .filter_map(|(id, &e)| {
            let location = location_of(world, e)?;
            location
                .is_near(&point, threshold)
                .then(|| (id as MerchantId, location.distance_squared(&point)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Cargo on board or pickups still owed.
pub(crate) fn has_work(world: &World, orders: &OrderBook, entity: Entity, drone: DroneId) -> bool {
    let carrying = world
        .get::<&Cargo>(entity)
        .map(|c| !c.is_empty())
        .unwrap_or(false);
    carrying || orders.pending_pickups(drone).next().is_some()
}

pub(crate) fn mode_of(world: &World, entity: Entity) -> ExecutionMode {
    world
        .get::<&ExecutionMode>(entity)
        .map(|m| (*m).clone())
        .unwrap_or_default()
}

pub(crate) fn set_status(world: &mut World, entity: Entity, status: DroneStatus) {
    if let Ok(mut drone) = world.get::<&mut Drone>(entity) {
        drone.status = status;
    }
}
