//! Dispatch - assignment commits and pointing drones at their work

use std::collections::{BTreeSet, VecDeque};

use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::{DroneStatus, OrderStatus};
use dronesim_logic::{DroneId, OrderId};
use hecs::{Entity, World};
use log::debug;

use crate::components::{Cargo, Drone, ExecutionMode, Stop, StopKind};
use crate::config::ExecutionStrategy;
use crate::error::{InvalidAssignment, ItineraryError};
use crate::generation::FleetLayout;
use crate::orders::{Order, OrderBook};
use crate::systems::{go_idle, mode_of, set_course, set_mode};

/// Where a drone should fly for `order`, if it still needs a visit.
fn course_for(order: &Order) -> Option<(DroneStatus, Vec2)> {
    match order.status {
        OrderStatus::Assigned => Some((DroneStatus::FlyingToMerchant, order.merchant_location)),
        OrderStatus::PickedUp => Some((DroneStatus::FlyingToCustomer, order.customer_location)),
        _ => None,
    }
}

/// Commit the drone to serving `order_id`. Returns false, leaving the
/// drone untouched, if the order needs no visit.
pub(crate) fn serve(world: &mut World, orders: &OrderBook, entity: Entity, order_id: OrderId) -> bool {
    let Some((status, target)) = orders.get(order_id).and_then(course_for) else {
        return false;
    };
    set_mode(world, entity, ExecutionMode::Serving(order_id));
    set_course(world, entity, status, Some(target));
    true
}

/// Earliest-ready work for a drone: cargo first, then owned pickups.
/// Ties break on order id.
pub fn legacy_next(world: &World, orders: &OrderBook, entity: Entity, drone_id: DroneId) -> Option<OrderId> {
    let key = |o: &&Order| (o.ready_step.unwrap_or(0), o.id);

    let carried = world.get::<&Cargo>(entity).ok().and_then(|cargo| {
        cargo
            .orders
            .iter()
            .filter_map(|&id| orders.get(id))
            .filter(|o| o.status == OrderStatus::PickedUp && o.is_owned_by(drone_id))
            .min_by_key(key)
            .map(|o| o.id)
    });

    carried.or_else(|| orders.pending_pickups(drone_id).min_by_key(key).map(|o| o.id))
}

/// Point a legacy-mode drone at its next order, or park it when none is left.
pub(crate) fn retarget_legacy(world: &mut World, orders: &OrderBook, entity: Entity, drone_id: DroneId) {
    match legacy_next(world, orders, entity, drone_id).and_then(|id| orders.get(id)).and_then(course_for) {
        Some((status, target)) => {
            set_mode(world, entity, ExecutionMode::LegacyBatch);
            set_course(world, entity, status, Some(target));
        }
        None => go_idle(world, entity),
    }
}

/// Point an itinerary drone at its front stop.
pub(crate) fn follow_itinerary(world: &mut World, entity: Entity, stops: VecDeque<Stop>) {
    let front = stops.front().map(|s| {
        let status = match s.kind {
            StopKind::Pickup => DroneStatus::FlyingToMerchant,
            StopKind::Delivery => DroneStatus::FlyingToCustomer,
        };
        (status, s.location)
    });
    match front {
        Some((status, target)) => {
            set_mode(world, entity, ExecutionMode::Itinerary(stops));
            set_course(world, entity, status, Some(target));
        }
        None => go_idle(world, entity),
    }
}

/// Pickup stops for `order_ids` in order, then their deliveries.
fn batch_stops(orders: &OrderBook, order_ids: &[OrderId]) -> Vec<Stop> {
    let batch: Vec<&Order> = order_ids.iter().filter_map(|&id| orders.get(id)).collect();
    let pickups = batch
        .iter()
        .map(|o| Stop::pickup(o.id, o.merchant_id, o.merchant_location));
    let deliveries = batch.iter().map(|o| Stop::delivery(o.id, o.customer_location));
    pickups.chain(deliveries).collect()
}

/// Validate and commit a batch of `Ready` orders to one drone.
///
/// All-or-nothing: on error no order or drone state has changed.
/// `allow_override` lifts the availability and pending-pickup guards but
/// never capacity.
#[allow(clippy::too_many_arguments)]
pub fn assign_batch(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    strategy: ExecutionStrategy,
    drone_id: DroneId,
    order_ids: &[OrderId],
    allow_override: bool,
    now: u64,
) -> Result<(), InvalidAssignment> {
    if order_ids.is_empty() {
        return Err(InvalidAssignment::EmptyBatch);
    }
    let entity = layout
        .drone(drone_id)
        .ok_or(InvalidAssignment::UnknownDrone(drone_id))?;

    let mut seen = BTreeSet::new();
    for &id in order_ids {
        if !seen.insert(id) {
            return Err(InvalidAssignment::DuplicateOrder(id));
        }
        let order = orders.get(id).ok_or(InvalidAssignment::UnknownOrder(id))?;
        if !order.is_open() {
            return Err(InvalidAssignment::AlreadyAssigned {
                order: id,
                status: order.status,
            });
        }
    }

    let (status, capacity) = world
        .get::<&Drone>(entity)
        .map(|d| (d.status, d.capacity))
        .map_err(|_| InvalidAssignment::UnknownDrone(drone_id))?;
    if !allow_override && !status.is_assignable() {
        return Err(InvalidAssignment::DroneUnavailable {
            drone: drone_id,
            status,
        });
    }
    if !allow_override {
        if let Some(pending) = orders.pending_pickups(drone_id).next() {
            return Err(InvalidAssignment::PendingPickup {
                drone: drone_id,
                pending: pending.id,
            });
        }
    }
    let carried = world.get::<&Cargo>(entity).map(|c| c.len()).unwrap_or(0);
    let load = carried + orders.pending_pickups(drone_id).count();
    if load + order_ids.len() > capacity {
        return Err(InvalidAssignment::CapacityExceeded {
            drone: drone_id,
            capacity,
        });
    }

    for &id in order_ids {
        orders.transition(id, OrderStatus::Assigned, now);
        if let Some(order) = orders.get_mut(id) {
            order.assigned_drone = Some(drone_id);
        }
    }
    debug!("assigned orders {:?} to drone {} at step {}", order_ids, drone_id, now);

    install_assignment(world, orders, entity, drone_id, strategy, order_ids);
    Ok(())
}

/// Single-order form of [`assign_batch`].
#[allow(clippy::too_many_arguments)]
pub fn assign_order(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    strategy: ExecutionStrategy,
    drone_id: DroneId,
    order_id: OrderId,
    allow_override: bool,
    now: u64,
) -> Result<(), InvalidAssignment> {
    assign_batch(
        world,
        orders,
        layout,
        strategy,
        drone_id,
        &[order_id],
        allow_override,
        now,
    )
}

/// Route freshly assigned orders into the drone's execution mode.
fn install_assignment(
    world: &mut World,
    orders: &OrderBook,
    entity: Entity,
    drone_id: DroneId,
    strategy: ExecutionStrategy,
    order_ids: &[OrderId],
) {
    let mode = mode_of(world, entity);
    if let ExecutionMode::Itinerary(current) = &mode {
        let mut stops = current.clone();
        stops.extend(batch_stops(orders, order_ids));
        follow_itinerary(world, entity, stops);
        return;
    }

    match strategy {
        ExecutionStrategy::Itinerary => {
            let mut stops: VecDeque<Stop> = batch_stops(orders, order_ids).into();
            if let Ok(cargo) = world.get::<&Cargo>(entity) {
                let owed = cargo
                    .orders
                    .iter()
                    .filter_map(|&id| orders.get(id))
                    .map(|o| Stop::delivery(o.id, o.customer_location))
                    .collect::<Vec<_>>();
                stops.extend(owed);
            }
            follow_itinerary(world, entity, stops);
        }
        ExecutionStrategy::LegacyOnly => retarget_legacy(world, orders, entity, drone_id),
        ExecutionStrategy::TaskSelection | ExecutionStrategy::Auto => {
            let delivering = mode.serving_order_id().is_some_and(|id| {
                orders
                    .get(id)
                    .is_some_and(|o| o.status == OrderStatus::PickedUp && o.is_owned_by(drone_id))
            });
            if !delivering {
                serve(world, orders, entity, order_ids[0]);
            }
        }
    }
}

/// Replace a drone's stop list with caller-ordered stops.
///
/// Every stop must reference an order held by the drone, and the stop kind
/// must still be achievable: pickups need `Assigned`, deliveries `Assigned`
/// or `PickedUp`. An empty list parks the drone.
pub fn set_itinerary(
    world: &mut World,
    orders: &OrderBook,
    layout: &FleetLayout,
    drone_id: DroneId,
    stops: Vec<Stop>,
) -> Result<(), ItineraryError> {
    let entity = layout
        .drone(drone_id)
        .ok_or(ItineraryError::UnknownDrone(drone_id))?;

    for stop in &stops {
        let order = orders
            .get(stop.order_id)
            .ok_or(ItineraryError::UnknownOrder(stop.order_id))?;
        if !order.is_owned_by(drone_id) {
            return Err(ItineraryError::NotOwned {
                order: order.id,
                drone: drone_id,
            });
        }
        let achievable = match stop.kind {
            StopKind::Pickup => order.status == OrderStatus::Assigned,
            StopKind::Delivery => {
                matches!(order.status, OrderStatus::Assigned | OrderStatus::PickedUp)
            }
        };
        if !achievable {
            return Err(ItineraryError::StopMismatch {
                order: order.id,
                status: order.status,
            });
        }
        if stop.kind == StopKind::Pickup && stop.merchant_id != Some(order.merchant_id) {
            return Err(ItineraryError::WrongMerchant {
                order: order.id,
                stop: stop.merchant_id,
                expected: order.merchant_id,
            });
        }
    }

    follow_itinerary(world, entity, stops.into());
    Ok(())
}
