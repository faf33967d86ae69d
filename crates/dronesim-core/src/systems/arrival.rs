//! Arrival system - what a drone does once it reaches its target

use std::collections::VecDeque;

use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::{DroneStatus, OrderStatus};
use dronesim_logic::{DroneId, MerchantId, OrderId};
use hecs::{Entity, World};

use crate::components::{Drone, ExecutionMode, Stop, StopKind};
use crate::config::SimConfig;
use crate::generation::FleetLayout;
use crate::metrics::EpisodeStats;
use crate::orders::OrderBook;
use crate::systems::{
    attempt_delivery, attempt_pickup, follow_itinerary, go_idle, has_work, legacy_next,
    location_of, merchant_at, mode_of, retarget_legacy, serve, set_course, set_status, target_of,
};

/// Outcome of visiting the location of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// Drone is not where this order needs it.
    Misplaced,
    Blocked,
    PickedUp,
    Delivered,
    /// Order no longer needs this drone.
    Gone,
}

/// Shared per-tick inputs for the arrival handlers.
struct Arrival<'a> {
    layout: &'a FleetLayout,
    config: &'a SimConfig,
    now: u64,
}

#[allow(clippy::too_many_arguments)]
impl Arrival<'_> {
    fn pickup(
        &self,
        world: &mut World,
        orders: &mut OrderBook,
        entity: Entity,
        drone_id: DroneId,
        order_id: OrderId,
        location: Vec2,
        stats: &mut EpisodeStats,
    ) -> bool {
        let merchant = merchant_at(world, self.layout, location, self.config.arrival_threshold);
        self.pickup_from(world, orders, entity, drone_id, order_id, merchant, stats)
    }

    fn pickup_from(
        &self,
        world: &mut World,
        orders: &mut OrderBook,
        entity: Entity,
        drone_id: DroneId,
        order_id: OrderId,
        merchant: Option<MerchantId>,
        stats: &mut EpisodeStats,
    ) -> bool {
        set_status(world, entity, DroneStatus::WaitingForPickup);
        attempt_pickup(world, orders, entity, drone_id, order_id, merchant, self.now, stats).is_ok()
    }

    fn deliver(
        &self,
        world: &mut World,
        orders: &mut OrderBook,
        entity: Entity,
        drone_id: DroneId,
        order_id: OrderId,
        stats: &mut EpisodeStats,
    ) -> bool {
        set_status(world, entity, DroneStatus::Delivering);
        let sla = self.config.sla();
        attempt_delivery(world, orders, entity, drone_id, order_id, &sla, self.now, stats).is_ok()
    }

    /// Perform whichever gated transition `order_id` needs at `location`.
    fn visit(
        &self,
        world: &mut World,
        orders: &mut OrderBook,
        entity: Entity,
        drone_id: DroneId,
        order_id: OrderId,
        location: Vec2,
        stats: &mut EpisodeStats,
    ) -> Visit {
        let Some(order) = orders.get(order_id) else {
            return Visit::Gone;
        };
        let threshold = self.config.arrival_threshold;
        let (status, merchant_location, customer_location) =
            (order.status, order.merchant_location, order.customer_location);

        match status {
            OrderStatus::Assigned if !location.is_near(&merchant_location, threshold) => {
                Visit::Misplaced
            }
            OrderStatus::Assigned => {
                if self.pickup(world, orders, entity, drone_id, order_id, location, stats) {
                    Visit::PickedUp
                } else {
                    Visit::Blocked
                }
            }
            OrderStatus::PickedUp if !location.is_near(&customer_location, threshold) => {
                Visit::Misplaced
            }
            OrderStatus::PickedUp => {
                if self.deliver(world, orders, entity, drone_id, order_id, stats) {
                    Visit::Delivered
                } else {
                    Visit::Blocked
                }
            }
            _ => Visit::Gone,
        }
    }

    fn at_stop(
        &self,
        world: &mut World,
        orders: &mut OrderBook,
        entity: Entity,
        drone_id: DroneId,
        mut stops: VecDeque<Stop>,
        location: Vec2,
        stats: &mut EpisodeStats,
    ) {
        if let Some(stop) = stops.pop_front() {
            // A refused stop is skipped; the gate has already recorded why.
            match stop.kind {
                StopKind::Pickup => {
                    // The stop's label must name the merchant actually here.
                    let here = merchant_at(world, self.layout, location, self.config.arrival_threshold);
                    let merchant = stop.merchant_id.filter(|&m| here == Some(m));
                    self.pickup_from(world, orders, entity, drone_id, stop.order_id, merchant, stats);
                }
                StopKind::Delivery => {
                    self.deliver(world, orders, entity, drone_id, stop.order_id, stats);
                }
            }
        }
        follow_itinerary(world, entity, stops);
    }

    fn serving(
        &self,
        world: &mut World,
        orders: &mut OrderBook,
        entity: Entity,
        drone_id: DroneId,
        order_id: OrderId,
        location: Vec2,
        stats: &mut EpisodeStats,
    ) {
        match self.visit(world, orders, entity, drone_id, order_id, location, stats) {
            Visit::Misplaced | Visit::PickedUp => {
                if !serve(world, orders, entity, order_id) {
                    go_idle(world, entity);
                }
            }
            Visit::Delivered | Visit::Gone => go_idle(world, entity),
            Visit::Blocked => {}
        }
    }

    fn legacy(
        &self,
        world: &mut World,
        orders: &mut OrderBook,
        entity: Entity,
        drone_id: DroneId,
        location: Vec2,
        stats: &mut EpisodeStats,
    ) {
        let Some(order_id) = legacy_next(world, orders, entity, drone_id) else {
            go_idle(world, entity);
            return;
        };
        if self.visit(world, orders, entity, drone_id, order_id, location, stats) != Visit::Blocked {
            retarget_legacy(world, orders, entity, drone_id);
        }
    }

    fn unassigned(
        &self,
        world: &mut World,
        orders: &OrderBook,
        entity: Entity,
        drone_id: DroneId,
        stats: &mut EpisodeStats,
    ) {
        let status = world.get::<&Drone>(entity).map(|d| d.status);
        if status.is_ok_and(|s| s == DroneStatus::ReturningToBase) {
            set_course(world, entity, DroneStatus::Charging, None);
            return;
        }
        go_idle(world, entity);
        if has_work(world, orders, entity, drone_id) && !self.config.strategy.allows_legacy() {
            stats.legacy_blocked += 1;
        }
    }
}

/// Handle every drone that has reached its target this tick.
///
/// Dispatches on the drone's execution mode; a drone is never handled by
/// more than one mode per arrival.
pub fn arrival_system(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    config: &SimConfig,
    now: u64,
    stats: &mut EpisodeStats,
) {
    let ctx = Arrival { layout, config, now };

    for (drone_id, entity) in layout.drone_ids() {
        let (Some(location), Some(target)) = (location_of(world, entity), target_of(world, entity))
        else {
            continue;
        };
        if !location.is_near(&target, config.arrival_threshold) {
            continue;
        }

        match mode_of(world, entity) {
            ExecutionMode::Itinerary(stops) => {
                ctx.at_stop(world, orders, entity, drone_id, stops, location, stats)
            }
            ExecutionMode::Serving(order_id) => {
                ctx.serving(world, orders, entity, drone_id, order_id, location, stats)
            }
            ExecutionMode::LegacyBatch => ctx.legacy(world, orders, entity, drone_id, location, stats),
            ExecutionMode::Unassigned => ctx.unassigned(world, orders, entity, drone_id, stats),
        }
    }
}
