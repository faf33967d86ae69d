//! Precondition gate - the only path to `PickedUp` and `Delivered`

use dronesim_logic::deadline::SlaPolicy;
use dronesim_logic::gate::{check_delivery, check_pickup, BlockReason, DeliveryFacts, PickupFacts};
use dronesim_logic::lifecycle::OrderStatus;
use dronesim_logic::{DroneId, MerchantId, OrderId};
use hecs::{Entity, World};
use log::debug;

use crate::components::Cargo;
use crate::error::{GatedTransition, PreconditionViolation};
use crate::metrics::EpisodeStats;
use crate::orders::OrderBook;

fn blocked(
    transition: GatedTransition,
    drone: DroneId,
    order: OrderId,
    reason: BlockReason,
) -> PreconditionViolation {
    let violation = PreconditionViolation {
        transition,
        drone,
        order,
        reason,
    };
    debug!("{}", violation);
    violation
}

/// Load `order_id` onto the drone if it is assigned to it, still
/// `Assigned`, and the drone stands at its merchant.
#[allow(clippy::too_many_arguments)]
pub fn attempt_pickup(
    world: &mut World,
    orders: &mut OrderBook,
    entity: Entity,
    drone_id: DroneId,
    order_id: OrderId,
    stop_merchant: Option<MerchantId>,
    now: u64,
    stats: &mut EpisodeStats,
) -> Result<(), PreconditionViolation> {
    let verdict = match orders.get(order_id) {
        Some(order) => check_pickup(&PickupFacts {
            drone: drone_id,
            order_status: order.status,
            assigned_drone: order.assigned_drone,
            order_merchant: order.merchant_id,
            stop_merchant,
        }),
        None => Err(BlockReason::WrongStatus),
    };

    if let Err(reason) = verdict {
        stats.pickups_blocked.record(reason);
        return Err(blocked(GatedTransition::Pickup, drone_id, order_id, reason));
    }

    orders.transition(order_id, OrderStatus::PickedUp, now);
    if let Ok(mut cargo) = world.get::<&mut Cargo>(entity) {
        cargo.orders.insert(order_id);
    }
    stats.pickups += 1;
    debug!("drone {} picked up order {} at step {}", drone_id, order_id, now);
    Ok(())
}

/// Hand `order_id` to its customer if the drone carries it.
#[allow(clippy::too_many_arguments)]
pub fn attempt_delivery(
    world: &mut World,
    orders: &mut OrderBook,
    entity: Entity,
    drone_id: DroneId,
    order_id: OrderId,
    sla: &SlaPolicy,
    now: u64,
    stats: &mut EpisodeStats,
) -> Result<(), PreconditionViolation> {
    let in_cargo = world
        .get::<&Cargo>(entity)
        .map(|c| c.contains(order_id))
        .unwrap_or(false);
    let verdict = match orders.get(order_id) {
        Some(order) => check_delivery(&DeliveryFacts {
            drone: drone_id,
            order_status: order.status,
            assigned_drone: order.assigned_drone,
            in_cargo,
        }),
        None => Err(BlockReason::WrongStatus),
    };

    if let Err(reason) = verdict {
        stats.deliveries_blocked.record(reason);
        return Err(blocked(GatedTransition::Delivery, drone_id, order_id, reason));
    }

    orders.transition(order_id, OrderStatus::Delivered, now);
    if let Ok(mut cargo) = world.get::<&mut Cargo>(entity) {
        cargo.orders.remove(&order_id);
    }
    stats.orders_delivered += 1;
    let ready_step = orders.get(order_id).and_then(|o| o.ready_step).unwrap_or(0);
    if sla.is_on_time(ready_step, now) {
        stats.on_time_deliveries += 1;
    }
    debug!("drone {} delivered order {} at step {}", drone_id, order_id, now);
    Ok(())
}
