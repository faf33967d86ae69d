//! Invariant enforcement - cargo/status agreement and state audits

use std::collections::BTreeMap;

use dronesim_logic::lifecycle::OrderStatus;
use dronesim_logic::{DroneId, OrderId};
use hecs::World;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::components::{Cargo, Drone, ExecutionMode};
use crate::error::ConsistencyError;
use crate::generation::FleetLayout;
use crate::metrics::{EpisodeStats, RepairReport};
use crate::orders::OrderBook;
use crate::systems::{legacy_next, mode_of, target_of};

/// Detect damage that repairs cannot resolve. Runs before any repair so a
/// repair never masks it.
pub fn detect_fatal(world: &World, orders: &OrderBook, layout: &FleetLayout) -> Result<(), ConsistencyError> {
    let mut carriers: BTreeMap<OrderId, Vec<DroneId>> = BTreeMap::new();
    for (drone_id, entity) in layout.drone_ids() {
        if let Ok(cargo) = world.get::<&Cargo>(entity) {
            for &id in &cargo.orders {
                carriers.entry(id).or_default().push(drone_id);
            }
        }
    }
    if let Some((&order, drones)) = carriers.iter().find(|(_, d)| d.len() > 1) {
        let err = ConsistencyError::MultipleCarriers {
            order,
            drones: drones.clone(),
        };
        error!("{}", err);
        return Err(err);
    }

    for order in orders.iter() {
        if let Some(drone) = order.assigned_drone {
            if layout.drone(drone).is_none() {
                let err = ConsistencyError::UnknownAssignee {
                    order: order.id,
                    drone,
                };
                error!("{}", err);
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Bring cargo back in line with order status.
///
/// A `PickedUp` order is added to its drone's cargo if missing; anything in
/// cargo that is not a `PickedUp` order owned by that drone is removed.
/// Every repair is logged and counted.
pub fn enforce_invariants(
    world: &mut World,
    orders: &OrderBook,
    layout: &FleetLayout,
    stats: &mut EpisodeStats,
) -> RepairReport {
    let mut report = RepairReport::default();

    for (drone_id, entity) in layout.drone_ids() {
        let Ok(mut cargo) = world.get::<&mut Cargo>(entity) else {
            continue;
        };
        let stray: Vec<OrderId> = cargo
            .orders
            .iter()
            .copied()
            .filter(|&id| {
                !orders
                    .get(id)
                    .is_some_and(|o| o.status == OrderStatus::PickedUp && o.is_owned_by(drone_id))
            })
            .collect();
        for id in stray {
            warn!("removing order {} from drone {} cargo: not picked up by it", id, drone_id);
            cargo.orders.remove(&id);
            report.removed_from_cargo += 1;
        }
    }

    for order in orders.iter().filter(|o| o.status == OrderStatus::PickedUp) {
        let Some(drone_id) = order.assigned_drone else {
            continue;
        };
        let Some(entity) = layout.drone(drone_id) else {
            continue;
        };
        if let Ok(mut cargo) = world.get::<&mut Cargo>(entity) {
            if cargo.orders.insert(order.id) {
                warn!("restoring picked-up order {} to drone {} cargo", order.id, drone_id);
                report.added_to_cargo += 1;
            }
        }
    }

    stats.repairs.added_to_cargo += report.added_to_cargo;
    stats.repairs.removed_from_cargo += report.removed_from_cargo;
    report
}

/// Which subsystem an audit finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCategory {
    Itinerary,
    TaskSelection,
    Legacy,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub category: IssueCategory,
    pub drone: Option<DroneId>,
    pub order: Option<OrderId>,
    pub detail: String,
}

impl ConsistencyIssue {
    fn new(category: IssueCategory, drone: Option<DroneId>, order: Option<OrderId>, detail: impl Into<String>) -> Self {
        Self {
            category,
            drone,
            order,
            detail: detail.into(),
        }
    }
}

/// Read-only audit of the current state. Empty at every tick boundary
/// unless something upstream is broken.
pub fn consistency_issues(world: &World, orders: &OrderBook, layout: &FleetLayout) -> Vec<ConsistencyIssue> {
    use IssueCategory::*;
    let mut issues = Vec::new();

    for (drone_id, entity) in layout.drone_ids() {
        let d = Some(drone_id);
        let held = |id: OrderId| orders.get(id).is_some_and(|o| !o.status.is_terminal() && o.is_owned_by(drone_id));

        match mode_of(world, entity) {
            ExecutionMode::Serving(id) => {
                let live = orders.get(id).is_some_and(|o| {
                    o.is_owned_by(drone_id) && matches!(o.status, OrderStatus::Assigned | OrderStatus::PickedUp)
                });
                if !live {
                    issues.push(ConsistencyIssue::new(TaskSelection, d, Some(id), "serving an order it does not hold"));
                }
            }
            ExecutionMode::Itinerary(stops) => {
                for stop in stops.iter().filter(|s| !held(s.order_id)) {
                    issues.push(ConsistencyIssue::new(Itinerary, d, Some(stop.order_id), "stop for an order it does not hold"));
                }
            }
            ExecutionMode::LegacyBatch => {
                if legacy_next(world, orders, entity, drone_id).is_none() {
                    issues.push(ConsistencyIssue::new(Legacy, d, None, "legacy mode with no work"));
                }
            }
            ExecutionMode::Unassigned => {}
        }

        if let Ok(cargo) = world.get::<&Cargo>(entity) {
            for &id in &cargo.orders {
                let ok = orders
                    .get(id)
                    .is_some_and(|o| o.status == OrderStatus::PickedUp && o.is_owned_by(drone_id));
                if !ok {
                    issues.push(ConsistencyIssue::new(Other, d, Some(id), "cargo holds an order not picked up by this drone"));
                }
            }
        }

        let flying = world.get::<&Drone>(entity).is_ok_and(|dr| dr.status.is_flying());
        if flying && target_of(world, entity).is_none() {
            issues.push(ConsistencyIssue::new(Other, d, None, "flying without a target"));
        }
    }

    for order in orders.active() {
        match (order.status, order.assigned_drone) {
            (OrderStatus::Assigned | OrderStatus::PickedUp, None) => {
                issues.push(ConsistencyIssue::new(Other, None, Some(order.id), "committed order has no drone"));
            }
            (OrderStatus::Accepted | OrderStatus::Ready, Some(drone)) => {
                issues.push(ConsistencyIssue::new(Other, Some(drone), Some(order.id), "uncommitted order names a drone"));
            }
            (OrderStatus::PickedUp, Some(drone)) => {
                let carried = layout
                    .drone(drone)
                    .and_then(|e| world.get::<&Cargo>(e).ok().map(|c| c.contains(order.id)))
                    .unwrap_or(false);
                if !carried {
                    issues.push(ConsistencyIssue::new(Other, Some(drone), Some(order.id), "picked-up order missing from cargo"));
                }
            }
            _ => {}
        }
    }

    issues
}
