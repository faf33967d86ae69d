//! Decision system - decision points and per-drone task selection

use std::collections::BTreeMap;

use dronesim_logic::lifecycle::{DroneStatus, OrderStatus};
use dronesim_logic::ranking::{valid_count, Candidate};
use dronesim_logic::selection::{decode_choice, fallback_index, speed_multiplier};
use dronesim_logic::{DroneId, OrderId};
use hecs::{Entity, World};
use log::debug;
use thiserror::Error;

use crate::components::{Cargo, Drone, ExecutionMode};
use crate::config::{ExecutionStrategy, SimConfig};
use crate::error::{InvalidAssignment, StaleReference};
use crate::generation::FleetLayout;
use crate::metrics::EpisodeStats;
use crate::orders::OrderBook;
use crate::policy::{Decision, Selection};
use crate::systems::{
    assign_order, build_candidates, go_idle, has_work, legacy_next, location_of, mode_of,
    retarget_legacy, serve, target_of,
};

#[derive(Debug, Error)]
enum ChoiceRejected {
    #[error(transparent)]
    Stale(#[from] StaleReference),
    #[error(transparent)]
    Assignment(#[from] InvalidAssignment),
}

/// Whether the drone should receive a fresh decision this tick.
///
/// Idle drones always are. A drone serving an order is one once that order
/// is gone or terminal, or once it is within the arrival threshold of its
/// target. A legacy drone has no serving order, so it is one whenever the
/// strategy takes decisions and otherwise only at its target. Itinerary
/// drones and drones charging or heading home never are.
pub fn is_decision_point(
    world: &World,
    orders: &OrderBook,
    entity: Entity,
    strategy: ExecutionStrategy,
    threshold: f32,
) -> bool {
    let Ok(status) = world.get::<&Drone>(entity).map(|d| d.status) else {
        return false;
    };
    if status == DroneStatus::Idle {
        return true;
    }
    if !status.is_assignable() {
        return false;
    }

    let near_target = || match (location_of(world, entity), target_of(world, entity)) {
        (Some(location), Some(target)) => location.is_near(&target, threshold),
        _ => false,
    };
    match mode_of(world, entity) {
        ExecutionMode::Itinerary(_) => false,
        ExecutionMode::Serving(order_id) => {
            let live = orders
                .get(order_id)
                .is_some_and(|o| !o.status.is_terminal());
            !live || (status.is_task_bound() && near_target())
        }
        ExecutionMode::LegacyBatch => strategy.accepts_decisions() || near_target(),
        ExecutionMode::Unassigned => true,
    }
}

/// Release task-selection commitments whose order is gone, terminal or
/// no longer held by the drone, and re-resolve legacy targets.
pub fn drop_stale_commitments(
    world: &mut World,
    orders: &OrderBook,
    layout: &FleetLayout,
    stats: &mut EpisodeStats,
) {
    for (drone_id, entity) in layout.drone_ids() {
        match mode_of(world, entity) {
            ExecutionMode::Serving(order_id) => {
                let live = orders.get(order_id).is_some_and(|o| {
                    o.is_owned_by(drone_id)
                        && matches!(o.status, OrderStatus::Assigned | OrderStatus::PickedUp)
                });
                if !live {
                    debug!("drone {} dropping stale commitment to order {}", drone_id, order_id);
                    stats.stale_commitments_dropped += 1;
                    go_idle(world, entity);
                }
            }
            ExecutionMode::LegacyBatch => {
                if legacy_next(world, orders, entity, drone_id).is_none() {
                    go_idle(world, entity);
                }
            }
            ExecutionMode::Unassigned | ExecutionMode::Itinerary(_) => {}
        }
    }
}

/// Apply a selected order: serve owned work, or assign-then-serve a fresh
/// `Ready` order. The order's current state is re-checked here.
#[allow(clippy::too_many_arguments)]
fn commit_choice(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    config: &SimConfig,
    entity: Entity,
    drone_id: DroneId,
    order_id: OrderId,
    now: u64,
) -> Result<(), ChoiceRejected> {
    let order = orders.get(order_id).ok_or(StaleReference::Order(order_id))?;
    let (status, owned, open) = (order.status, order.is_owned_by(drone_id), order.is_open());

    match status {
        OrderStatus::Assigned | OrderStatus::PickedUp if owned => {
            let carried = world
                .get::<&Cargo>(entity)
                .map(|c| c.contains(order_id))
                .unwrap_or(false);
            if status == OrderStatus::PickedUp && !carried {
                return Err(StaleReference::NotOwned {
                    order: order_id,
                    drone: drone_id,
                }
                .into());
            }
        }
        OrderStatus::Ready if open => {
            assign_order(
                world,
                orders,
                layout,
                config.strategy,
                drone_id,
                order_id,
                false,
                now,
            )?;
        }
        s if s.is_terminal() => return Err(StaleReference::Order(order_id).into()),
        _ => {
            return Err(StaleReference::NotOwned {
                order: order_id,
                drone: drone_id,
            }
            .into())
        }
    }

    serve(world, orders, entity, order_id);
    Ok(())
}

fn engage_legacy(
    world: &mut World,
    orders: &OrderBook,
    entity: Entity,
    drone_id: DroneId,
    stats: &mut EpisodeStats,
) {
    debug!("drone {} falling back to legacy resolution", drone_id);
    stats.legacy_engaged += 1;
    retarget_legacy(world, orders, entity, drone_id);
}

/// Replace a rejected selection using the configured fallback policy over
/// the drone's current candidates.
#[allow(clippy::too_many_arguments)]
fn apply_fallback(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    config: &SimConfig,
    entity: Entity,
    drone_id: DroneId,
    now: u64,
    stats: &mut EpisodeStats,
) {
    let fresh = build_candidates(world, orders, layout, drone_id, config.num_candidates);
    let chosen = {
        let cargo = world.get::<&Cargo>(entity).ok();
        fallback_index(config.fallback, &fresh, |id| {
            cargo.as_ref().is_some_and(|c| c.contains(id))
        })
        .and_then(|i| fresh[i].order_id())
    };

    if let Some(order_id) = chosen {
        if commit_choice(world, orders, layout, config, entity, drone_id, order_id, now).is_ok() {
            stats.fallbacks_used += 1;
        }
    }
}

/// Apply speed settings and selections to drones at a decision point.
///
/// Selections index the candidate lists published at the end of the
/// previous tick (`board`). Returns the number of decision points.
#[allow(clippy::too_many_arguments)]
pub fn apply_decisions(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    config: &SimConfig,
    board: &[Vec<Candidate>],
    decisions: &[Decision],
    now: u64,
    stats: &mut EpisodeStats,
) -> usize {
    let by_drone: BTreeMap<DroneId, &Decision> = decisions.iter().map(|d| (d.drone, d)).collect();
    let strategy = config.strategy;
    let mut points = 0;

    for (drone_id, entity) in layout.drone_ids() {
        let decision = by_drone.get(&drone_id).copied();

        if let Some(raw) = decision.and_then(|d| d.speed) {
            if let Ok(mut drone) = world.get::<&mut Drone>(entity) {
                drone.speed_multiplier = speed_multiplier(raw);
            }
        }

        if !is_decision_point(world, orders, entity, strategy, config.arrival_threshold) {
            continue;
        }
        points += 1;

        let mode = mode_of(world, entity);
        if mode.is_itinerary() {
            continue;
        }
        let idle_with_work =
            mode == ExecutionMode::Unassigned && has_work(world, orders, entity, drone_id);

        let selection = match decision.and_then(|d| d.selection) {
            Some(selection) if strategy.accepts_decisions() => selection,
            _ => {
                if strategy.allows_legacy() && idle_with_work {
                    engage_legacy(world, orders, entity, drone_id, stats);
                }
                continue;
            }
        };

        let published = board
            .get(drone_id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let slot = match selection {
            Selection::Slot(i) => i,
            Selection::Continuous(raw) => decode_choice(raw, config.num_candidates),
        };

        match published.get(slot).and_then(Candidate::order_id) {
            Some(order_id) => {
                match commit_choice(world, orders, layout, config, entity, drone_id, order_id, now) {
                    Ok(()) => {
                        stats.decisions_applied += 1;
                        continue;
                    }
                    Err(reason) => debug!("drone {} selection rejected: {}", drone_id, reason),
                }
            }
            None if valid_count(published) == 0 => continue,
            None => debug!("drone {} selected empty slot {}", drone_id, slot),
        }

        stats.decisions_invalid += 1;
        apply_fallback(world, orders, layout, config, entity, drone_id, now, stats);
    }

    stats.decision_points += points as u64;
    points
}
