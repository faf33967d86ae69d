//! Deadline system - cancels uncollected orders past their deadline

use std::collections::VecDeque;

use dronesim_logic::deadline::SlaPolicy;
use dronesim_logic::lifecycle::OrderStatus;
use dronesim_logic::OrderId;
use hecs::World;
use log::info;

use crate::components::{Cargo, ExecutionMode};
use crate::generation::FleetLayout;
use crate::metrics::EpisodeStats;
use crate::orders::OrderBook;
use crate::systems::{follow_itinerary, mode_of};

/// Cancel `Ready` and `Assigned` orders whose deadline has been reached.
///
/// Picked-up orders are never cancelled here. Cancelled orders are pulled
/// from any cargo they were wrongly left in and from every itinerary.
pub fn deadline_system(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    sla: &SlaPolicy,
    now: u64,
    stats: &mut EpisodeStats,
) -> Vec<OrderId> {
    let expired: Vec<OrderId> = orders
        .active()
        .filter(|o| o.status.is_cancellable_by_deadline())
        .filter(|o| o.ready_step.is_some_and(|ready| sla.is_expired(ready, now)))
        .map(|o| o.id)
        .collect();

    for &id in &expired {
        if !orders.transition(id, OrderStatus::Cancelled, now) {
            continue;
        }
        stats.orders_cancelled += 1;
        info!("order {} cancelled at step {} (deadline reached)", id, now);
        for (_, cargo) in world.query_mut::<&mut Cargo>() {
            cargo.orders.remove(&id);
        }
    }

    if !expired.is_empty() {
        prune_itineraries(world, orders, layout);
    }
    expired
}

/// Drop itinerary stops whose order is gone, terminal or no longer held by
/// the drone, retargeting when the front stop changes.
pub fn prune_itineraries(world: &mut World, orders: &OrderBook, layout: &FleetLayout) {
    for (drone_id, entity) in layout.drone_ids() {
        let ExecutionMode::Itinerary(stops) = mode_of(world, entity) else {
            continue;
        };
        let before = stops.len();
        let kept: VecDeque<_> = stops
            .into_iter()
            .filter(|s| {
                orders
                    .get(s.order_id)
                    .is_some_and(|o| !o.status.is_terminal() && o.is_owned_by(drone_id))
            })
            .collect();
        if kept.len() != before {
            follow_itinerary(world, entity, kept);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Drone, Movement, Position, Stop};
    use crate::config::ExecutionStrategy;
    use crate::systems::assign_batch;
    use dronesim_logic::geometry::Vec2;

    fn setup() -> (World, OrderBook, FleetLayout) {
        let mut world = World::new();
        let e = world.spawn((
            Drone::new(0, 10, 1.0, Vec2::ZERO),
            Position::new(Vec2::ZERO),
            Cargo::default(),
            ExecutionMode::Unassigned,
        ));
        let layout = FleetLayout {
            drones: vec![e],
            merchants: Vec::new(),
            bases: vec![Vec2::ZERO],
        };
        (world, OrderBook::new(), layout)
    }

    fn ready(orders: &mut OrderBook, at: u64, x: f32) -> OrderId {
        let id = orders.create(0, Vec2::new(x, 0.0), Vec2::new(x, 5.0), 0, at);
        orders.transition(id, OrderStatus::Ready, at);
        id
    }

    #[test]
    fn test_cancel_at_deadline_step() {
        let (mut world, mut orders, layout) = setup();
        let mut stats = EpisodeStats::default();
        let sla = SlaPolicy::new(6, 8);
        let id = ready(&mut orders, 0, 3.0);

        assert!(deadline_system(&mut world, &mut orders, &layout, &sla, 47, &mut stats).is_empty());
        assert_eq!(
            deadline_system(&mut world, &mut orders, &layout, &sla, 48, &mut stats),
            vec![id]
        );
        assert_eq!(orders.get(id).unwrap().status, OrderStatus::Cancelled);
        assert_eq!(stats.orders_cancelled, 1);
    }

    #[test]
    fn test_picked_up_never_cancelled() {
        let (mut world, mut orders, layout) = setup();
        let mut stats = EpisodeStats::default();
        let sla = SlaPolicy::new(6, 8);
        let id = ready(&mut orders, 0, 3.0);
        orders.transition(id, OrderStatus::Assigned, 1);
        orders.get_mut(id).unwrap().assigned_drone = Some(0);
        orders.transition(id, OrderStatus::PickedUp, 2);

        deadline_system(&mut world, &mut orders, &layout, &sla, 500, &mut stats);
        assert_eq!(orders.get(id).unwrap().status, OrderStatus::PickedUp);
    }

    #[test]
    fn test_cancel_prunes_itinerary() {
        let (mut world, mut orders, layout) = setup();
        let mut stats = EpisodeStats::default();
        let sla = SlaPolicy::new(6, 8);
        let early = ready(&mut orders, 0, 3.0);
        let late = ready(&mut orders, 20, 6.0);
        assign_batch(
            &mut world,
            &mut orders,
            &layout,
            ExecutionStrategy::Itinerary,
            0,
            &[early, late],
            false,
            21,
        )
        .unwrap();

        deadline_system(&mut world, &mut orders, &layout, &sla, 48, &mut stats);

        let e = layout.drones[0];
        let ExecutionMode::Itinerary(stops) = mode_of(&world, e) else {
            panic!("expected itinerary");
        };
        assert!(stops.iter().all(|s: &Stop| s.order_id == late));
        assert_eq!(stops.len(), 2);
        assert_eq!(world.get::<&Movement>(e).unwrap().destination, Vec2::new(6.0, 0.0));
    }
}
