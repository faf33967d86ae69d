//! End-to-end delivery scenarios on small fixed layouts.
//!
//! Every test drives the public engine API only: explicit layouts, no
//! stochastic demand, orders injected with `spawn_order`.

use dronesim_core::config::{ExecutionStrategy, LayoutConfig, MerchantSite, SimConfig};
use dronesim_core::error::{InvalidAssignment, ItineraryError};
use dronesim_core::policy::{AssignmentRequest, Decision, Selection, TickInput};
use dronesim_core::prelude::*;
use dronesim_logic::deadline::OnTimeRule;

// ── Helpers ────────────────────────────────────────────────────────────

fn site(x: f32, y: f32) -> MerchantSite {
    MerchantSite {
        location: Vec2::new(x, y),
        efficiency: 1.0,
    }
}

/// One drone at the origin, one base at the origin, the given merchants.
fn fixed_config(merchants: Vec<MerchantSite>, num_drones: usize) -> SimConfig {
    SimConfig {
        order_rate: 0.0,
        num_drones,
        layout: Some(LayoutConfig {
            merchants,
            bases: vec![Vec2::ZERO],
            drone_starts: vec![Vec2::ZERO; num_drones],
        }),
        ..Default::default()
    }
}

fn engine(config: SimConfig) -> DeliveryEngine {
    DeliveryEngine::new(config).expect("valid config")
}

fn idle_step(engine: &mut DeliveryEngine) -> StepOutcome {
    engine.step(TickInput::default()).expect("consistent tick")
}

/// Step until `now` is the next step to simulate.
fn run_until(engine: &mut DeliveryEngine, now: u64) {
    while engine.time() < now {
        idle_step(engine);
    }
}

fn status_of(engine: &DeliveryEngine, order: OrderId) -> OrderStatus {
    engine.order(order).expect("order retained").status
}

// ── Scenario A: on-time delivery ───────────────────────────────────────

#[test]
fn assigned_order_is_picked_up_and_delivered_on_time() {
    let mut engine = engine(fixed_config(vec![site(9.0, 0.0)], 1));
    let order = engine.spawn_order(0, Vec2::new(9.0, 10.0), 0).unwrap();
    assert_eq!(status_of(&engine, order), OrderStatus::Ready);

    run_until(&mut engine, 2);
    let outcome = engine
        .step(TickInput {
            assignments: vec![AssignmentRequest::single(0, order)],
            decisions: Vec::new(),
        })
        .unwrap();
    assert_eq!(outcome.info.assignments[0].result, Ok(()));
    assert_eq!(status_of(&engine, order), OrderStatus::Assigned);

    // Nine more unit steps to the merchant: the pickup lands on step 10.
    run_until(&mut engine, 10);
    assert_eq!(status_of(&engine, order), OrderStatus::Assigned);
    idle_step(&mut engine);
    assert_eq!(status_of(&engine, order), OrderStatus::PickedUp);
    assert_eq!(engine.drone_snapshot(0).unwrap().cargo, vec![order]);

    run_until(&mut engine, 20);
    assert_eq!(status_of(&engine, order), OrderStatus::PickedUp);
    let outcome = idle_step(&mut engine);
    assert_eq!(outcome.info.step, 20);

    let delivered = engine.order(order).unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert_eq!(delivered.delivery_time, Some(20));
    assert_eq!(delivered.assigned_drone, None);
    assert_eq!(outcome.info.stats.orders_delivered, 1);
    assert_eq!(outcome.info.stats.on_time_deliveries, 1);

    let drone = &outcome.snapshot.drones[0];
    assert!(drone.cargo.is_empty());
    assert_eq!(drone.status, DroneStatus::Idle);
    assert_eq!(drone.mode, ModeKind::Unassigned);
}

#[test]
fn strict_sla_rule_counts_same_delivery_as_late() {
    let config = SimConfig {
        on_time_rule: OnTimeRule::WithinSla,
        ..fixed_config(vec![site(9.0, 0.0)], 1)
    };
    let mut engine = engine(config);
    let order = engine.spawn_order(0, Vec2::new(9.0, 10.0), 0).unwrap();
    run_until(&mut engine, 2);
    engine.assign(0, order, false).unwrap();
    run_until(&mut engine, 21);

    assert_eq!(status_of(&engine, order), OrderStatus::Delivered);
    assert_eq!(engine.stats().orders_delivered, 1);
    assert_eq!(engine.stats().on_time_deliveries, 0);
}

// ── Scenario B: cancellation at the deadline ───────────────────────────

#[test]
fn uncollected_order_cancelled_exactly_at_deadline() {
    // Merchant sixty units out: the drone cannot arrive before step 48.
    let mut engine = engine(fixed_config(vec![site(60.0, 0.0)], 1));
    let order = engine.spawn_order(0, Vec2::new(60.0, 10.0), 0).unwrap();
    run_until(&mut engine, 2);
    engine.assign(0, order, false).unwrap();

    run_until(&mut engine, 48);
    assert_eq!(status_of(&engine, order), OrderStatus::Assigned);
    assert_eq!(engine.order(order).unwrap().assigned_drone, Some(0));

    let outcome = idle_step(&mut engine);
    assert_eq!(outcome.info.cancelled, vec![order]);
    let cancelled = engine.order(order).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.assigned_drone, None);
    assert_eq!(engine.stats().orders_cancelled, 1);

    // The drone is released in the same tick.
    let drone = &outcome.snapshot.drones[0];
    assert_eq!(drone.mode, ModeKind::Unassigned);
    assert_eq!(drone.status, DroneStatus::Idle);
    assert!(drone.pending_pickups.is_empty());
    assert_eq!(engine.stats().stale_commitments_dropped, 1);
}

#[test]
fn unassigned_ready_order_also_times_out() {
    let mut engine = engine(fixed_config(vec![site(9.0, 0.0)], 1));
    let order = engine.spawn_order(0, Vec2::new(1.0, 1.0), 0).unwrap();
    run_until(&mut engine, 49);
    assert_eq!(status_of(&engine, order), OrderStatus::Cancelled);
}

#[test]
fn deadline_counts_from_readiness_not_creation() {
    let mut engine = engine(fixed_config(vec![site(9.0, 0.0)], 1));
    let order = engine.spawn_order(0, Vec2::new(1.0, 1.0), 5).unwrap();
    assert_eq!(status_of(&engine, order), OrderStatus::Accepted);

    run_until(&mut engine, 49);
    assert_eq!(status_of(&engine, order), OrderStatus::Ready);
    let ready_step = engine.order(order).unwrap().ready_step.unwrap();
    assert!(ready_step >= 5);

    run_until(&mut engine, ready_step + 48 + 1);
    assert_eq!(status_of(&engine, order), OrderStatus::Cancelled);
}

// ── Scenario C: ownership is enforced ──────────────────────────────────

#[test]
fn other_drone_cannot_plan_a_pickup_it_does_not_own() {
    let mut engine = engine(fixed_config(vec![site(9.0, 0.0)], 2));
    let order = engine.spawn_order(0, Vec2::new(9.0, 10.0), 0).unwrap();
    engine.assign(0, order, false).unwrap();

    let stop = Stop::pickup(order, 0, Vec2::new(9.0, 0.0));
    assert_eq!(
        engine.set_itinerary(1, vec![stop]),
        Err(ItineraryError::NotOwned { order, drone: 1 })
    );
    let record = engine.order(order).unwrap();
    assert_eq!(record.status, OrderStatus::Assigned);
    assert_eq!(record.assigned_drone, Some(0));
}

#[test]
fn second_assignment_of_same_order_rejected() {
    let mut engine = engine(fixed_config(vec![site(9.0, 0.0)], 2));
    let order = engine.spawn_order(0, Vec2::new(9.0, 10.0), 0).unwrap();
    engine.assign(0, order, false).unwrap();

    let err = engine.assign(1, order, false).unwrap_err();
    assert!(matches!(err, InvalidAssignment::AlreadyAssigned { .. }));
    assert_eq!(engine.order(order).unwrap().assigned_drone, Some(0));
    assert_eq!(engine.stats().assignments_rejected, 1);
}

// ── Scenario D: candidates after a delivery ────────────────────────────

#[test]
fn freed_drone_sees_ready_orders_by_merchant_distance() {
    // Customer of the first order sits at (9, 10); merchant 1 is four
    // units from there, merchant 2 nine.
    let merchants = vec![site(9.0, 0.0), site(9.0, 14.0), site(0.0, 10.0)];
    let mut engine = engine(fixed_config(merchants, 1));
    let first = engine.spawn_order(0, Vec2::new(9.0, 10.0), 0).unwrap();
    engine.assign(0, first, false).unwrap();

    let far = engine.spawn_order(2, Vec2::new(1.0, 1.0), 0).unwrap();
    let near = engine.spawn_order(1, Vec2::new(1.0, 1.0), 0).unwrap();

    run_until(&mut engine, 19);
    assert_eq!(status_of(&engine, first), OrderStatus::Delivered);

    let outcome = idle_step(&mut engine);
    let drone = &outcome.snapshot.drones[0];
    assert!(drone.decision_point);
    let ranked: Vec<OrderId> = drone.candidates.iter().filter_map(|c| c.order_id()).collect();
    assert_eq!(ranked, vec![near, far]);
    assert!(drone.candidates.iter().all(|c| match c {
        Candidate::Order {
            is_new_assignment, ..
        } => *is_new_assignment,
        Candidate::NoOp => true,
    }));
    assert_eq!(drone.candidates.len(), engine.config().num_candidates);
}

#[test]
fn decision_on_published_slot_commits_the_order() {
    let config = SimConfig {
        strategy: ExecutionStrategy::TaskSelection,
        ..fixed_config(vec![site(4.0, 0.0), site(0.0, 2.0)], 1)
    };
    let mut engine = engine(config);
    let far = engine.spawn_order(0, Vec2::new(4.0, 4.0), 0).unwrap();
    let near = engine.spawn_order(1, Vec2::new(2.0, 2.0), 0).unwrap();
    assert_eq!(engine.published_candidates(0)[0].order_id(), Some(near));

    let outcome = engine
        .step(TickInput {
            assignments: Vec::new(),
            decisions: vec![Decision {
                drone: 0,
                selection: Some(Selection::Slot(1)),
                speed: None,
            }],
        })
        .unwrap();
    assert_eq!(outcome.info.stats.decisions_applied, 1);
    assert_eq!(status_of(&engine, far), OrderStatus::Assigned);
    assert_eq!(status_of(&engine, near), OrderStatus::Ready);
    assert_eq!(outcome.snapshot.drones[0].serving_order_id, Some(far));
}

// ── Execution strategies ───────────────────────────────────────────────

#[test]
fn itinerary_batch_collects_then_delivers() {
    let config = SimConfig {
        strategy: ExecutionStrategy::Itinerary,
        ..fixed_config(vec![site(3.0, 0.0), site(6.0, 0.0)], 1)
    };
    let mut engine = engine(config);
    let a = engine.spawn_order(0, Vec2::new(6.0, 3.0), 0).unwrap();
    let b = engine.spawn_order(1, Vec2::new(3.0, 3.0), 0).unwrap();
    engine.assign_batch(0, &[a, b], false).unwrap();
    assert_eq!(engine.drone_snapshot(0).unwrap().mode, ModeKind::Itinerary);

    run_until(&mut engine, 30);
    assert_eq!(status_of(&engine, a), OrderStatus::Delivered);
    assert_eq!(status_of(&engine, b), OrderStatus::Delivered);
    assert_eq!(engine.stats().pickups, 2);
    assert_eq!(engine.drone_snapshot(0).unwrap().mode, ModeKind::Unassigned);
}

#[test]
fn legacy_only_serves_batch_without_decisions() {
    let config = SimConfig {
        strategy: ExecutionStrategy::LegacyOnly,
        ..fixed_config(vec![site(3.0, 0.0)], 1)
    };
    let mut engine = engine(config);
    let a = engine.spawn_order(0, Vec2::new(3.0, 4.0), 0).unwrap();
    let b = engine.spawn_order(0, Vec2::new(0.0, 4.0), 0).unwrap();
    engine.assign_batch(0, &[a, b], false).unwrap();

    run_until(&mut engine, 40);
    assert_eq!(status_of(&engine, a), OrderStatus::Delivered);
    assert_eq!(status_of(&engine, b), OrderStatus::Delivered);
    assert_eq!(engine.stats().deliveries_blocked.total(), 0);
}

#[test]
fn capacity_holds_even_with_override() {
    let config = SimConfig {
        drone_capacity: 1,
        ..fixed_config(vec![site(3.0, 0.0)], 1)
    };
    let mut engine = engine(config);
    let a = engine.spawn_order(0, Vec2::new(1.0, 1.0), 0).unwrap();
    let b = engine.spawn_order(0, Vec2::new(1.0, 1.0), 0).unwrap();
    engine.assign(0, a, false).unwrap();

    let err = engine.assign(0, b, true).unwrap_err();
    assert!(matches!(err, InvalidAssignment::CapacityExceeded { .. }));
    assert_eq!(status_of(&engine, b), OrderStatus::Ready);
}

#[test]
fn low_battery_idle_drone_returns_home_and_charges() {
    let config = SimConfig {
        energy_per_unit: 0.1,
        charge_rate: 0.5,
        ..fixed_config(vec![site(9.0, 0.0)], 1)
    };
    let mut engine = engine(config);
    let order = engine.spawn_order(0, Vec2::new(9.0, 0.0), 0).unwrap();
    engine.assign(0, order, false).unwrap();

    run_until(&mut engine, 40);
    assert_eq!(status_of(&engine, order), OrderStatus::Delivered);
    let stats = engine.stats();
    assert!(stats.charge_cycles >= 1);
    let drone = engine.drone_snapshot(0).unwrap();
    assert_eq!(drone.location, Vec2::ZERO);
}
