//! Randomised whole-fleet runs checked against the order and drone
//! invariants after every tick.
//!
//! Demand is stochastic; allocators and decision sources are the built-in
//! baselines, so every combination of execution mode gets exercised.

use std::collections::BTreeMap;

use dronesim_core::config::{ExecutionStrategy, SimConfig};
use dronesim_core::prelude::*;
use dronesim_logic::ranking::valid_count;

// ── Helpers ────────────────────────────────────────────────────────────

fn busy_config(seed: u64, strategy: ExecutionStrategy) -> SimConfig {
    SimConfig {
        seed,
        strategy,
        order_rate: 0.15,
        num_drones: 4,
        num_merchants: 6,
        drone_capacity: 3,
        episode_steps: 150,
        ..Default::default()
    }
}

/// Every observable invariant of one tick's snapshot.
fn check_snapshot(snapshot: &WorldSnapshot) {
    let mut carriers: BTreeMap<OrderId, Vec<DroneId>> = BTreeMap::new();
    for drone in &snapshot.drones {
        assert!(drone.load() <= drone.capacity, "drone {} over capacity", drone.id);
        assert!((0.0..=1.0).contains(&drone.battery));
        for &id in &drone.cargo {
            carriers.entry(id).or_default().push(drone.id);
        }
    }

    for order in &snapshot.orders {
        let held_by = carriers.remove(&order.id).unwrap_or_default();
        match order.status {
            OrderStatus::PickedUp => {
                assert_eq!(held_by.len(), 1, "order {} carried by {:?}", order.id, held_by);
                assert_eq!(order.assigned_drone, Some(held_by[0]));
            }
            status => assert!(
                held_by.is_empty(),
                "{} order {} still in cargo of {:?}",
                status.as_str(),
                order.id,
                held_by
            ),
        }
        match order.status {
            OrderStatus::Assigned | OrderStatus::PickedUp => {
                assert!(order.assigned_drone.is_some())
            }
            OrderStatus::Accepted
            | OrderStatus::Ready
            | OrderStatus::Delivered
            | OrderStatus::Cancelled => assert_eq!(order.assigned_drone, None),
        }
        assert_eq!(
            order.delivery_time.is_some(),
            order.status == OrderStatus::Delivered
        );
        if let Some(ready) = order.ready_step {
            assert!(ready >= order.creation_time);
        }
    }
    assert!(carriers.is_empty(), "cargo holds unknown orders {:?}", carriers);
}

/// A drone serving a live order flies to where that order needs it.
fn check_no_chasing(snapshot: &WorldSnapshot) {
    for drone in &snapshot.drones {
        let Some(order) = drone.serving_order_id.and_then(|id| snapshot.order(id)) else {
            continue;
        };
        if order.status.is_terminal() || order.assigned_drone != Some(drone.id) {
            continue;
        }
        let expected = match order.status {
            OrderStatus::Assigned => order.merchant_location,
            _ => order.customer_location,
        };
        assert_eq!(drone.target, Some(expected), "drone {} off course", drone.id);
    }
}

/// Keeps the last batch of decisions handed to the engine.
struct Recording<'a, S> {
    inner: &'a mut S,
    last: Vec<Decision>,
}

impl<S: DecisionSource> DecisionSource for Recording<'_, S> {
    fn decide(&mut self, snapshot: &WorldSnapshot) -> Vec<Decision> {
        self.last = self.inner.decide(snapshot);
        self.last.clone()
    }
}

/// A drone offered real candidates at a decision point, and given a
/// selection, ends the tick with a target unless one of those candidates
/// moved on (picked up, delivered, cancelled or taken by another drone).
fn check_liveness(before: &WorldSnapshot, after: &WorldSnapshot, decisions: &[Decision]) {
    for decision in decisions.iter().filter(|d| d.selection.is_some()) {
        let (Some(was), Some(now)) = (before.drone(decision.drone), after.drone(decision.drone))
        else {
            continue;
        };
        if !was.decision_point || valid_count(&was.candidates) == 0 || now.target.is_some() {
            continue;
        }
        let progressed = was.cargo != now.cargo
            || was.candidates.iter().filter_map(Candidate::order_id).any(|id| {
                match (before.order(id), after.order(id)) {
                    (Some(a), Some(b)) => {
                        a.status != b.status || a.assigned_drone != b.assigned_drone
                    }
                    _ => true,
                }
            });
        assert!(
            progressed,
            "step {}: drone {} took a decision with {:?} but has no target",
            before.step, was.id, was.candidates
        );
    }
}

fn run_episode(
    config: SimConfig,
    allocator: &mut impl Allocator,
    source: &mut impl DecisionSource,
) -> Vec<StepOutcome> {
    let takes_decisions = config.strategy.accepts_decisions();
    let mut engine = DeliveryEngine::new(config).expect("valid config");
    let mut source = Recording {
        inner: source,
        last: Vec::new(),
    };
    let mut outcomes = Vec::new();
    while !engine.is_truncated() {
        let before = engine.snapshot();
        let outcome = run_tick(&mut engine, allocator, &mut source).expect("consistent tick");
        if takes_decisions {
            check_liveness(&before, &outcome.snapshot, &source.last);
        }
        check_snapshot(&outcome.snapshot);
        check_no_chasing(&outcome.snapshot);
        assert!(
            engine.consistency_issues().is_empty(),
            "step {}: {:?}",
            outcome.info.step,
            engine.consistency_issues()
        );
        outcomes.push(outcome);
    }
    outcomes
}

fn check_monotonic(outcomes: &[StepOutcome]) {
    for pair in outcomes.windows(2) {
        let (a, b) = (&pair[0].info.stats, &pair[1].info.stats);
        assert!(b.orders_generated >= a.orders_generated);
        assert!(b.orders_delivered >= a.orders_delivered);
        assert!(b.orders_cancelled >= a.orders_cancelled);
        assert!(b.on_time_deliveries >= a.on_time_deliveries);
        assert!(b.flight_distance >= a.flight_distance);
    }
    let last = &outcomes[outcomes.len() - 1].info.stats;
    assert!(last.on_time_deliveries <= last.orders_delivered);
    assert!(last.orders_delivered <= last.pickups);
}

/// Once an order reaches a terminal status it keeps it until purged.
fn check_terminal_sticky(outcomes: &[StepOutcome]) {
    let mut closed: BTreeMap<OrderId, OrderStatus> = BTreeMap::new();
    for outcome in outcomes {
        for order in &outcome.snapshot.orders {
            if let Some(previous) = closed.get(&order.id) {
                assert_eq!(*previous, order.status, "order {} reopened", order.id);
            } else if order.status.is_terminal() {
                closed.insert(order.id, order.status);
            }
        }
    }
}

// ── Strategy sweeps ────────────────────────────────────────────────────

#[test]
fn greedy_with_cargo_first_keeps_invariants() {
    for seed in 0..4 {
        let outcomes = run_episode(
            busy_config(seed, ExecutionStrategy::Auto),
            &mut GreedyAllocator,
            &mut CargoFirstPolicy,
        );
        check_monotonic(&outcomes);
        check_terminal_sticky(&outcomes);
        assert!(outcomes.last().unwrap().info.stats.orders_delivered > 0);
    }
}

#[test]
fn random_decisions_keep_invariants() {
    for seed in 0..4 {
        let outcomes = run_episode(
            busy_config(seed, ExecutionStrategy::TaskSelection),
            &mut RandomAllocator::new(seed),
            &mut RandomPolicy::new(seed + 100),
        );
        check_monotonic(&outcomes);
        check_terminal_sticky(&outcomes);
    }
}

#[test]
fn decisions_alone_drive_deliveries() {
    let outcomes = run_episode(
        busy_config(7, ExecutionStrategy::TaskSelection),
        &mut NoAllocator,
        &mut CargoFirstPolicy,
    );
    let stats = &outcomes.last().unwrap().info.stats;
    assert_eq!(stats.assignments_accepted, 0);
    assert!(stats.decisions_applied > 0);
    assert!(stats.orders_delivered > 0);
}

#[test]
fn random_decisions_alone_keep_drones_moving() {
    for seed in 0..3 {
        let outcomes = run_episode(
            busy_config(seed, ExecutionStrategy::TaskSelection),
            &mut NoAllocator,
            &mut RandomPolicy::new(seed),
        );
        let stats = &outcomes.last().unwrap().info.stats;
        assert_eq!(stats.assignments_accepted, 0);
        assert!(stats.decisions_applied > 0);
    }
}

#[test]
fn itinerary_strategy_keeps_invariants() {
    for seed in 0..3 {
        let outcomes = run_episode(
            busy_config(seed, ExecutionStrategy::Itinerary),
            &mut EdfAllocator,
            &mut NoDecisions,
        );
        check_monotonic(&outcomes);
        check_terminal_sticky(&outcomes);
        let stats = &outcomes.last().unwrap().info.stats;
        assert_eq!(stats.decisions_applied, 0);
        assert!(stats.orders_delivered > 0);
    }
}

#[test]
fn legacy_only_keeps_invariants() {
    let outcomes = run_episode(
        busy_config(11, ExecutionStrategy::LegacyOnly),
        &mut GreedyAllocator,
        &mut RandomPolicy::new(5),
    );
    check_monotonic(&outcomes);
    let stats = &outcomes.last().unwrap().info.stats;
    assert_eq!(stats.decisions_applied, 0);
    assert!(stats.orders_delivered > 0);
}

#[test]
fn no_repairs_needed_in_normal_operation() {
    let outcomes = run_episode(
        busy_config(3, ExecutionStrategy::Auto),
        &mut EdfAllocator,
        &mut CargoFirstPolicy,
    );
    assert!(outcomes.iter().all(|o| o.info.repairs.total() == 0));
}

// ── Determinism ────────────────────────────────────────────────────────

#[test]
fn same_seed_same_episode() {
    let run = || {
        run_episode(
            busy_config(42, ExecutionStrategy::Auto),
            &mut RandomAllocator::new(9),
            &mut RandomPolicy::new(9),
        )
    };
    let (a, b) = (run(), run());
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.snapshot, y.snapshot);
        assert_eq!(x.info, y.info);
    }
}

#[test]
fn reset_replays_the_episode() {
    let config = busy_config(5, ExecutionStrategy::Auto);
    let mut engine = DeliveryEngine::new(config).unwrap();
    let first = engine.snapshot();
    for _ in 0..40 {
        run_tick(&mut engine, &mut GreedyAllocator, &mut CargoFirstPolicy).unwrap();
    }
    let after_forty = engine.snapshot();

    assert_eq!(engine.reset(5), first);
    for _ in 0..40 {
        run_tick(&mut engine, &mut GreedyAllocator, &mut CargoFirstPolicy).unwrap();
    }
    assert_eq!(engine.snapshot(), after_forty);
}

#[test]
fn snapshot_serialises_to_json() {
    let mut engine = DeliveryEngine::new(busy_config(1, ExecutionStrategy::Auto)).unwrap();
    for _ in 0..10 {
        run_tick(&mut engine, &mut GreedyAllocator, &mut CargoFirstPolicy).unwrap();
    }
    let json = engine.snapshot().to_json().unwrap();
    let parsed: WorldSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.step, 10);
    assert_eq!(parsed.drones.len(), 4);
}
