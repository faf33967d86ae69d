//! Tick inputs and the built-in allocation and selection baselines.
//!
//! An [`Allocator`] proposes assignments of open orders to drones; a
//! [`DecisionSource`] picks, per drone at a decision point, which candidate
//! slot to serve. Both only ever see a [`WorldSnapshot`].

use std::collections::BTreeSet;

use dronesim_logic::{DroneId, OrderId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::engine::{DeliveryEngine, StepOutcome};
use crate::error::ConsistencyError;
use crate::snapshot::{DroneSnapshot, OrderSnapshot, WorldSnapshot};

/// Request to commit `orders` to `drone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub drone: DroneId,
    pub orders: Vec<OrderId>,
    /// Bypass the availability and pending-pickup guards.
    #[serde(default)]
    pub allow_override: bool,
}

impl AssignmentRequest {
    pub fn single(drone: DroneId, order: OrderId) -> Self {
        Self {
            drone,
            orders: vec![order],
            allow_override: false,
        }
    }
}

/// How a decision names a candidate slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Slot(usize),
    /// Raw value in `[-1, 1]`, one equal bin per slot.
    Continuous(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub drone: DroneId,
    pub selection: Option<Selection>,
    /// Raw speed in `[-1, 1]`, mapped onto the multiplier range.
    pub speed: Option<f32>,
}

/// Everything supplied from outside for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub assignments: Vec<AssignmentRequest>,
    pub decisions: Vec<Decision>,
}

pub trait Allocator {
    fn allocate(&mut self, snapshot: &WorldSnapshot) -> Vec<AssignmentRequest>;
}

pub trait DecisionSource {
    fn decide(&mut self, snapshot: &WorldSnapshot) -> Vec<Decision>;
}

/// Hand out `orders` in the given sequence, one per free drone, using
/// `pick` to choose among drones not yet used this tick.
fn allocate_in_sequence<'a>(
    snapshot: &'a WorldSnapshot,
    orders: impl IntoIterator<Item = &'a OrderSnapshot>,
    mut pick: impl FnMut(&[&'a DroneSnapshot], &OrderSnapshot) -> Option<usize>,
) -> Vec<AssignmentRequest> {
    let mut free: Vec<&DroneSnapshot> = snapshot
        .drones
        .iter()
        .filter(|d| d.can_accept_more)
        .collect();
    let mut requests = Vec::new();

    for order in orders {
        if free.is_empty() {
            break;
        }
        if let Some(i) = pick(free.as_slice(), order) {
            let drone = free.remove(i);
            requests.push(AssignmentRequest::single(drone.id, order.id));
        }
    }
    requests
}

fn nearest(drones: &[&DroneSnapshot], order: &OrderSnapshot) -> Option<usize> {
    drones
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da = a.location.distance_squared(&order.merchant_location);
            let db = b.location.distance_squared(&order.merchant_location);
            da.total_cmp(&db).then(a.id.cmp(&b.id))
        })
        .map(|(i, _)| i)
}

/// Each open order, oldest first, goes to the nearest free drone.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAllocator;

impl Allocator for GreedyAllocator {
    fn allocate(&mut self, snapshot: &WorldSnapshot) -> Vec<AssignmentRequest> {
        allocate_in_sequence(snapshot, snapshot.open_orders(), nearest)
    }
}

/// Earliest deadline first, each to the nearest free drone.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdfAllocator;

impl Allocator for EdfAllocator {
    fn allocate(&mut self, snapshot: &WorldSnapshot) -> Vec<AssignmentRequest> {
        let mut open: Vec<&OrderSnapshot> = snapshot.open_orders().collect();
        open.sort_by_key(|o| (o.deadline.unwrap_or(u64::MAX), o.id));
        allocate_in_sequence(snapshot, open, nearest)
    }
}

/// Open orders to uniformly random free drones.
#[derive(Debug, Clone)]
pub struct RandomAllocator {
    rng: StdRng,
}

impl RandomAllocator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Allocator for RandomAllocator {
    fn allocate(&mut self, snapshot: &WorldSnapshot) -> Vec<AssignmentRequest> {
        let rng = &mut self.rng;
        allocate_in_sequence(snapshot, snapshot.open_orders(), |drones, _| {
            Some(rng.gen_range(0..drones.len()))
        })
    }
}

/// Never assigns; drones find work through their candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAllocator;

impl Allocator for NoAllocator {
    fn allocate(&mut self, _snapshot: &WorldSnapshot) -> Vec<AssignmentRequest> {
        Vec::new()
    }
}

/// Finish carried orders, then owned pickups, then take the first open
/// candidate; always at full speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CargoFirstPolicy;

impl CargoFirstPolicy {
    fn choose(drone: &DroneSnapshot) -> Option<usize> {
        let cargo: BTreeSet<OrderId> = drone.cargo.iter().copied().collect();
        let pending: BTreeSet<OrderId> = drone.pending_pickups.iter().copied().collect();
        let slot_of = |set: &BTreeSet<OrderId>| {
            drone
                .candidates
                .iter()
                .position(|c| c.order_id().is_some_and(|id| set.contains(&id)))
        };
        slot_of(&cargo)
            .or_else(|| slot_of(&pending))
            .or_else(|| drone.candidates.iter().position(|c| c.is_valid()))
    }
}

impl DecisionSource for CargoFirstPolicy {
    fn decide(&mut self, snapshot: &WorldSnapshot) -> Vec<Decision> {
        snapshot
            .drones
            .iter()
            .filter(|d| d.decision_point)
            .map(|d| Decision {
                drone: d.id,
                selection: Self::choose(d).map(Selection::Slot),
                speed: Some(1.0),
            })
            .collect()
    }
}

/// Uniform continuous selection and speed for every drone.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DecisionSource for RandomPolicy {
    fn decide(&mut self, snapshot: &WorldSnapshot) -> Vec<Decision> {
        snapshot
            .drones
            .iter()
            .map(|d| Decision {
                drone: d.id,
                selection: Some(Selection::Continuous(self.rng.gen_range(-1.0..=1.0))),
                speed: Some(self.rng.gen_range(-1.0..=1.0)),
            })
            .collect()
    }
}

/// Supplies no decisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecisions;

impl DecisionSource for NoDecisions {
    fn decide(&mut self, _snapshot: &WorldSnapshot) -> Vec<Decision> {
        Vec::new()
    }
}

/// Snapshot the engine, ask both policies, and step once.
pub fn run_tick(
    engine: &mut DeliveryEngine,
    allocator: &mut impl Allocator,
    source: &mut impl DecisionSource,
) -> Result<StepOutcome, ConsistencyError> {
    let snapshot = engine.snapshot();
    let input = TickInput {
        assignments: allocator.allocate(&snapshot),
        decisions: source.decide(&snapshot),
    };
    engine.step(input)
}
