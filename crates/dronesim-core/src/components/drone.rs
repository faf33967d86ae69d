//! Drone components.

use std::collections::{BTreeSet, VecDeque};

use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::DroneStatus;
use dronesim_logic::{DroneId, MerchantId, OrderId};
use serde::{Deserialize, Serialize};

/// Core drone identity and physical state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    pub id: DroneId,
    pub status: DroneStatus,
    /// Maximum orders carried or committed at once
    pub capacity: usize,
    /// Distance per step at multiplier 1.0
    pub base_speed: f32,
    pub speed_multiplier: f32,
    pub home: Vec2,
    /// State of charge in [0, 1]
    pub battery: f32,
}

impl Drone {
    pub fn new(id: DroneId, capacity: usize, base_speed: f32, home: Vec2) -> Self {
        Self {
            id,
            status: DroneStatus::Idle,
            capacity,
            base_speed,
            speed_multiplier: 1.0,
            home,
            battery: 1.0,
        }
    }

    pub fn effective_speed(&self) -> f32 {
        self.base_speed * self.speed_multiplier
    }
}

/// Orders physically on board. Only `PickedUp` orders owned by this drone
/// belong here; the invariant enforcer repairs any drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cargo {
    pub orders: BTreeSet<OrderId>,
}

impl Cargo {
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.orders.contains(&order_id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopKind {
    Pickup,
    Delivery,
}

/// One planned stop of an itinerary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub kind: StopKind,
    pub order_id: OrderId,
    pub location: Vec2,
    /// Merchant served by a pickup stop.
    pub merchant_id: Option<MerchantId>,
}

impl Stop {
    pub fn pickup(order_id: OrderId, merchant_id: MerchantId, location: Vec2) -> Self {
        Self {
            kind: StopKind::Pickup,
            order_id,
            location,
            merchant_id: Some(merchant_id),
        }
    }

    pub fn delivery(order_id: OrderId, location: Vec2) -> Self {
        Self {
            kind: StopKind::Delivery,
            order_id,
            location,
            merchant_id: None,
        }
    }
}

/// How a drone decides where to go next.
///
/// Exactly one mode governs a drone at a time. `Itinerary` never holds an
/// empty queue; the drone drops to `Unassigned` when its last stop is done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ExecutionMode {
    #[default]
    Unassigned,
    /// Ordered stops visited front to back.
    Itinerary(VecDeque<Stop>),
    /// Single order chosen by task selection.
    Serving(OrderId),
    /// Earliest-ready work resolved at each arrival.
    LegacyBatch,
}

/// Mode discriminant for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModeKind {
    Unassigned,
    Itinerary,
    TaskSelection,
    LegacyBatch,
}

impl ExecutionMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            ExecutionMode::Unassigned => ModeKind::Unassigned,
            ExecutionMode::Itinerary(_) => ModeKind::Itinerary,
            ExecutionMode::Serving(_) => ModeKind::TaskSelection,
            ExecutionMode::LegacyBatch => ModeKind::LegacyBatch,
        }
    }

    pub fn serving_order_id(&self) -> Option<OrderId> {
        match self {
            ExecutionMode::Serving(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_itinerary(&self) -> bool {
        matches!(self, ExecutionMode::Itinerary(_))
    }

    /// Build an itinerary mode, collapsing an empty stop list to `Unassigned`.
    pub fn itinerary(stops: VecDeque<Stop>) -> Self {
        if stops.is_empty() {
            ExecutionMode::Unassigned
        } else {
            ExecutionMode::Itinerary(stops)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_itinerary_collapses() {
        assert_eq!(
            ExecutionMode::itinerary(VecDeque::new()),
            ExecutionMode::Unassigned
        );
        let stops = VecDeque::from(vec![Stop::delivery(1, Vec2::ZERO)]);
        assert_eq!(ExecutionMode::itinerary(stops).kind(), ModeKind::Itinerary);
    }

    #[test]
    fn test_serving_order_id() {
        assert_eq!(ExecutionMode::Serving(4).serving_order_id(), Some(4));
        assert_eq!(ExecutionMode::LegacyBatch.serving_order_id(), None);
    }

    #[test]
    fn test_effective_speed() {
        let mut drone = Drone::new(0, 10, 2.0, Vec2::ZERO);
        drone.speed_multiplier = 0.5;
        assert!((drone.effective_speed() - 1.0).abs() < 1e-6);
    }
}
