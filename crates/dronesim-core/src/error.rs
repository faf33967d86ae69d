//! Error types for the engine's public operations.

use dronesim_logic::gate::BlockReason;
use dronesim_logic::lifecycle::{DroneStatus, OrderStatus};
use dronesim_logic::{DroneId, MerchantId, OrderId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected assignment request. The world is left untouched.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum InvalidAssignment {
    #[error("unknown drone {0}")]
    UnknownDrone(DroneId),
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),
    #[error("order {order} is {status:?}, not an unassigned Ready order")]
    AlreadyAssigned { order: OrderId, status: OrderStatus },
    #[error("drone {drone} is {status:?} and cannot take work")]
    DroneUnavailable { drone: DroneId, status: DroneStatus },
    #[error("drone {drone} still has order {pending} awaiting pickup")]
    PendingPickup { drone: DroneId, pending: OrderId },
    #[error("drone {drone} would exceed capacity {capacity}")]
    CapacityExceeded { drone: DroneId, capacity: usize },
    #[error("assignment batch is empty")]
    EmptyBatch,
    #[error("order {0} appears more than once in the batch")]
    DuplicateOrder(OrderId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatedTransition {
    Pickup,
    Delivery,
}

impl GatedTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatedTransition::Pickup => "pickup",
            GatedTransition::Delivery => "delivery",
        }
    }
}

/// A pickup or delivery refused by the precondition gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{} of order {order} by drone {drone} blocked: {}", .transition.as_str(), .reason.code())]
pub struct PreconditionViolation {
    pub transition: GatedTransition,
    pub drone: DroneId,
    pub order: OrderId,
    pub reason: BlockReason,
}

/// A reference that no longer resolves to live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StaleReference {
    #[error("order {0} is gone or terminal")]
    Order(OrderId),
    #[error("order {order} is no longer held by drone {drone}")]
    NotOwned { order: OrderId, drone: DroneId },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItineraryError {
    #[error("unknown drone {0}")]
    UnknownDrone(DroneId),
    #[error("unknown order {0}")]
    UnknownOrder(OrderId),
    #[error("order {order} is not held by drone {drone}")]
    NotOwned { order: OrderId, drone: DroneId },
    #[error("order {order} has no stop kind matching its status {status:?}")]
    StopMismatch { order: OrderId, status: OrderStatus },
    #[error("pickup stop for order {order} names merchant {stop:?}, order is from {expected}")]
    WrongMerchant {
        order: OrderId,
        stop: Option<MerchantId>,
        expected: MerchantId,
    },
}

/// State damage the invariant enforcer must not paper over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("order {order} is in the cargo of several drones: {drones:?}")]
    MultipleCarriers { order: OrderId, drones: Vec<DroneId> },
    #[error("order {order} is assigned to nonexistent drone {drone}")]
    UnknownAssignee { order: OrderId, drone: DroneId },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_message_uses_reason_code() {
        let err = PreconditionViolation {
            transition: GatedTransition::Pickup,
            drone: 2,
            order: 7,
            reason: BlockReason::WrongDrone,
        };
        assert_eq!(
            err.to_string(),
            "pickup of order 7 by drone 2 blocked: wrong_drone"
        );
    }

    #[test]
    fn test_assignment_messages() {
        let err = InvalidAssignment::CapacityExceeded {
            drone: 1,
            capacity: 10,
        };
        assert_eq!(err.to_string(), "drone 1 would exceed capacity 10");
    }
}
