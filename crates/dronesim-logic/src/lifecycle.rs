//! Order and drone lifecycle states.
//!
//! Order lifecycle:
//!
//! ```text
//! Accepted ──▶ Ready ──▶ Assigned ──▶ PickedUp ──▶ Delivered
//!                │           │            │
//!                └───────────┴──▶ Cancelled (Ready/Assigned by deadline,
//!                                            PickedUp only via recovery)
//! ```

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created at a merchant, still being prepared.
    Accepted,
    /// Preparation finished; waiting for a drone.
    Ready,
    /// Committed to a drone, not yet collected.
    Assigned,
    /// Physically in a drone's cargo.
    PickedUp,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Accepted,
        OrderStatus::Ready,
        OrderStatus::Assigned,
        OrderStatus::PickedUp,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Statuses the deadline scheduler may cancel.
    pub fn is_cancellable_by_deadline(&self) -> bool {
        matches!(self, OrderStatus::Ready | OrderStatus::Assigned)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Accepted => "accepted",
            OrderStatus::Ready => "ready",
            OrderStatus::Assigned => "assigned",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// Whether `from -> to` is a legal lifecycle edge.
///
/// `PickedUp -> Cancelled` is only reachable through recovery paths; it is
/// legal here so the order book can apply it, but the deadline scheduler
/// never requests it.
pub fn is_legal_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
        (from, to),
        (Accepted, Ready)
            | (Ready, Assigned)
            | (Assigned, PickedUp)
            | (PickedUp, Delivered)
            | (Ready, Cancelled)
            | (Assigned, Cancelled)
            | (PickedUp, Cancelled)
            | (Accepted, Cancelled)
    )
}

/// Drone activity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DroneStatus {
    Idle,
    FlyingToMerchant,
    /// At the merchant, pickup not yet granted.
    WaitingForPickup,
    FlyingToCustomer,
    /// At the customer, delivery not yet granted.
    Delivering,
    ReturningToBase,
    Charging,
}

impl DroneStatus {
    /// Statuses in which proximity to the target opens a decision point.
    pub fn is_task_bound(&self) -> bool {
        matches!(
            self,
            DroneStatus::FlyingToMerchant
                | DroneStatus::WaitingForPickup
                | DroneStatus::FlyingToCustomer
                | DroneStatus::Delivering
        )
    }

    /// Whether new orders may be assigned without an override.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, DroneStatus::Charging | DroneStatus::ReturningToBase)
    }

    pub fn is_flying(&self) -> bool {
        matches!(
            self,
            DroneStatus::FlyingToMerchant
                | DroneStatus::FlyingToCustomer
                | DroneStatus::ReturningToBase
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::PickedUp.is_terminal());
    }

    #[test]
    fn test_forward_path_is_legal() {
        use OrderStatus::*;
        let path = [Accepted, Ready, Assigned, PickedUp, Delivered];
        for pair in path.windows(2) {
            assert!(is_legal_transition(pair[0], pair[1]), "{:?}", pair);
        }
    }

    #[test]
    fn test_skips_are_illegal() {
        use OrderStatus::*;
        assert!(!is_legal_transition(Ready, PickedUp));
        assert!(!is_legal_transition(Assigned, Delivered));
        assert!(!is_legal_transition(Delivered, Cancelled));
        assert!(!is_legal_transition(Cancelled, Ready));
    }

    #[test]
    fn test_deadline_only_touches_uncollected() {
        assert!(OrderStatus::Ready.is_cancellable_by_deadline());
        assert!(OrderStatus::Assigned.is_cancellable_by_deadline());
        assert!(!OrderStatus::PickedUp.is_cancellable_by_deadline());
        assert!(!OrderStatus::Accepted.is_cancellable_by_deadline());
    }

    #[test]
    fn test_charging_not_assignable() {
        assert!(!DroneStatus::Charging.is_assignable());
        assert!(DroneStatus::Idle.is_assignable());
        assert!(DroneStatus::FlyingToCustomer.is_task_bound());
        assert!(!DroneStatus::Idle.is_task_bound());
    }
}
