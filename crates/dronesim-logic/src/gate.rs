//! Pickup and delivery preconditions.
//!
//! These checks are the only authority for `Assigned -> PickedUp` and
//! `PickedUp -> Delivered`. They read plain facts and never mutate; the
//! engine applies the transition only when a check returns `Ok`.

use serde::{Deserialize, Serialize};

use crate::lifecycle::OrderStatus;
use crate::{DroneId, MerchantId};

/// Why a pickup or delivery was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockReason {
    /// Order is not assigned to the acting drone.
    WrongDrone,
    /// Drone is not at the order's merchant.
    WrongMerchant,
    /// Order is not in the status the transition requires.
    WrongStatus,
    /// Order is missing from the drone's cargo.
    NotInCargo,
}

impl BlockReason {
    pub fn code(&self) -> &'static str {
        match self {
            BlockReason::WrongDrone => "wrong_drone",
            BlockReason::WrongMerchant => "wrong_merchant",
            BlockReason::WrongStatus => "wrong_status",
            BlockReason::NotInCargo => "not_in_cargo",
        }
    }
}

/// Facts needed to judge a pickup.
#[derive(Debug, Clone, Copy)]
pub struct PickupFacts {
    pub drone: DroneId,
    pub order_status: OrderStatus,
    pub assigned_drone: Option<DroneId>,
    pub order_merchant: MerchantId,
    /// Merchant the drone is standing at, if any.
    pub stop_merchant: Option<MerchantId>,
}

/// Facts needed to judge a delivery.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryFacts {
    pub drone: DroneId,
    pub order_status: OrderStatus,
    pub assigned_drone: Option<DroneId>,
    pub in_cargo: bool,
}

/// Pickup requires: assigned to this drone, at the right merchant, status `Assigned`.
pub fn check_pickup(facts: &PickupFacts) -> Result<(), BlockReason> {
    if facts.assigned_drone != Some(facts.drone) {
        return Err(BlockReason::WrongDrone);
    }
    if facts.stop_merchant != Some(facts.order_merchant) {
        return Err(BlockReason::WrongMerchant);
    }
    if facts.order_status != OrderStatus::Assigned {
        return Err(BlockReason::WrongStatus);
    }
    Ok(())
}

/// Delivery requires: status `PickedUp`, assigned to this drone, present in cargo.
pub fn check_delivery(facts: &DeliveryFacts) -> Result<(), BlockReason> {
    if facts.order_status != OrderStatus::PickedUp {
        return Err(BlockReason::WrongStatus);
    }
    if facts.assigned_drone != Some(facts.drone) {
        return Err(BlockReason::WrongDrone);
    }
    if !facts.in_cargo {
        return Err(BlockReason::NotInCargo);
    }
    Ok(())
}
