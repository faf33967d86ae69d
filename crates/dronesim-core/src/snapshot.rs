//! Read-only views of the world handed to allocators and decision sources.

use dronesim_logic::deadline::SlaPolicy;
use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::{DroneStatus, OrderStatus};
use dronesim_logic::ranking::Candidate;
use dronesim_logic::{DroneId, MerchantId, OrderId};
use serde::{Deserialize, Serialize};

use crate::components::ModeKind;
use crate::orders::Order;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroneSnapshot {
    pub id: DroneId,
    pub location: Vec2,
    pub status: DroneStatus,
    pub mode: ModeKind,
    pub serving_order_id: Option<OrderId>,
    pub target: Option<Vec2>,
    pub cargo: Vec<OrderId>,
    pub pending_pickups: Vec<OrderId>,
    pub capacity: usize,
    pub battery: f32,
    pub speed_multiplier: f32,
    /// Free for a new assignment without an override.
    pub can_accept_more: bool,
    pub decision_point: bool,
    /// Candidate list published at the end of the last tick.
    pub candidates: Vec<Candidate>,
}

impl DroneSnapshot {
    pub fn load(&self) -> usize {
        self.cargo.len() + self.pending_pickups.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: OrderId,
    pub status: OrderStatus,
    pub merchant_id: MerchantId,
    pub merchant_location: Vec2,
    pub customer_location: Vec2,
    pub creation_time: u64,
    pub ready_step: Option<u64>,
    pub deadline: Option<u64>,
    pub assigned_drone: Option<DroneId>,
    pub delivery_time: Option<u64>,
}

impl OrderSnapshot {
    pub fn from_order(order: &Order, sla: &SlaPolicy) -> Self {
        Self {
            id: order.id,
            status: order.status,
            merchant_id: order.merchant_id,
            merchant_location: order.merchant_location,
            customer_location: order.customer_location,
            creation_time: order.creation_time,
            ready_step: order.ready_step,
            deadline: order.ready_step.map(|r| sla.deadline(r)),
            assigned_drone: order.assigned_drone,
            delivery_time: order.delivery_time,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Ready && self.assigned_drone.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantSnapshot {
    pub id: MerchantId,
    pub location: Vec2,
    pub efficiency: f32,
    pub queued: usize,
}

/// The whole observable state at a tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub step: u64,
    pub drones: Vec<DroneSnapshot>,
    /// Retained orders in id order, terminal ones included until purged
    pub orders: Vec<OrderSnapshot>,
    pub merchants: Vec<MerchantSnapshot>,
    pub bases: Vec<Vec2>,
}

impl WorldSnapshot {
    pub fn drone(&self, id: DroneId) -> Option<&DroneSnapshot> {
        self.drones.get(id as usize)
    }

    pub fn order(&self, id: OrderId) -> Option<&OrderSnapshot> {
        self.orders
            .binary_search_by_key(&id, |o| o.id)
            .ok()
            .map(|i| &self.orders[i])
    }

    /// Unassigned `Ready` orders in id order.
    pub fn open_orders(&self) -> impl Iterator<Item = &OrderSnapshot> {
        self.orders.iter().filter(|o| o.is_open())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
