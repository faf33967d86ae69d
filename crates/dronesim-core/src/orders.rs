//! Order records and the order book resource.
//!
//! The order book is the single owner of order state. Status changes go
//! through [`OrderBook::transition`], which refuses edges the lifecycle
//! does not allow and stamps readiness and terminal times.

use std::collections::BTreeMap;

use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::{is_legal_transition, OrderStatus};
use dronesim_logic::{DroneId, MerchantId, OrderId};
use log::error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub creation_time: u64,
    pub preparation_steps: u64,
    /// Set once, on the transition to `Ready`.
    pub ready_step: Option<u64>,
    pub merchant_id: MerchantId,
    pub merchant_location: Vec2,
    pub customer_location: Vec2,
    pub assigned_drone: Option<DroneId>,
    pub delivery_time: Option<u64>,
    /// Step the order became terminal, for purging.
    pub closed_at: Option<u64>,
}

impl Order {
    pub fn is_owned_by(&self, drone: DroneId) -> bool {
        self.assigned_drone == Some(drone)
    }

    /// Unassigned and waiting for a drone.
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Ready && self.assigned_drone.is_none()
    }
}

/// Per-status tally of retained orders. Terminal orders drop out of these
/// counts once purged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusCounts {
    pub accepted: usize,
    pub ready: usize,
    pub assigned: usize,
    pub picked_up: usize,
    pub delivered: usize,
    pub cancelled: usize,
}

impl OrderStatusCounts {
    pub fn get(&self, status: OrderStatus) -> usize {
        match status {
            OrderStatus::Accepted => self.accepted,
            OrderStatus::Ready => self.ready,
            OrderStatus::Assigned => self.assigned,
            OrderStatus::PickedUp => self.picked_up,
            OrderStatus::Delivered => self.delivered,
            OrderStatus::Cancelled => self.cancelled,
        }
    }

    fn slot(&mut self, status: OrderStatus) -> &mut usize {
        match status {
            OrderStatus::Accepted => &mut self.accepted,
            OrderStatus::Ready => &mut self.ready,
            OrderStatus::Assigned => &mut self.assigned,
            OrderStatus::PickedUp => &mut self.picked_up,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        }
    }

    /// Orders not yet delivered or cancelled.
    pub fn active(&self) -> usize {
        self.accepted + self.ready + self.assigned + self.picked_up
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    orders: BTreeMap<OrderId, Order>,
    next_id: OrderId,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new `Accepted` order and return its id.
    pub fn create(
        &mut self,
        merchant_id: MerchantId,
        merchant_location: Vec2,
        customer_location: Vec2,
        preparation_steps: u64,
        now: u64,
    ) -> OrderId {
        let id = self.next_id;
        self.next_id += 1;
        self.orders.insert(
            id,
            Order {
                id,
                status: OrderStatus::Accepted,
                creation_time: now,
                preparation_steps,
                ready_step: None,
                merchant_id,
                merchant_location,
                customer_location,
                assigned_drone: None,
                delivery_time: None,
                closed_at: None,
            },
        );
        id
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    /// All retained orders in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().filter(|o| !o.status.is_terminal())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// `Assigned` orders owned by `drone`, in id order.
    pub fn pending_pickups(&self, drone: DroneId) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(move |o| o.status == OrderStatus::Assigned && o.is_owned_by(drone))
    }

    pub fn counts(&self) -> OrderStatusCounts {
        let mut counts = OrderStatusCounts::default();
        for order in self.orders.values() {
            *counts.slot(order.status) += 1;
        }
        counts
    }

    /// Apply a lifecycle edge. Returns false, leaving the order untouched,
    /// if the order is unknown or the edge is illegal.
    pub(crate) fn transition(&mut self, id: OrderId, to: OrderStatus, now: u64) -> bool {
        let Some(order) = self.orders.get_mut(&id) else {
            return false;
        };
        if !is_legal_transition(order.status, to) {
            error!(
                "illegal transition for order {}: {} -> {}",
                id,
                order.status.as_str(),
                to.as_str()
            );
            return false;
        }

        order.status = to;
        match to {
            OrderStatus::Ready if order.ready_step.is_none() => order.ready_step = Some(now),
            OrderStatus::Delivered => {
                order.assigned_drone = None;
                order.delivery_time = Some(now);
                order.closed_at = Some(now);
            }
            OrderStatus::Cancelled => {
                order.assigned_drone = None;
                order.closed_at = Some(now);
            }
            _ => {}
        }
        true
    }

    /// Drop terminal orders closed at least `retention` steps ago.
    pub fn purge_terminal(&mut self, now: u64, retention: u64) -> usize {
        let before = self.orders.len();
        self.orders.retain(|_, o| match o.closed_at {
            Some(closed) => now.saturating_sub(closed) < retention,
            None => true,
        });
        before - self.orders.len()
    }

    pub fn clear(&mut self) {
        self.orders.clear();
        self.next_id = 0;
    }
}
