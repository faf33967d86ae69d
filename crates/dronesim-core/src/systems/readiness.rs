//! Readiness system - releases prepared orders from merchant queues

use dronesim_logic::lifecycle::OrderStatus;
use dronesim_logic::OrderId;
use hecs::World;

use crate::components::Merchant;
use crate::orders::OrderBook;

/// Move every order whose preparation has elapsed from `Accepted` to `Ready`.
///
/// Queues are scanned in full: preparation times vary per order, so a
/// later order may finish before an earlier one.
pub fn readiness_system(world: &mut World, orders: &mut OrderBook, now: u64) -> Vec<OrderId> {
    let mut released = Vec::new();

    for (_, merchant) in world.query_mut::<&mut Merchant>() {
        merchant.queue.retain(|&id| {
            let Some(order) = orders.get(id) else {
                return false;
            };
            if order.status != OrderStatus::Accepted {
                return false;
            }
            if now < order.creation_time + order.preparation_steps {
                return true;
            }
            if orders.transition(id, OrderStatus::Ready, now) {
                released.push(id);
            }
            false
        });
    }

    released.sort_unstable();
    released
}

#[cfg(test)]
mod tests {
    use super::*;
    use dronesim_logic::geometry::Vec2;

    #[test]
    fn test_orders_ready_after_preparation() {
        let mut world = World::new();
        let mut orders = OrderBook::new();
        let slow = orders.create(0, Vec2::ZERO, Vec2::ZERO, 5, 0);
        let fast = orders.create(0, Vec2::ZERO, Vec2::ZERO, 2, 0);
        let mut merchant = Merchant::new(0, 1.0);
        merchant.queue.extend([slow, fast]);
        let entity = world.spawn((merchant,));

        assert!(readiness_system(&mut world, &mut orders, 1).is_empty());
        assert_eq!(readiness_system(&mut world, &mut orders, 2), vec![fast]);
        assert_eq!(orders.get(fast).unwrap().ready_step, Some(2));
        assert_eq!(readiness_system(&mut world, &mut orders, 5), vec![slow]);

        let merchant = world.get::<&Merchant>(entity).unwrap();
        assert!(merchant.queue.is_empty());
    }
}
