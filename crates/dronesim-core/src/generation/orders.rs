//! Order generation - stochastic demand at merchants

use dronesim_logic::geometry::Vec2;
use dronesim_logic::lifecycle::OrderStatus;
use dronesim_logic::{MerchantId, OrderId};
use hecs::World;
use log::debug;
use rand::Rng;

use crate::components::{Merchant, Position};
use crate::config::SimConfig;
use crate::generation::FleetLayout;
use crate::orders::OrderBook;

/// Create an `Accepted` order at `merchant_id` and queue it for preparation.
///
/// Zero preparation makes the order `Ready` immediately. Returns `None` for
/// an unknown merchant.
pub fn spawn_order(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    merchant_id: MerchantId,
    customer: Vec2,
    preparation_steps: u64,
    now: u64,
) -> Option<OrderId> {
    let entity = layout.merchant(merchant_id)?;
    let location = world.get::<&Position>(entity).ok()?.location;
    let id = orders.create(merchant_id, location, customer, preparation_steps, now);

    if preparation_steps == 0 {
        orders.transition(id, OrderStatus::Ready, now);
    } else if let Ok(mut merchant) = world.get::<&mut Merchant>(entity) {
        merchant.queue.push_back(id);
    }
    debug!(
        "order {} accepted at merchant {} (prep {} steps)",
        id, merchant_id, preparation_steps
    );
    Some(id)
}

/// Roll each merchant for a new order, respecting the active-order cap.
pub fn generate_orders(
    world: &mut World,
    orders: &mut OrderBook,
    layout: &FleetLayout,
    config: &SimConfig,
    now: u64,
    rng: &mut impl Rng,
) -> Vec<OrderId> {
    let mut created = Vec::new();
    let mut active = orders.active_count();

    for (merchant_id, &entity) in layout.merchants.iter().enumerate() {
        if active >= config.max_active_orders {
            break;
        }
        if !rng.gen_bool(config.order_rate) {
            continue;
        }

        let base = match world.get::<&Merchant>(entity) {
            Ok(merchant) => merchant.preparation_steps(config.base_preparation_steps),
            Err(_) => continue,
        };
        let jitter = rng.gen_range(0..=config.preparation_jitter_steps);
        let customer = Vec2::new(
            rng.gen_range(0.0..=config.grid_size),
            rng.gen_range(0.0..=config.grid_size),
        );

        if let Some(id) = spawn_order(
            world,
            orders,
            layout,
            merchant_id as MerchantId,
            customer,
            base + jitter,
            now,
        ) {
            created.push(id);
            active += 1;
        }
    }

    created
}
