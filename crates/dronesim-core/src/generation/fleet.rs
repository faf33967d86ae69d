//! Fleet generation - places bases, merchants and drones

use dronesim_logic::geometry::Vec2;
use dronesim_logic::{DroneId, MerchantId};
use hecs::{Entity, World};
use rand::Rng;

use crate::components::{Cargo, Drone, ExecutionMode, Merchant, Position};
use crate::config::{MerchantSite, SimConfig};

/// Entity handles in id order: `drones[i]` is drone `i`, `merchants[j]` is merchant `j`.
#[derive(Debug, Clone, Default)]
pub struct FleetLayout {
    pub drones: Vec<Entity>,
    pub merchants: Vec<Entity>,
    pub bases: Vec<Vec2>,
}

impl FleetLayout {
    pub fn drone(&self, id: DroneId) -> Option<Entity> {
        self.drones.get(id as usize).copied()
    }

    pub fn merchant(&self, id: MerchantId) -> Option<Entity> {
        self.merchants.get(id as usize).copied()
    }

    /// Drone ids paired with their entities, ascending.
    pub fn drone_ids(&self) -> impl Iterator<Item = (DroneId, Entity)> + '_ {
        self.drones
            .iter()
            .enumerate()
            .map(|(i, &e)| (i as DroneId, e))
    }
}

fn random_point(size: f32, rng: &mut impl Rng) -> Vec2 {
    Vec2::new(rng.gen_range(0.0..=size), rng.gen_range(0.0..=size))
}

/// Spawn bases, merchants and drones for `config`.
///
/// An explicit `config.layout` places everything deterministically;
/// otherwise locations and efficiencies are drawn from `rng`.
pub fn generate_fleet(world: &mut World, config: &SimConfig, rng: &mut impl Rng) -> FleetLayout {
    let mut layout = FleetLayout::default();

    let (sites, starts): (Vec<MerchantSite>, Vec<Vec2>) = match &config.layout {
        Some(explicit) => {
            layout.bases = explicit.bases.clone();
            (explicit.merchants.clone(), explicit.drone_starts.clone())
        }
        None => {
            layout.bases = (0..config.num_bases)
                .map(|_| random_point(config.grid_size, rng))
                .collect();
            let sites = (0..config.num_merchants)
                .map(|_| MerchantSite {
                    location: random_point(config.grid_size, rng),
                    efficiency: rng.gen_range(config.min_efficiency..=config.max_efficiency),
                })
                .collect();
            (sites, Vec::new())
        }
    };

    for (i, site) in sites.iter().enumerate() {
        let entity = world.spawn((
            Merchant::new(i as MerchantId, site.efficiency),
            Position::new(site.location),
        ));
        layout.merchants.push(entity);
    }

    for i in 0..config.num_drones {
        let home = layout.bases[i % layout.bases.len()];
        let start = starts.get(i).copied().unwrap_or(home);
        let entity = world.spawn((
            Drone::new(i as DroneId, config.drone_capacity, config.drone_speed, home),
            Position::new(start),
            Cargo::default(),
            ExecutionMode::Unassigned,
        ));
        layout.drones.push(entity);
    }

    layout
}
