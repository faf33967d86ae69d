//! Simulation engine - main entry point for running the simulation

use dronesim_logic::geometry::Vec2;
use dronesim_logic::ranking::Candidate;
use dronesim_logic::{DroneId, MerchantId, OrderId};
use hecs::World;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::config::SimConfig;
use crate::error::{ConfigError, ConsistencyError, InvalidAssignment, ItineraryError};
use crate::generation::{generate_fleet, generate_orders, spawn_order, FleetLayout};
use crate::metrics::{EpisodeStats, RepairReport};
use crate::orders::{Order, OrderBook, OrderStatusCounts};
use crate::policy::{AssignmentRequest, TickInput};
use crate::snapshot::{DroneSnapshot, MerchantSnapshot, OrderSnapshot, WorldSnapshot};
use crate::systems::*;

/// Result of one submitted assignment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub drone: DroneId,
    pub orders: Vec<OrderId>,
    pub result: Result<(), InvalidAssignment>,
}

/// Per-tick diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Step that was just simulated
    pub step: u64,
    pub generated: Vec<OrderId>,
    pub cancelled: Vec<OrderId>,
    pub assignments: Vec<AssignmentOutcome>,
    pub decision_points: usize,
    pub repairs: RepairReport,
    pub purged: usize,
    pub order_counts: OrderStatusCounts,
    /// Running totals after this step
    pub stats: EpisodeStats,
    /// Episode step limit reached
    pub truncated: bool,
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub snapshot: WorldSnapshot,
    pub info: StepInfo,
}

/// Main simulation engine
pub struct DeliveryEngine {
    world: World,
    orders: OrderBook,
    layout: FleetLayout,
    config: SimConfig,
    /// Next step to simulate
    time: u64,
    stats: EpisodeStats,
    rng: StdRng,
    /// Candidate lists published at the end of the last tick, by drone id
    board: Vec<Vec<Candidate>>,
}

impl DeliveryEngine {
    /// Validate `config` and build a fresh episode seeded with `config.seed`.
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = config.seed;
        let mut engine = Self {
            world: World::new(),
            orders: OrderBook::new(),
            layout: FleetLayout::default(),
            config,
            time: 0,
            stats: EpisodeStats::default(),
            rng: StdRng::seed_from_u64(seed),
            board: Vec::new(),
        };
        engine.reset(seed);
        Ok(engine)
    }

    /// Discard all state and start a new episode.
    pub fn reset(&mut self, seed: u64) -> WorldSnapshot {
        self.world.clear();
        self.orders.clear();
        self.time = 0;
        self.stats = EpisodeStats::default();
        self.rng = StdRng::seed_from_u64(seed);
        self.layout = generate_fleet(&mut self.world, &self.config, &mut self.rng);
        self.publish();
        info!(
            "episode reset (seed {}): {} drones, {} merchants, {} bases",
            seed,
            self.layout.drones.len(),
            self.layout.merchants.len(),
            self.layout.bases.len()
        );
        self.snapshot()
    }

    /// Advance the world by one step.
    ///
    /// Phases run in a fixed order: readiness and demand, supplied
    /// assignments, decisions, movement and arrival, energy, deadlines and
    /// stale-commitment cleanup, invariants, candidate publication. A fatal
    /// consistency error aborts the tick before any repair runs.
    pub fn step(&mut self, input: TickInput) -> Result<StepOutcome, ConsistencyError> {
        let now = self.time;
        let sla = self.config.sla();

        let released = readiness_system(&mut self.world, &mut self.orders, now);
        self.stats.orders_ready += released.len() as u64;
        let generated = generate_orders(
            &mut self.world,
            &mut self.orders,
            &self.layout,
            &self.config,
            now,
            &mut self.rng,
        );
        self.stats.orders_generated += generated.len() as u64;

        let assignments: Vec<AssignmentOutcome> = input
            .assignments
            .into_iter()
            .map(|req| self.submit(req, now))
            .collect();

        let decision_points = apply_decisions(
            &mut self.world,
            &mut self.orders,
            &self.layout,
            &self.config,
            &self.board,
            &input.decisions,
            now,
            &mut self.stats,
        );

        movement_system(&mut self.world, self.config.energy_per_unit, &mut self.stats);
        arrival_system(
            &mut self.world,
            &mut self.orders,
            &self.layout,
            &self.config,
            now,
            &mut self.stats,
        );

        energy_system(
            &mut self.world,
            &self.orders,
            &self.layout,
            &self.config,
            &mut self.stats,
        );

        let cancelled = deadline_system(
            &mut self.world,
            &mut self.orders,
            &self.layout,
            &sla,
            now,
            &mut self.stats,
        );
        let purged = self
            .orders
            .purge_terminal(now, self.config.terminal_retention_steps);
        if purged > 0 {
            debug!("purged {} terminal orders at step {}", purged, now);
        }
        drop_stale_commitments(&mut self.world, &self.orders, &self.layout, &mut self.stats);

        detect_fatal(&self.world, &self.orders, &self.layout)?;
        let repairs = enforce_invariants(&mut self.world, &self.orders, &self.layout, &mut self.stats);

        self.publish();
        self.time += 1;

        let info = StepInfo {
            step: now,
            generated,
            cancelled,
            assignments,
            decision_points,
            repairs,
            purged,
            order_counts: self.orders.counts(),
            stats: self.stats.clone(),
            truncated: self.time >= self.config.episode_steps,
        };
        Ok(StepOutcome {
            snapshot: self.snapshot(),
            info,
        })
    }

    fn submit(&mut self, req: AssignmentRequest, now: u64) -> AssignmentOutcome {
        let result = assign_batch(
            &mut self.world,
            &mut self.orders,
            &self.layout,
            self.config.strategy,
            req.drone,
            &req.orders,
            req.allow_override,
            now,
        );
        match &result {
            Ok(()) => self.stats.assignments_accepted += 1,
            Err(err) => {
                debug!("assignment to drone {} rejected: {}", req.drone, err);
                self.stats.assignments_rejected += 1;
            }
        }
        AssignmentOutcome {
            drone: req.drone,
            orders: req.orders,
            result,
        }
    }

    fn publish(&mut self) {
        self.board = publish_candidates(
            &self.world,
            &self.orders,
            &self.layout,
            self.config.num_candidates,
        );
    }

    /// Assign one `Ready` order to a drone immediately, outside the tick.
    pub fn assign(
        &mut self,
        drone: DroneId,
        order: OrderId,
        allow_override: bool,
    ) -> Result<(), InvalidAssignment> {
        self.assign_batch(drone, &[order], allow_override)
    }

    pub fn assign_batch(
        &mut self,
        drone: DroneId,
        orders: &[OrderId],
        allow_override: bool,
    ) -> Result<(), InvalidAssignment> {
        let outcome = self.submit(
            AssignmentRequest {
                drone,
                orders: orders.to_vec(),
                allow_override,
            },
            self.time,
        );
        outcome.result
    }

    /// Replace a drone's stop list with a caller-ordered plan.
    pub fn set_itinerary(&mut self, drone: DroneId, stops: Vec<Stop>) -> Result<(), ItineraryError> {
        set_itinerary(&mut self.world, &self.orders, &self.layout, drone, stops)
    }

    /// Inject an order at `merchant` outside the stochastic generator.
    pub fn spawn_order(
        &mut self,
        merchant: MerchantId,
        customer: Vec2,
        preparation_steps: u64,
    ) -> Option<OrderId> {
        let id = spawn_order(
            &mut self.world,
            &mut self.orders,
            &self.layout,
            merchant,
            customer,
            preparation_steps,
            self.time,
        )?;
        self.stats.orders_generated += 1;
        self.publish();
        Some(id)
    }

    pub fn is_decision_point(&self, drone: DroneId) -> bool {
        self.layout.drone(drone).is_some_and(|e| {
            is_decision_point(
                &self.world,
                &self.orders,
                e,
                self.config.strategy,
                self.config.arrival_threshold,
            )
        })
    }

    /// Candidates ranked against the current state.
    pub fn candidates(&self, drone: DroneId) -> Vec<Candidate> {
        build_candidates(
            &self.world,
            &self.orders,
            &self.layout,
            drone,
            self.config.num_candidates,
        )
    }

    /// Candidates published at the end of the last tick; what decisions index.
    pub fn published_candidates(&self, drone: DroneId) -> &[Candidate] {
        self.board
            .get(drone as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn consistency_issues(&self) -> Vec<ConsistencyIssue> {
        consistency_issues(&self.world, &self.orders, &self.layout)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let sla = self.config.sla();
        let drones = self
            .layout
            .drone_ids()
            .filter_map(|(id, _)| self.drone_snapshot(id))
            .collect();
        let merchants = self
            .layout
            .merchants
            .iter()
            .filter_map(|&e| {
                let merchant = self.world.get::<&Merchant>(e).ok()?;
                let pos = self.world.get::<&Position>(e).ok()?;
                Some(MerchantSnapshot {
                    id: merchant.id,
                    location: pos.location,
                    efficiency: merchant.efficiency,
                    queued: merchant.queue.len(),
                })
            })
            .collect();

        WorldSnapshot {
            step: self.time,
            drones,
            orders: self
                .orders
                .iter()
                .map(|o| OrderSnapshot::from_order(o, &sla))
                .collect(),
            merchants,
            bases: self.layout.bases.clone(),
        }
    }

    pub fn drone_snapshot(&self, id: DroneId) -> Option<DroneSnapshot> {
        let entity = self.layout.drone(id)?;
        let drone = self.world.get::<&Drone>(entity).ok()?;
        let location = self.world.get::<&Position>(entity).ok()?.location;
        let mode = mode_of(&self.world, entity);
        let cargo: Vec<OrderId> = self
            .world
            .get::<&Cargo>(entity)
            .map(|c| c.orders.iter().copied().collect())
            .unwrap_or_default();
        let pending: Vec<OrderId> = self.orders.pending_pickups(id).map(|o| o.id).collect();
        let can_accept_more = drone.status.is_assignable()
            && pending.is_empty()
            && cargo.len() < drone.capacity;

        Some(DroneSnapshot {
            id,
            location,
            status: drone.status,
            mode: mode.kind(),
            serving_order_id: mode.serving_order_id(),
            target: target_of(&self.world, entity),
            cargo,
            pending_pickups: pending,
            capacity: drone.capacity,
            battery: drone.battery,
            speed_multiplier: drone.speed_multiplier,
            can_accept_more,
            decision_point: is_decision_point(
                &self.world,
                &self.orders,
                entity,
                self.config.strategy,
                self.config.arrival_threshold,
            ),
            candidates: self.published_candidates(id).to_vec(),
        })
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn orders(&self) -> &OrderBook {
        &self.orders
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn layout(&self) -> &FleetLayout {
        &self.layout
    }

    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Next step to be simulated.
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn is_truncated(&self) -> bool {
        self.time >= self.config.episode_steps
    }
}
