//! Simulation configuration.
//!
//! Every field has a default so a partial JSON document is a valid config.

use dronesim_logic::constants::*;
use dronesim_logic::deadline::{worst_case_trip_steps, OnTimeRule, SlaPolicy};
use dronesim_logic::geometry::Vec2;
use dronesim_logic::selection::FallbackPolicy;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which execution mode new work is routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionStrategy {
    /// Batches become ordered stop lists; decisions are ignored.
    Itinerary,
    /// Per-drone decisions pick the order to serve.
    TaskSelection,
    /// Earliest-ready resolution only; decisions are ignored.
    LegacyOnly,
    /// Task selection, with legacy resolution for drones left without a decision.
    #[default]
    Auto,
}

impl ExecutionStrategy {
    pub fn accepts_decisions(&self) -> bool {
        matches!(
            self,
            ExecutionStrategy::TaskSelection | ExecutionStrategy::Auto
        )
    }

    pub fn allows_legacy(&self) -> bool {
        matches!(self, ExecutionStrategy::LegacyOnly | ExecutionStrategy::Auto)
    }
}

/// A merchant placed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MerchantSite {
    pub location: Vec2,
    #[serde(default = "unit_efficiency")]
    pub efficiency: f32,
}

fn unit_efficiency() -> f32 {
    1.0
}

/// Fixed placement of merchants and bases, overriding random layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub merchants: Vec<MerchantSite>,
    pub bases: Vec<Vec2>,
    /// Drone start locations; drones start at their base when absent.
    #[serde(default)]
    pub drone_starts: Vec<Vec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub grid_size: f32,
    pub num_drones: usize,
    pub num_merchants: usize,
    pub num_bases: usize,
    pub drone_capacity: usize,
    pub drone_speed: f32,
    pub arrival_threshold: f32,

    pub sla_steps: u64,
    pub timeout_factor: u64,
    pub on_time_rule: OnTimeRule,

    pub num_candidates: usize,
    pub strategy: ExecutionStrategy,
    pub fallback: FallbackPolicy,

    /// Per-merchant chance of a new order each step
    pub order_rate: f64,
    pub max_active_orders: usize,
    pub base_preparation_steps: u64,
    pub preparation_jitter_steps: u64,
    pub min_efficiency: f32,
    pub max_efficiency: f32,

    pub energy_per_unit: f32,
    pub low_battery_threshold: f32,
    pub charge_rate: f32,

    /// Steps a terminal order stays visible before it is purged
    pub terminal_retention_steps: u64,
    pub episode_steps: u64,

    pub layout: Option<LayoutConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            grid_size: GRID_SIZE,
            num_drones: 6,
            num_merchants: 12,
            num_bases: 2,
            drone_capacity: DRONE_CAPACITY,
            drone_speed: DRONE_SPEED,
            arrival_threshold: ARRIVAL_THRESHOLD,
            sla_steps: SLA_STEPS,
            timeout_factor: TIMEOUT_FACTOR,
            on_time_rule: OnTimeRule::default(),
            num_candidates: NUM_CANDIDATES,
            strategy: ExecutionStrategy::default(),
            fallback: FallbackPolicy::default(),
            order_rate: 0.05,
            max_active_orders: 100,
            base_preparation_steps: 3,
            preparation_jitter_steps: 2,
            min_efficiency: 0.8,
            max_efficiency: 1.2,
            energy_per_unit: ENERGY_PER_UNIT,
            low_battery_threshold: LOW_BATTERY_THRESHOLD,
            charge_rate: CHARGE_RATE,
            terminal_retention_steps: 64,
            episode_steps: 512,
            layout: None,
        }
    }
}

impl SimConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn sla(&self) -> SlaPolicy {
        SlaPolicy::new(self.sla_steps, self.timeout_factor).with_rule(self.on_time_rule)
    }

    pub fn merchant_count(&self) -> usize {
        self.layout
            .as_ref()
            .map_or(self.num_merchants, |l| l.merchants.len())
    }

    pub fn base_count(&self) -> usize {
        self.layout.as_ref().map_or(self.num_bases, |l| l.bases.len())
    }

    /// Reject configurations the engine cannot run; warn on poor tuning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(self.grid_size > 0.0) {
            return invalid("grid_size must be positive");
        }
        if self.num_drones == 0 {
            return invalid("num_drones must be at least 1");
        }
        if self.base_count() == 0 {
            return invalid("at least one base is required");
        }
        if self.drone_capacity == 0 {
            return invalid("drone_capacity must be at least 1");
        }
        if !(self.drone_speed > 0.0) {
            return invalid("drone_speed must be positive");
        }
        if !(self.arrival_threshold > 0.0) {
            return invalid("arrival_threshold must be positive");
        }
        if self.sla_steps == 0 || self.timeout_factor == 0 {
            return invalid("sla_steps and timeout_factor must be at least 1");
        }
        if self.num_candidates == 0 {
            return invalid("num_candidates must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.order_rate) {
            return invalid("order_rate must be within [0, 1]");
        }
        if !(self.min_efficiency > 0.0) || self.min_efficiency > self.max_efficiency {
            return invalid("efficiency range must be positive and ordered");
        }
        if let Some(layout) = &self.layout {
            if layout.merchants.iter().any(|m| !(m.efficiency > 0.0)) {
                return invalid("merchant efficiency must be positive");
            }
            if !layout.drone_starts.is_empty() && layout.drone_starts.len() != self.num_drones {
                return invalid("drone_starts must list one location per drone");
            }
        }

        let max_preparation = (self.base_preparation_steps as f32 * self.max_efficiency).round()
            as u64
            + self.preparation_jitter_steps;
        let worst_trip = worst_case_trip_steps(self.grid_size, self.drone_speed, max_preparation);
        let window = self.sla().timeout_window();
        if window < worst_trip {
            warn!(
                "timeout window {} steps is shorter than worst-case trip {} steps; far orders will time out",
                window, worst_trip
            );
        }
        Ok(())
    }
}
