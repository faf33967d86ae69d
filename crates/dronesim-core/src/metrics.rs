//! Episode counters.

use dronesim_logic::gate::BlockReason;
use serde::{Deserialize, Serialize};

/// Refused gate attempts by reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounters {
    pub wrong_drone: u64,
    pub wrong_merchant: u64,
    pub wrong_status: u64,
    pub not_in_cargo: u64,
}

impl BlockCounters {
    pub fn record(&mut self, reason: BlockReason) {
        match reason {
            BlockReason::WrongDrone => self.wrong_drone += 1,
            BlockReason::WrongMerchant => self.wrong_merchant += 1,
            BlockReason::WrongStatus => self.wrong_status += 1,
            BlockReason::NotInCargo => self.not_in_cargo += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.wrong_drone + self.wrong_merchant + self.wrong_status + self.not_in_cargo
    }
}

/// Cargo drift corrected by the invariant enforcer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub added_to_cargo: u64,
    pub removed_from_cargo: u64,
}

impl RepairReport {
    pub fn total(&self) -> u64 {
        self.added_to_cargo + self.removed_from_cargo
    }
}

/// Running totals since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub orders_generated: u64,
    pub orders_ready: u64,
    pub orders_delivered: u64,
    pub orders_cancelled: u64,
    pub on_time_deliveries: u64,
    pub pickups: u64,

    pub assignments_accepted: u64,
    pub assignments_rejected: u64,

    pub decision_points: u64,
    pub decisions_applied: u64,
    pub decisions_invalid: u64,
    pub fallbacks_used: u64,
    pub stale_commitments_dropped: u64,

    pub legacy_engaged: u64,
    /// Drones left idle with work because legacy resolution was disabled
    pub legacy_blocked: u64,

    pub pickups_blocked: BlockCounters,
    pub deliveries_blocked: BlockCounters,
    pub repairs: RepairReport,

    pub flight_distance: f64,
    pub energy_used: f64,
    pub charge_cycles: u64,
}

impl EpisodeStats {
    pub fn on_time_rate(&self) -> f64 {
        if self.orders_delivered == 0 {
            0.0
        } else {
            self.on_time_deliveries as f64 / self.orders_delivered as f64
        }
    }

    /// Share of finished orders that were delivered rather than cancelled.
    pub fn completion_rate(&self) -> f64 {
        let finished = self.orders_delivered + self.orders_cancelled;
        if finished == 0 {
            0.0
        } else {
            self.orders_delivered as f64 / finished as f64
        }
    }
}
