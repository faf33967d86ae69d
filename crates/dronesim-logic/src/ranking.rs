//! Candidate ranking for per-drone task selection.
//!
//! Tiers are exhausted in order: committed cargo first, then pickups the
//! drone already owns, then fresh `Ready` work. Keeping the `Ready` tier is
//! what lets a drone that finished everything pick up new work at all.

use serde::{Deserialize, Serialize};

use crate::OrderId;

/// Priority tier of a candidate (lower sorts first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CandidateTier {
    /// `PickedUp` and in this drone's cargo.
    Cargo,
    /// `Assigned` to this drone, awaiting pickup.
    Assigned,
    /// `Ready` and unassigned.
    Ready,
}

/// Raw candidate before ranking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateEntry {
    pub order_id: OrderId,
    pub tier: CandidateTier,
    /// Ranking distance: to the customer for cargo, to the merchant otherwise.
    pub distance: f32,
    pub ready_step: u64,
}

/// One slot of a drone's candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Candidate {
    Order {
        order_id: OrderId,
        /// Selecting this slot would commit a fresh assignment.
        is_new_assignment: bool,
    },
    /// Padding sentinel.
    NoOp,
}

impl Candidate {
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Candidate::Order { order_id, .. } => Some(*order_id),
            Candidate::NoOp => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Candidate::Order { .. })
    }
}

/// Sort entries by tier, then distance, then readiness and id; truncate to
/// `k` and pad with [`Candidate::NoOp`].
pub fn rank_candidates(mut entries: Vec<CandidateEntry>, k: usize) -> Vec<Candidate> {
    entries.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then(a.distance.total_cmp(&b.distance))
            .then(a.ready_step.cmp(&b.ready_step))
            .then(a.order_id.cmp(&b.order_id))
    });

    let mut ranked: Vec<Candidate> = entries
        .iter()
        .take(k)
        .map(|e| Candidate::Order {
            order_id: e.order_id,
            is_new_assignment: e.tier == CandidateTier::Ready,
        })
        .collect();
    ranked.resize(k, Candidate::NoOp);
    ranked
}

/// Number of real (non-sentinel) slots.
pub fn valid_count(candidates: &[Candidate]) -> usize {
    candidates.iter().filter(|c| c.is_valid()).count()
}
