//! Turning an external selection into a candidate slot.
//!
//! Decision sources may speak in slot indices or in continuous values in
//! `[-1, 1]` (one bin per slot). Invalid selections never raise; callers
//! fall back through [`fallback_index`].

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_SPEED_MULTIPLIER, MIN_SPEED_MULTIPLIER};
use crate::ranking::Candidate;
use crate::OrderId;

/// Deterministic replacement for an invalid selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// Prefer a candidate already in cargo, else the first valid one.
    #[default]
    CargoFirst,
    FirstValid,
    /// Leave the drone untouched.
    None,
}

/// Map a raw choice in `[-1, 1]` onto one of `k` equal bins.
pub fn decode_choice(raw: f32, k: usize) -> usize {
    if k == 0 || !raw.is_finite() {
        return 0;
    }
    let scaled = ((raw.clamp(-1.0, 1.0) + 1.0) / 2.0 * k as f32).floor();
    (scaled.max(0.0) as usize).min(k - 1)
}

/// Center of the bin for slot `index`; inverse of [`decode_choice`].
pub fn encode_slot(index: usize, k: usize) -> f32 {
    if k == 0 {
        return -1.0;
    }
    ((index as f32 + 0.5) * 2.0 / k as f32 - 1.0).clamp(-1.0, 1.0)
}

/// Map a raw speed in `[-1, 1]` onto the speed multiplier range.
pub fn speed_multiplier(raw: f32) -> f32 {
    if !raw.is_finite() {
        return 1.0;
    }
    let t = (raw.clamp(-1.0, 1.0) + 1.0) / 2.0;
    MIN_SPEED_MULTIPLIER + t * (MAX_SPEED_MULTIPLIER - MIN_SPEED_MULTIPLIER)
}

/// Pick a replacement slot under `policy`.
pub fn fallback_index(
    policy: FallbackPolicy,
    candidates: &[Candidate],
    in_cargo: impl Fn(OrderId) -> bool,
) -> Option<usize> {
    let first_valid = || candidates.iter().position(Candidate::is_valid);
    match policy {
        FallbackPolicy::None => None,
        FallbackPolicy::FirstValid => first_valid(),
        FallbackPolicy::CargoFirst => candidates
            .iter()
            .position(|c| c.order_id().is_some_and(&in_cargo))
            .or_else(first_valid),
    }
}
