//! Deadline and on-time arithmetic.
//!
//! All times are simulation steps. An order's clock starts when it becomes
//! ready, not when it is created: preparation time is the merchant's cost.

use serde::{Deserialize, Serialize};

/// How a delivery is judged on time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnTimeRule {
    /// `delivery <= ready + sla * timeout_factor`
    #[default]
    WithinDeadline,
    /// `delivery <= ready + sla`
    WithinSla,
}

/// Deadline/SLA parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub sla_steps: u64,
    pub timeout_factor: u64,
    pub on_time_rule: OnTimeRule,
}

impl SlaPolicy {
    pub fn new(sla_steps: u64, timeout_factor: u64) -> Self {
        Self {
            sla_steps,
            timeout_factor,
            on_time_rule: OnTimeRule::default(),
        }
    }

    pub fn with_rule(mut self, rule: OnTimeRule) -> Self {
        self.on_time_rule = rule;
        self
    }

    /// Steps between readiness and cancellation.
    pub fn timeout_window(&self) -> u64 {
        self.sla_steps.saturating_mul(self.timeout_factor)
    }

    pub fn deadline(&self, ready_step: u64) -> u64 {
        ready_step.saturating_add(self.timeout_window())
    }

    /// An uncollected order is cancelled once `now` reaches its deadline.
    pub fn is_expired(&self, ready_step: u64, now: u64) -> bool {
        now >= self.deadline(ready_step)
    }

    pub fn is_on_time(&self, ready_step: u64, delivery_step: u64) -> bool {
        let limit = match self.on_time_rule {
            OnTimeRule::WithinDeadline => self.deadline(ready_step),
            OnTimeRule::WithinSla => ready_step.saturating_add(self.sla_steps),
        };
        delivery_step <= limit
    }

    /// Steps left before the deadline (0 once expired).
    pub fn slack(&self, ready_step: u64, now: u64) -> u64 {
        self.deadline(ready_step).saturating_sub(now)
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self::new(crate::constants::SLA_STEPS, crate::constants::TIMEOUT_FACTOR)
    }
}

/// Lower bound on a single delivery trip, used to sanity-check tuning.
///
/// Sum of the longest merchant leg and customer leg across the service
/// area, the worst preparation time, and one step each for pickup and
/// delivery.
pub fn worst_case_trip_steps(grid_size: f32, speed: f32, max_preparation_steps: u64) -> u64 {
    if speed <= 0.0 {
        return u64::MAX;
    }
    let diagonal = grid_size * std::f32::consts::SQRT_2;
    let leg = (diagonal / speed).ceil() as u64;
    leg * 2 + max_preparation_steps + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_window() {
        let sla = SlaPolicy::new(6, 8);
        assert_eq!(sla.timeout_window(), 48);
        assert_eq!(sla.deadline(0), 48);
        assert_eq!(sla.deadline(10), 58);
    }

    #[test]
    fn test_expiry_is_inclusive_of_deadline_step() {
        let sla = SlaPolicy::new(6, 8);
        assert!(!sla.is_expired(0, 47));
        assert!(sla.is_expired(0, 48));
    }

    #[test]
    fn test_on_time_rules() {
        let deadline_rule = SlaPolicy::new(6, 8);
        assert!(deadline_rule.is_on_time(0, 20));
        assert!(deadline_rule.is_on_time(0, 48));
        assert!(!deadline_rule.is_on_time(0, 49));

        let sla_rule = SlaPolicy::new(6, 8).with_rule(OnTimeRule::WithinSla);
        assert!(sla_rule.is_on_time(0, 6));
        assert!(!sla_rule.is_on_time(0, 20));
    }

    #[test]
    fn test_slack_saturates() {
        let sla = SlaPolicy::new(6, 8);
        assert_eq!(sla.slack(0, 40), 8);
        assert_eq!(sla.slack(0, 60), 0);
    }

    #[test]
    fn test_worst_case_trip() {
        // 16 * sqrt(2) ≈ 22.6 → 23 steps per leg
        assert_eq!(worst_case_trip_steps(16.0, 1.0, 5), 23 * 2 + 5 + 2);
        assert_eq!(worst_case_trip_steps(16.0, 0.0, 5), u64::MAX);
    }
}
