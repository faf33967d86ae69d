//! Merchant components.

use std::collections::VecDeque;

use dronesim_logic::{MerchantId, OrderId};
use serde::{Deserialize, Serialize};

/// A merchant preparing orders.
///
/// Orders wait in `queue` in arrival order while `Accepted`; the readiness
/// system releases them once their preparation time has elapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    /// Preparation speed scale; above 1.0 is slower.
    pub efficiency: f32,
    pub queue: VecDeque<OrderId>,
}

impl Merchant {
    pub fn new(id: MerchantId, efficiency: f32) -> Self {
        Self {
            id,
            efficiency,
            queue: VecDeque::new(),
        }
    }

    /// Preparation steps for an order given the configured base time.
    pub fn preparation_steps(&self, base: u64) -> u64 {
        (base as f32 * self.efficiency).round().max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preparation_scales_with_efficiency() {
        assert_eq!(Merchant::new(0, 1.0).preparation_steps(3), 3);
        assert_eq!(Merchant::new(0, 1.2).preparation_steps(3), 4);
        assert_eq!(Merchant::new(0, 0.8).preparation_steps(3), 2);
        assert_eq!(Merchant::new(0, 0.8).preparation_steps(0), 0);
    }
}
