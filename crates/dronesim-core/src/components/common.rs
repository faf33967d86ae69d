//! Common components used across multiple entity types.

use dronesim_logic::geometry::Vec2;
use serde::{Deserialize, Serialize};

/// Location on the service grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub location: Vec2,
}

impl Position {
    pub fn new(location: Vec2) -> Self {
        Self { location }
    }
}

/// Current flight target. Present only while the drone has somewhere to be.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub destination: Vec2,
}

impl Movement {
    pub fn to(destination: Vec2) -> Self {
        Self { destination }
    }
}
