//! Components and value types shared by the engine and the world
//!
//! Locations, identifiers and the hecs components of the reference world.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identity
// ============================================================================

/// Opaque handle for an entity in the host world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A square, independently-threaded partition of one world
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl RegionId {
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self { world: world.into(), x, z }
    }

    /// Region containing `location` for a partition of edge `size`.
    /// Coordinates past the `i32` range land in the outermost region on that
    /// side, and a NaN coordinate lands in region 0.
    pub fn containing(location: &Location, size: f64) -> Self {
        Self {
            world: location.world.clone(),
            x: region_index(location.x, size),
            z: region_index(location.z, size),
        }
    }
}

fn region_index(coord: f64, size: f64) -> i32 {
    let index = (coord / size).floor();
    if index.is_nan() {
        return 0;
    }
    index.clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{},{}]", self.world, self.x, self.z)
    }
}

// ============================================================================
// Space
// ============================================================================

/// World name plus a 3D coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self { world: world.into(), x, y, z }
    }

    /// Euclidean distance, or `None` when the locations are in different worlds
    pub fn distance(&self, other: &Location) -> Option<f64> {
        if self.world != other.world {
            return None;
        }
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    /// Inclusive radius check; always false across worlds
    pub fn within(&self, other: &Location, radius: f64) -> bool {
        self.distance(other).is_some_and(|d| d <= radius)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:.1}, {:.1}, {:.1})", self.world, self.x, self.y, self.z)
    }
}

// ============================================================================
// Reference world components
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Position(pub Location);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub current: f64,
    pub max: f64,
}

impl Health {
    pub fn new(max: f64) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    /// Lower health by `amount`, never below zero
    pub fn take(&mut self, amount: f64) {
        self.current = (self.current - amount).max(0.0);
    }
}

/// Marker for player-like actors that can be credited with damage
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub name: String,
    pub online: bool,
}

/// Most recent damage application, kept for inspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LastDamage {
    pub amount: f64,
    pub attacker: Option<EntityId>,
}
