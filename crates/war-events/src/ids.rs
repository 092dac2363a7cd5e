//! Arena Identifiers
//!
//! Stable integer keys for everything the simulation refers to across ticks.
//! References are always resolved through a lookup, so a destroyed referent
//! degrades to "not found" instead of a dangling handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tile on the world graph. Settlements are unique per tile, so a tile also
/// serves as a settlement key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(pub u32);

/// A faction known to the host world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub u32);

/// A mobile agent owned by the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u64);

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile_{}", self.0)
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction_{}", self.0)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent_{:06}", self.0)
    }
}

impl From<u32> for TileId {
    fn from(v: u32) -> Self {
        TileId(v)
    }
}

impl From<u32> for FactionId {
    fn from(v: u32) -> Self {
        FactionId(v)
    }
}
