//! Shared identifiers, time helpers and event records for the faction-war simulation.
//!
//! This crate contains pure data structures with no simulation logic.
//! It is a dependency for all other crates in the workspace.

pub mod event;
pub mod ids;
pub mod timestamp;

// Re-export id types
pub use ids::{AgentId, FactionId, TileId};

// Re-export timestamp types
pub use timestamp::{
    local_hour, DayPhase, ParseTimestampError, SimTimestamp, HOURS_PER_DAY, REST_END_HOUR,
    REST_START_HOUR, TICKS_PER_DAY, TICKS_PER_HOUR,
};

// Re-export event types
pub use event::*;
