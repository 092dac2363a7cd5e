//! World Setup
//!
//! A grid-based reference host and the demo scenario the binary runs.

mod grid;
mod scenario;

pub use grid::{EncounterRecord, GridCaravan, GridWorld};
pub use scenario::{demo_world, CIVIL_OUTLANDERS, PIRATES, PLAYER, ROUGH_OUTLANDERS, TRIBE};
