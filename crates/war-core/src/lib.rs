//! Faction War Simulation Library
//!
//! Tick-driven strategic layer of a faction-conflict world: settlements grow
//! and spend a point economy, a dispatcher picks weighted actions and spawns
//! agents, and agents travel, scan, fight, trade and report back.
//!
//! The world itself (tile graph, world objects, relations and encounter
//! mechanics) belongs to a host implementing [`host::WorldHost`].

use rand::rngs::SmallRng;
use rand::SeedableRng;

pub mod agent;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod faction;
pub mod host;
pub mod settlement;
pub mod setup;
pub mod snapshot;
pub mod state;
pub mod victory;

pub use agent::{Agent, TargetRef};
pub use config::SimConfig;
pub use dispatcher::{ActionOutcome, Simulation};
pub use error::{ConfigError, DispatchError, SnapshotError};
pub use faction::{BehaviorCategory, FactionProfile};
pub use host::WorldHost;
pub use settlement::Settlement;
pub use state::SimulationState;

/// Seeded random number generator shared by every simulation draw
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}
