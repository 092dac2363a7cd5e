//! Save and restore.
//!
//! A snapshot is the full [`SimulationState`] plus the event id counter and
//! a fresh RNG seed, written as pretty JSON. Taking a snapshot reseeds the
//! running simulation from that seed, so a run restored from it draws the
//! same numbers as the run that saved it. Restoring against a host prunes
//! every reference whose referent no longer exists.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

use crate::agent::TargetRef;
use crate::config::SimConfig;
use crate::dispatcher::Simulation;
use crate::error::SnapshotError;
use crate::host::WorldHost;
use crate::state::SimulationState;
use crate::SimRng;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub version: u32,
    pub next_event_id: u64,
    /// Seed both the saving and the restored run continue from
    pub rng_seed: u64,
    pub state: SimulationState,
}

impl SimulationSnapshot {
    pub fn capture(sim: &Simulation, rng_seed: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            next_event_id: sim.events.next_event_id(),
            rng_seed,
            state: sim.state.clone(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Self = serde_json::from_reader(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(snapshot)
    }
}

impl Simulation {
    /// Captures the current state and reseeds the RNG from the seed stored
    /// in the snapshot.
    pub fn snapshot(&mut self) -> SimulationSnapshot {
        let rng_seed: u64 = self.rng.0.gen();
        self.rng = SimRng::seeded(rng_seed);
        SimulationSnapshot::capture(self, rng_seed)
    }

    /// Rebuilds a simulation from a snapshot, dropping settlement records,
    /// homes and destinations that no longer exist in `host`.
    pub fn restore(config: SimConfig, snapshot: SimulationSnapshot, host: &dyn WorldHost) -> Self {
        let mut state = snapshot.state;
        prune(&mut state, host);
        info!(
            "Restored tick {} with {} factions and {} agents",
            state.tick,
            state.profiles.len(),
            state.agents.len()
        );
        Simulation::from_state(config, snapshot.rng_seed, state, snapshot.next_event_id)
    }
}

fn prune(state: &mut SimulationState, host: &dyn WorldHost) {
    for profile in state.profiles.values_mut() {
        let faction = profile.faction;
        profile.settlements.retain(|s| {
            let present = host.settlement_at(s.tile) == Some(faction);
            if !present {
                debug!("Dropping vanished settlement record {}", s.tile);
            }
            present
        });
        for settlement in profile.settlements.iter_mut() {
            settlement.nearby_hostile.retain(|t| host.settlement_at(*t).is_some());
            settlement.nearby_friendly.retain(|t| host.settlement_at(*t).is_some());
        }
    }

    // Agent targets are left to the dead-destination check on the next tick
    for agent in state.agents.values_mut() {
        let alive = match agent.destination {
            Some(TargetRef::Settlement(tile)) => host.settlement_at(tile).is_some(),
            Some(TargetRef::Caravan(id)) => host.caravan(id).is_some(),
            Some(TargetRef::Agent(_)) | Some(TargetRef::Site(_)) | None => true,
        };
        if !alive {
            debug!("{} lost its destination on restore", agent.id);
            agent.destination = None;
            agent.path.stop_dead();
        }
        let home_ok = agent
            .home
            .zip(agent.faction)
            .is_some_and(|(home, faction)| host.settlement_at(home) == Some(faction));
        if !home_ok {
            agent.home = None;
        }
    }

    if let Some(rival) = state.victory.rival {
        if !state.profiles.contains_key(&rival) {
            state.victory.rival = None;
        }
    }
}
