//! Per-world simulation state.
//!
//! Owned by the [`Simulation`](crate::dispatcher::Simulation) and handed to
//! every dispatcher and agent operation. Created when a world loads, saved
//! through [`snapshot`](crate::snapshot), dropped with the world.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use war_events::{AgentId, FactionId, TileId};

use crate::agent::Agent;
use crate::faction::FactionProfile;
use crate::host::TileGraph;
use crate::settlement::Settlement;
use crate::victory::VictoryMonitor;

/// First tick of the per-settlement evaluation cadence.
const FIRST_LOCAL_EVALUATION_TICK: u64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub tick: u64,
    /// Factions have been discovered and profiled
    pub initialized: bool,
    pub profiles: BTreeMap<FactionId, FactionProfile>,
    pub agents: BTreeMap<AgentId, Agent>,
    pub victory: VictoryMonitor,
    pub next_local_evaluation_tick: u64,
    pub next_agent_id: u64,
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            tick: 0,
            initialized: false,
            profiles: BTreeMap::new(),
            agents: BTreeMap::new(),
            victory: VictoryMonitor::new(),
            next_local_evaluation_tick: FIRST_LOCAL_EVALUATION_TICK,
            next_agent_id: 1,
        }
    }
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_agent_id(&mut self) -> AgentId {
        let id = AgentId(self.next_agent_id);
        self.next_agent_id += 1;
        id
    }

    pub fn player_faction(&self) -> Option<FactionId> {
        self.profiles.values().find(|p| p.is_player()).map(|p| p.faction)
    }

    /// Faction whose profile holds a record at `tile`.
    pub fn settlement_owner(&self, tile: TileId) -> Option<FactionId> {
        self.profiles
            .values()
            .find(|p| p.settlement(tile).is_some())
            .map(|p| p.faction)
    }

    pub fn settlement(&self, tile: TileId) -> Option<&Settlement> {
        self.profiles.values().find_map(|p| p.settlement(tile))
    }

    pub fn settlement_mut(&mut self, tile: TileId) -> Option<&mut Settlement> {
        self.profiles.values_mut().find_map(|p| p.settlement_mut(tile))
    }

    /// Agents within `radius` of `tile`, in id order.
    pub fn agents_in_range<G: TileGraph + ?Sized>(
        &self,
        graph: &G,
        tile: TileId,
        radius: u32,
    ) -> Vec<AgentId> {
        self.agents
            .values()
            .filter(|a| graph.distance(a.position, tile) <= radius)
            .map(|a| a.id)
            .collect()
    }

    pub fn settlement_count(&self) -> usize {
        self.profiles.values().map(|p| p.settlements.len()).sum()
    }

    /// Summed balance of every settlement record.
    pub fn total_power(&self) -> i64 {
        self.profiles.values().map(FactionProfile::total_power).sum()
    }
}
