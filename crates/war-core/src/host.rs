//! Host environment contracts.
//!
//! The core never owns the tile graph, the world-object registry, faction
//! relations or the encounter mechanics. A host provides them through the
//! traits below; [`WorldHost`] bundles all of them so the dispatcher can take a
//! single `&mut dyn WorldHost`.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use war_events::{FactionId, TileId};

use crate::agent::Agent;
use crate::faction::BehaviorCategory;
use crate::settlement::Settlement;

/// Stable id of a host-owned caravan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaravanId(pub u64);

/// What kind of host object sits on a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectKind {
    Settlement,
    /// A caravan moving over the map. `visibility` scales the range at which
    /// it can be spotted.
    Caravan {
        id: CaravanId,
        wealth: i64,
        visibility: f32,
    },
}

/// A host world object as seen by range queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldObject {
    pub tile: TileId,
    pub faction: Option<FactionId>,
    pub kind: ObjectKind,
}

/// Faction as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactionInfo {
    pub id: FactionId,
    /// Definition name used to look up static behavior
    pub def_name: String,
    pub name: String,
    pub is_player: bool,
    pub permanent_enemy: bool,
    /// Hidden factions never become the victory rival
    pub hidden: bool,
}

/// Surviving power of both sides after a peer battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleOutcome {
    pub attacker_power: i64,
    pub defender_power: i64,
}

/// Tile graph queries and movement costs.
pub trait TileGraph {
    /// Traversal distance between two tiles.
    fn distance(&self, a: TileId, b: TileId) -> u32;

    /// Next tile on the way from `from` to `to`, `None` if unreachable or
    /// already there.
    fn next_step(&self, from: TileId, to: TileId) -> Option<TileId>;

    /// Cost multiplier for a single step.
    fn step_difficulty(&self, _from: TileId, _to: TileId) -> f32 {
        1.0
    }

    /// Whether `tile` is inside its local resting hours at `tick`.
    fn is_resting_at(&self, tile: TileId, tick: u64) -> bool;

    /// Whether a destination can be pushed to without stopping for the night.
    fn is_valid_final_push(&self, _tile: TileId) -> bool {
        true
    }

    /// Additive growth bonus of the biome at `tile`.
    fn biome_multiplier(&self, _tile: TileId) -> f32 {
        0.0
    }

    /// Picks an unclaimed tile between `min_distance` and `max_distance` of
    /// `origin`.
    fn find_new_site(
        &self,
        origin: TileId,
        min_distance: u32,
        max_distance: u32,
        rng: &mut dyn RngCore,
    ) -> Option<TileId>;
}

/// Authoritative registry of host world objects.
pub trait EntityRegistry {
    fn objects_in_range(&self, tile: TileId, radius: u32) -> Vec<WorldObject>;

    /// Owner of the settlement at `tile`, if one exists.
    fn settlement_at(&self, tile: TileId) -> Option<FactionId>;

    /// Every settlement in the world with its owner.
    fn settlements(&self) -> Vec<(TileId, FactionId)>;

    fn caravan(&self, id: CaravanId) -> Option<WorldObject>;

    /// Whether the tile currently hosts an active map presence.
    fn has_map_presence(&self, tile: TileId) -> bool;
}

/// Faction relations.
pub trait FactionDirectory {
    fn factions(&self) -> Vec<FactionInfo>;

    fn is_hostile(&self, a: FactionId, b: FactionId) -> bool;

    fn adjust_relationship(&mut self, a: FactionId, b: FactionId, delta: i32);

    /// Growth multiplier for a faction's technology level.
    fn tech_multiplier(&self, _faction: FactionId) -> f32 {
        1.0
    }

    fn player_faction(&self) -> Option<FactionId> {
        self.factions().into_iter().find(|f| f.is_player).map(|f| f.id)
    }
}

/// Encounter mechanics. Calls are fire-and-forget except for the battle,
/// which reports surviving strength, and settlement founding.
pub trait EncounterResolver {
    fn raid_settlement(&mut self, agent: &Agent, target: TileId);
    fn raid_caravan(&mut self, agent: &Agent, target: CaravanId);
    fn resolve_battle(&mut self, attacker: &Agent, defender: &Agent) -> BattleOutcome;
    /// Attack on a settlement of another AI faction. Returns the points the
    /// defender lost.
    fn resolve_world_engagement(&mut self, agent: &Agent, target: TileId) -> i64;
    fn trade_with_player_settlement(&mut self, agent: &Agent, target: TileId);
    fn trade_with_caravan(&mut self, agent: &Agent, target: CaravanId);
    fn trade_with_settlement(&mut self, agent: &Agent, target: TileId);
    fn trade_with_agent(&mut self, agent: &Agent, other: &Agent);
    fn conduct_diplomacy(&mut self, agent: &Agent, target: TileId);
    /// Founds a settlement for the agent's faction. Returns false if the tile
    /// could not be claimed.
    fn found_settlement(&mut self, agent: &Agent, tile: TileId) -> bool;
}

/// Point cost functions.
pub trait PointCosts {
    fn raid_cost(&self, target: &Settlement) -> i64;
    fn diplomat_cost(&self, origin: &Settlement) -> i64;
    fn scout_cost(&self, behavior: BehaviorCategory, target_power: i64) -> i64;
    fn initial_settlement_power(&self, faction: FactionId) -> i64;
}

/// Everything the simulation needs from its host.
pub trait WorldHost: TileGraph + EntityRegistry + FactionDirectory + EncounterResolver + PointCosts {}

impl<T> WorldHost for T where
    T: TileGraph + EntityRegistry + FactionDirectory + EncounterResolver + PointCosts
{
}
