//! Grid World
//!
//! A rectangular reference host. Tiles are numbered row-major, distance is
//! Chebyshev (diagonal steps cost the same as straight ones) and local time
//! follows the tile's longitude. Encounter resolvers record what they were
//! asked to do so callers can inspect them afterwards.

use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use war_events::{local_hour, AgentId, DayPhase, EncounterKind, FactionId, TileId};

use crate::agent::Agent;
use crate::faction::BehaviorCategory;
use crate::host::{
    BattleOutcome, CaravanId, EncounterResolver, EntityRegistry, FactionDirectory, FactionInfo,
    ObjectKind, PointCosts, TileGraph, WorldObject,
};
use crate::settlement::Settlement;

/// Attempts made when sampling a new settlement site
const SITE_ATTEMPTS: usize = 30;

/// Goodwill applied by [`GridWorld::set_hostile`]
const HOSTILE_GOODWILL: i32 = -80;

/// Goodwill gained per diplomatic visit
const DIPLOMACY_GOODWILL: i32 = 10;

/// A caravan travelling the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCaravan {
    pub tile: TileId,
    pub faction: FactionId,
    pub wealth: i64,
    pub visibility: f32,
}

/// One resolver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncounterRecord {
    pub kind: EncounterKind,
    pub agent: AgentId,
    pub faction: Option<FactionId>,
    pub tile: TileId,
}

#[derive(Debug, Clone)]
pub struct GridWorld {
    pub width: u32,
    pub height: u32,
    /// Share of a settlement's power a raid against it costs
    pub raid_cost_ratio: f32,
    /// Opening balance of newly registered settlements
    pub initial_power: i64,
    factions: BTreeMap<FactionId, FactionInfo>,
    goodwill: BTreeMap<(FactionId, FactionId), i32>,
    settlements: BTreeMap<TileId, FactionId>,
    caravans: BTreeMap<CaravanId, GridCaravan>,
    biomes: BTreeMap<TileId, f32>,
    encounters: Vec<EncounterRecord>,
}

fn pair(a: FactionId, b: FactionId) -> (FactionId, FactionId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl GridWorld {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            raid_cost_ratio: 0.6,
            initial_power: 1_000,
            factions: BTreeMap::new(),
            goodwill: BTreeMap::new(),
            settlements: BTreeMap::new(),
            caravans: BTreeMap::new(),
            biomes: BTreeMap::new(),
            encounters: Vec::new(),
        }
    }

    pub fn tile(&self, x: u32, y: u32) -> TileId {
        TileId(y * self.width + x)
    }

    pub fn coords(&self, tile: TileId) -> (u32, u32) {
        (tile.0 % self.width, tile.0 / self.width)
    }

    fn contains(&self, tile: TileId) -> bool {
        tile.0 < self.width * self.height
    }

    /// Longitude in degrees, spanning the grid's width west to east.
    pub fn longitude(&self, tile: TileId) -> f32 {
        let (x, _) = self.coords(tile);
        x as f32 / self.width as f32 * 360.0 - 180.0
    }

    pub fn add_faction(&mut self, id: FactionId, name: &str, is_player: bool) {
        self.factions.insert(
            id,
            FactionInfo {
                id,
                def_name: name.to_string(),
                name: name.to_string(),
                is_player,
                permanent_enemy: false,
                hidden: false,
            },
        );
    }

    pub fn faction_mut(&mut self, id: FactionId) -> Option<&mut FactionInfo> {
        self.factions.get_mut(&id)
    }

    pub fn goodwill(&self, a: FactionId, b: FactionId) -> i32 {
        self.goodwill.get(&pair(a, b)).copied().unwrap_or(0)
    }

    pub fn set_goodwill(&mut self, a: FactionId, b: FactionId, value: i32) {
        self.goodwill.insert(pair(a, b), value);
    }

    pub fn set_hostile(&mut self, a: FactionId, b: FactionId) {
        self.set_goodwill(a, b, HOSTILE_GOODWILL);
    }

    pub fn add_settlement(&mut self, tile: TileId, faction: FactionId) {
        self.settlements.insert(tile, faction);
    }

    pub fn remove_settlement(&mut self, tile: TileId) -> Option<FactionId> {
        self.settlements.remove(&tile)
    }

    /// Hands a settlement to another faction, as after a conquest.
    pub fn set_settlement_faction(&mut self, tile: TileId, faction: FactionId) {
        if let Some(owner) = self.settlements.get_mut(&tile) {
            *owner = faction;
        }
    }

    pub fn add_caravan(&mut self, id: CaravanId, tile: TileId, faction: FactionId, wealth: i64) {
        self.caravans.insert(
            id,
            GridCaravan {
                tile,
                faction,
                wealth,
                visibility: 1.0,
            },
        );
    }

    pub fn caravan_mut(&mut self, id: CaravanId) -> Option<&mut GridCaravan> {
        self.caravans.get_mut(&id)
    }

    pub fn remove_caravan(&mut self, id: CaravanId) -> Option<GridCaravan> {
        self.caravans.remove(&id)
    }

    pub fn set_biome(&mut self, tile: TileId, multiplier: f32) {
        self.biomes.insert(tile, multiplier);
    }

    pub fn encounters(&self) -> &[EncounterRecord] {
        &self.encounters
    }

    pub fn encounters_of(&self, kind: EncounterKind) -> usize {
        self.encounters.iter().filter(|e| e.kind == kind).count()
    }

    fn record(&mut self, kind: EncounterKind, agent: &Agent, tile: TileId) {
        self.encounters.push(EncounterRecord {
            kind,
            agent: agent.id,
            faction: agent.faction,
            tile,
        });
    }
}

impl TileGraph for GridWorld {
    fn distance(&self, a: TileId, b: TileId) -> u32 {
        let (ax, ay) = self.coords(a);
        let (bx, by) = self.coords(b);
        ax.abs_diff(bx).max(ay.abs_diff(by))
    }

    fn next_step(&self, from: TileId, to: TileId) -> Option<TileId> {
        if from == to || !self.contains(from) || !self.contains(to) {
            return None;
        }
        let (fx, fy) = self.coords(from);
        let (tx, ty) = self.coords(to);
        let step = |f: u32, t: u32| match f.cmp(&t) {
            std::cmp::Ordering::Less => f + 1,
            std::cmp::Ordering::Greater => f - 1,
            std::cmp::Ordering::Equal => f,
        };
        Some(self.tile(step(fx, tx), step(fy, ty)))
    }

    fn is_resting_at(&self, tile: TileId, tick: u64) -> bool {
        DayPhase::at_hour(local_hour(tick, self.longitude(tile))).is_night()
    }

    fn biome_multiplier(&self, tile: TileId) -> f32 {
        self.biomes.get(&tile).copied().unwrap_or(0.0)
    }

    fn find_new_site(
        &self,
        origin: TileId,
        min_distance: u32,
        max_distance: u32,
        rng: &mut dyn RngCore,
    ) -> Option<TileId> {
        if min_distance > max_distance {
            return None;
        }
        let (ox, oy) = self.coords(origin);
        let reach = max_distance as i64;
        for _ in 0..SITE_ATTEMPTS {
            let x = ox as i64 + rng.gen_range(-reach..=reach);
            let y = oy as i64 + rng.gen_range(-reach..=reach);
            if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
                continue;
            }
            let tile = self.tile(x as u32, y as u32);
            let distance = self.distance(origin, tile);
            if distance >= min_distance && !self.settlements.contains_key(&tile) {
                return Some(tile);
            }
        }
        None
    }
}

impl EntityRegistry for GridWorld {
    fn objects_in_range(&self, tile: TileId, radius: u32) -> Vec<WorldObject> {
        let settlements = self
            .settlements
            .iter()
            .filter(|(t, _)| self.distance(tile, **t) <= radius)
            .map(|(t, faction)| WorldObject {
                tile: *t,
                faction: Some(*faction),
                kind: ObjectKind::Settlement,
            });
        let caravans = self
            .caravans
            .iter()
            .filter(|(_, c)| self.distance(tile, c.tile) <= radius)
            .map(|(id, c)| WorldObject {
                tile: c.tile,
                faction: Some(c.faction),
                kind: ObjectKind::Caravan {
                    id: *id,
                    wealth: c.wealth,
                    visibility: c.visibility,
                },
            });
        settlements.chain(caravans).collect()
    }

    fn settlement_at(&self, tile: TileId) -> Option<FactionId> {
        self.settlements.get(&tile).copied()
    }

    fn settlements(&self) -> Vec<(TileId, FactionId)> {
        self.settlements.iter().map(|(t, f)| (*t, *f)).collect()
    }

    fn caravan(&self, id: CaravanId) -> Option<WorldObject> {
        self.caravans.get(&id).map(|c| WorldObject {
            tile: c.tile,
            faction: Some(c.faction),
            kind: ObjectKind::Caravan {
                id,
                wealth: c.wealth,
                visibility: c.visibility,
            },
        })
    }

    /// Only the player's settlements are backed by a loaded map.
    fn has_map_presence(&self, tile: TileId) -> bool {
        self.settlement_at(tile)
            .and_then(|f| self.factions.get(&f))
            .is_some_and(|info| info.is_player)
    }
}

impl FactionDirectory for GridWorld {
    fn factions(&self) -> Vec<FactionInfo> {
        self.factions.values().cloned().collect()
    }

    fn is_hostile(&self, a: FactionId, b: FactionId) -> bool {
        a != b && self.goodwill(a, b) < 0
    }

    fn adjust_relationship(&mut self, a: FactionId, b: FactionId, delta: i32) {
        if a == b {
            return;
        }
        let goodwill = self.goodwill(a, b);
        self.set_goodwill(a, b, goodwill + delta);
    }
}

impl EncounterResolver for GridWorld {
    fn raid_settlement(&mut self, agent: &Agent, target: TileId) {
        self.record(EncounterKind::RaidSettlement, agent, target);
    }

    fn raid_caravan(&mut self, agent: &Agent, target: CaravanId) {
        let tile = self.caravans.get(&target).map_or(agent.position, |c| c.tile);
        self.record(EncounterKind::RaidCaravan, agent, tile);
        if let Some(caravan) = self.caravans.get_mut(&target) {
            caravan.wealth = (caravan.wealth - agent.power).max(0);
        }
    }

    /// The stronger side wins and loses half the loser's strength.
    fn resolve_battle(&mut self, attacker: &Agent, defender: &Agent) -> BattleOutcome {
        self.record(EncounterKind::Battle, attacker, attacker.position);
        if attacker.power >= defender.power {
            BattleOutcome {
                attacker_power: attacker.power - defender.power / 2,
                defender_power: 0,
            }
        } else {
            BattleOutcome {
                attacker_power: 0,
                defender_power: defender.power - attacker.power / 2,
            }
        }
    }

    fn resolve_world_engagement(&mut self, agent: &Agent, target: TileId) -> i64 {
        self.record(EncounterKind::WorldEngagement, agent, target);
        agent.power / 2
    }

    fn trade_with_player_settlement(&mut self, agent: &Agent, target: TileId) {
        self.record(EncounterKind::TradeWithPlayerSettlement, agent, target);
    }

    fn trade_with_caravan(&mut self, agent: &Agent, target: CaravanId) {
        let tile = self.caravans.get(&target).map_or(agent.position, |c| c.tile);
        self.record(EncounterKind::TradeWithCaravan, agent, tile);
    }

    fn trade_with_settlement(&mut self, agent: &Agent, target: TileId) {
        self.record(EncounterKind::TradeWithSettlement, agent, target);
    }

    fn trade_with_agent(&mut self, agent: &Agent, other: &Agent) {
        self.record(EncounterKind::TradeWithAgent, agent, other.position);
    }

    fn conduct_diplomacy(&mut self, agent: &Agent, target: TileId) {
        self.record(EncounterKind::Diplomacy, agent, target);
        if let (Some(faction), Some(owner)) = (agent.faction, self.settlement_at(target)) {
            self.adjust_relationship(faction, owner, DIPLOMACY_GOODWILL);
        }
    }

    fn found_settlement(&mut self, agent: &Agent, tile: TileId) -> bool {
        let Some(faction) = agent.faction else {
            return false;
        };
        if !self.contains(tile) || self.settlements.contains_key(&tile) {
            return false;
        }
        self.record(EncounterKind::FoundSettlement, agent, tile);
        self.settlements.insert(tile, faction);
        true
    }
}

impl PointCosts for GridWorld {
    fn raid_cost(&self, target: &Settlement) -> i64 {
        (target.power as f32 * self.raid_cost_ratio).round() as i64
    }

    fn diplomat_cost(&self, origin: &Settlement) -> i64 {
        origin.power / 10
    }

    fn scout_cost(&self, _behavior: BehaviorCategory, target_power: i64) -> i64 {
        target_power + 50
    }

    fn initial_settlement_power(&self, _faction: FactionId) -> i64 {
        self.initial_power
    }
}
