//! Action dispatcher.
//!
//! The [`Simulation`] owns the per-world state and advances it one tick at a
//! time against a host:
//!
//! 1. One-time faction discovery at the init tick
//! 2. Maintenance every `maintenance_interval` ticks (growth, reward queue,
//!    registry reconciliation, victory check)
//! 3. A faction-level global action every `global_action_interval` ticks
//! 4. A self-rescheduling per-settlement evaluation
//! 5. Every live agent's state machine

pub mod actions;
pub mod economy;
pub mod global;

pub use actions::ActionOutcome;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};
use war_events::{
    ActionKind, AgentId, AgentRole, CreditSource, EventKind, FactionId, RemovalReason, TileId,
};

use crate::agent::{is_raider, Agent, AgentFate, TargetRef};
use crate::config::SimConfig;
use crate::error::DispatchError;
use crate::events::TickEvents;
use crate::faction::{ActionWeighting, BehaviorCategory, FactionProfile, TableWeighting};
use crate::host::{FactionInfo, WorldHost};
use crate::settlement::Settlement;
use crate::state::SimulationState;
use crate::SimRng;

/// Explicitly owned simulation context for one world.
pub struct Simulation {
    pub config: SimConfig,
    pub rng: SimRng,
    pub state: SimulationState,
    pub events: TickEvents,
    weighting: Box<dyn ActionWeighting>,
}

/// Parameters of a newly spawned agent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpawnOrder {
    pub role: AgentRole,
    pub faction: FactionId,
    pub origin: TileId,
    pub target: TargetRef,
    pub target_tile: TileId,
    pub power: i64,
}

impl Simulation {
    /// Creates a simulation weighted by the configuration's action tables.
    pub fn new(config: SimConfig, seed: u64) -> Self {
        let weighting = TableWeighting::new(config.action_weights.clone());
        Self::with_weighting(config, seed, Box::new(weighting))
    }

    pub fn with_weighting(config: SimConfig, seed: u64, weighting: Box<dyn ActionWeighting>) -> Self {
        Self {
            config,
            rng: SimRng::seeded(seed),
            state: SimulationState::new(),
            events: TickEvents::new(),
            weighting,
        }
    }

    /// Rebuilds a simulation around restored state.
    pub fn from_state(config: SimConfig, seed: u64, state: SimulationState, next_event_id: u64) -> Self {
        let mut sim = Self::new(config, seed);
        sim.state = state;
        sim.events = TickEvents::starting_at(next_event_id);
        sim
    }

    pub fn is_game_over(&self) -> bool {
        self.state.victory.game_over()
    }

    /// Advances the world to tick `now`. Never fails: degenerate states are
    /// logged and skipped.
    pub fn tick(&mut self, host: &mut dyn WorldHost, now: u64) {
        if self.is_game_over() {
            return;
        }
        self.state.tick = now;

        if !self.state.initialized {
            if now < self.config.cadence.init_tick {
                return;
            }
            self.initialize(host, now);
        }

        if now % self.config.cadence.maintenance_interval.max(1) == 0 {
            self.run_maintenance(host, now);
            if self.is_game_over() {
                return;
            }
        }
        if now % self.config.cadence.global_action_interval.max(1) == 0 {
            self.run_global_action(host, now);
        }
        if now >= self.state.next_local_evaluation_tick {
            self.run_local_evaluation(host, now);
        }
        self.tick_agents(host, now);
    }

    /// Discovers and profiles every faction, then picks the victory rival.
    fn initialize(&mut self, host: &mut dyn WorldHost, now: u64) {
        let added = self.register_new_factions(host, now);
        self.state.initialized = true;
        info!(
            "Initialized {} factions with {} settlements at tick {}",
            added,
            self.state.settlement_count(),
            now
        );
        if let Some(kind) = self.state.victory.select_rival(&self.state.profiles, &mut self.rng.0) {
            self.events.record(now, kind);
        }
    }

    /// Profiles host factions not tracked yet. Returns how many were added.
    pub(crate) fn register_new_factions(&mut self, host: &dyn WorldHost, now: u64) -> usize {
        let mut added = 0;
        for info in host.factions() {
            if self.state.profiles.contains_key(&info.id) {
                continue;
            }
            let mut profile = self.build_profile(&info);
            for (tile, owner) in host.settlements() {
                if owner == info.id {
                    let power = host.initial_settlement_power(info.id);
                    profile.add_settlement(Settlement::new(tile, info.id, power));
                }
            }

            self.events.record(
                now,
                EventKind::FactionRegistered {
                    faction: info.id,
                    behavior: profile.behavior.to_string(),
                    settlements: profile.settlements.len(),
                },
            );
            for settlement in &profile.settlements {
                self.events.record(
                    now,
                    EventKind::SettlementRegistered {
                        settlement: settlement.tile,
                        faction: info.id,
                        power: settlement.power,
                    },
                );
            }
            debug!("Profiled {} ({}) as {}", info.name, info.id, profile.behavior);
            self.state.profiles.insert(info.id, profile);
            added += 1;
        }
        added
    }

    fn build_profile(&mut self, info: &FactionInfo) -> FactionProfile {
        if info.is_player {
            return FactionProfile::player(info.id, info.def_name.clone());
        }

        let entry = if self.config.behavior.randomize_faction_behavior {
            None
        } else {
            self.config.behavior_entry(&info.def_name).cloned()
        };

        let mut profile = match entry {
            Some(entry) => {
                let mut profile = FactionProfile::new(info.id, info.def_name.clone(), entry.behavior);
                profile.moves_at_night = entry.moves_at_night;
                profile.creates_settlements = entry.creates_settlements;
                profile.hates_player = entry.hates_player;
                profile
            }
            None => {
                let behavior = BehaviorCategory::autonomous()
                    .choose(&mut self.rng.0)
                    .copied()
                    .unwrap_or(BehaviorCategory::Cautious);
                let mut profile = FactionProfile::new(info.id, info.def_name.clone(), behavior);
                profile.hates_player = info.permanent_enemy;
                profile
            }
        };
        profile.hidden = info.hidden;
        profile.action_weights = self.weighting.weights_for(&profile);
        profile
    }

    /// One per-settlement evaluation: pick a faction and a settlement, refresh
    /// its neighbor cache, then try a weighted action if it is due.
    fn run_local_evaluation(&mut self, host: &mut dyn WorldHost, now: u64) {
        let (low, high) = self.config.cadence.local_evaluation_delay;
        self.state.next_local_evaluation_tick = now + self.rng.0.gen_range(low..=high.max(low));

        let factions: Vec<FactionId> = self.state.profiles.keys().copied().collect();
        let Some(&faction) = factions.choose(&mut self.rng.0) else {
            return;
        };
        let tiles: Vec<TileId> = match self.state.profiles.get(&faction) {
            Some(profile) => profile.settlements.iter().map(|s| s.tile).collect(),
            None => return,
        };
        let Some(&tile) = tiles.choose(&mut self.rng.0) else {
            debug!("{} has no settlements to evaluate", faction);
            return;
        };

        if self.state.settlement(tile).is_some_and(|s| {
            s.neighbors_stale(now, self.config.cadence.neighbor_cache_staleness)
        }) {
            self.refresh_neighbors(host, tile, now);
        }

        let Some(profile) = self.state.profiles.get(&faction) else {
            return;
        };
        if profile.is_player() {
            return;
        }
        let due = profile.settlement(tile).is_some_and(|s| s.ready_for_event(now));
        // Day movers act by day, night movers by night
        let resting = host.is_resting_at(tile, now);
        if !due || resting != profile.moves_at_night {
            return;
        }

        let Some(name) = profile.action_weights.choose(&mut self.rng.0).map(str::to_owned) else {
            return;
        };

        if self.rng.0.gen_bool(self.config.economy.growth_bonus_chance.clamp(0.0, 1.0)) {
            let (low, high) = self.config.economy.growth_bonus;
            let bonus = self.rng.0.gen_range(low..=high.max(low));
            self.credit(tile, bonus, CreditSource::GrowthBonus, now);
            debug!("{} had a burst of growth (+{})", tile, bonus);
        }

        match name.parse::<ActionKind>() {
            Ok(action) => match self.attempt_action(host, faction, tile, action, now) {
                Ok(outcome) => debug!("{} attempted {}: {:?}", tile, action, outcome),
                Err(e) => warn!("{} action at {} aborted: {}", action, tile, e),
            },
            Err(e) => warn!("Ignoring action drawn for {}: {}", faction, e),
        }

        let periods = self.config.cadence.settlement_cooldown_periods;
        let interval = self.config.cadence.maintenance_interval;
        let cooldown = self
            .rng
            .0
            .gen_range(interval * periods.0..=interval * periods.1.max(periods.0));
        if let Some(settlement) = self.state.settlement_mut(tile) {
            settlement.next_event_tick = now + cooldown;
        }
    }

    /// Rebuilds the hostile and friendly neighbor lists of a settlement.
    pub(crate) fn refresh_neighbors(&mut self, host: &dyn WorldHost, tile: TileId, now: u64) {
        let Some(settlement) = self.state.settlement(tile) else {
            return;
        };
        let owner = settlement.faction;
        let divider = self.config.cadence.target_range_divider * 0.5;
        let range = (settlement.power as f32 / divider).round().max(0.0) as u32;

        let mut hostile = Vec::new();
        let mut friendly = Vec::new();
        for profile in self.state.profiles.values() {
            if profile.faction == owner {
                continue;
            }
            let is_hostile = host.is_hostile(owner, profile.faction);
            for other in &profile.settlements {
                if host.distance(tile, other.tile) > range {
                    continue;
                }
                if is_hostile {
                    hostile.push(other.tile);
                } else {
                    friendly.push(other.tile);
                }
            }
        }

        debug!(
            "{} sees {} hostile and {} friendly settlements within {}",
            tile,
            hostile.len(),
            friendly.len(),
            range
        );
        if let Some(settlement) = self.state.settlement_mut(tile) {
            settlement.set_neighbors(hostile, friendly, now);
        }
    }

    /// Credits a settlement record. Returns false if no record exists.
    pub(crate) fn credit(&mut self, tile: TileId, points: i64, source: CreditSource, now: u64) -> bool {
        let Some(settlement) = self.state.settlement_mut(tile) else {
            return false;
        };
        settlement.credit(points);
        let faction = settlement.faction;
        self.events.record(
            now,
            EventKind::PointsCredited {
                settlement: tile,
                faction,
                points,
                source,
            },
        );
        true
    }

    pub(crate) fn debit(&mut self, tile: TileId, points: i64, action: ActionKind, now: u64) {
        let Some(settlement) = self.state.settlement_mut(tile) else {
            return;
        };
        settlement.debit(points);
        let faction = settlement.faction;
        self.events.record(
            now,
            EventKind::PointsDebited {
                settlement: tile,
                faction,
                points,
                action,
            },
        );
    }

    /// Queues a delayed reward for the settlement at `tile`.
    pub fn queue_gain(&mut self, tile: TileId, points: i64, ready_at: u64) -> Result<(), DispatchError> {
        let settlement = self
            .state
            .settlement_mut(tile)
            .ok_or(DispatchError::MissingSettlement(tile))?;
        settlement.queue_gain(points, ready_at);
        Ok(())
    }

    pub(crate) fn roll_scan_interval(&mut self, role: AgentRole) -> u64 {
        let (low, high) = if is_raider(role) {
            self.config.agents.raider_scan_interval
        } else {
            self.config.agents.trader_scan_interval
        };
        self.rng.0.gen_range(low..=high.max(low))
    }

    pub(crate) fn spawn_agent(&mut self, host: &dyn WorldHost, order: SpawnOrder, now: u64) -> AgentId {
        let id = self.state.allocate_agent_id();
        let mut agent = Agent::new(id, order.role, order.faction, order.origin, order.power);
        agent.home = Some(order.origin);
        agent.destination = Some(order.target);
        agent.moves_at_night = self
            .state
            .profiles
            .get(&order.faction)
            .is_some_and(|p| p.moves_at_night);
        agent.ticks_per_move = if is_raider(order.role) {
            self.config.agents.raider_ticks_per_move
        } else {
            self.config.agents.trader_ticks_per_move
        };
        agent.scan_interval = self.roll_scan_interval(order.role);
        agent.next_scan_tick = now + agent.scan_interval;
        if !agent.path_to(host, order.target_tile) {
            // Housekeeping sends it back home
            warn!("{} has no path to {}, dropping its target", id, order.target_tile);
            agent.destination = None;
        }

        info!(
            "{} sends {} {} with {} power toward {}",
            order.origin, order.role, id, order.power, order.target_tile
        );
        self.events.record(
            now,
            EventKind::AgentSpawned {
                agent: id,
                role: order.role,
                faction: order.faction,
                origin: order.origin,
                target: order.target_tile,
                power: order.power,
            },
        );
        self.state.agents.insert(id, agent);
        id
    }

    pub(crate) fn record_removal(&mut self, agent: &Agent, reason: RemovalReason, now: u64) {
        debug!("{} removed at {} ({:?})", agent.id, agent.position, reason);
        self.events.record(
            now,
            EventKind::AgentRemoved {
                agent: agent.id,
                tile: agent.position,
                reason,
            },
        );
    }

    /// Runs every agent's state machine. Each agent is taken out of the
    /// table while it runs so it can look at its peers.
    fn tick_agents(&mut self, host: &mut dyn WorldHost, now: u64) {
        let ids: Vec<AgentId> = self.state.agents.keys().copied().collect();
        for id in ids {
            // Already removed by a peer this tick
            let Some(mut agent) = self.state.agents.remove(&id) else {
                continue;
            };
            match self.tick_agent(host, &mut agent, now) {
                AgentFate::Active => {
                    self.state.agents.insert(id, agent);
                }
                AgentFate::Removed(reason) => self.record_removal(&agent, reason, now),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faction::{ActionWeights, WeightedAction};
    use crate::setup::GridWorld;
    use war_events::TICKS_PER_HOUR;

    const TRIBE: FactionId = FactionId(1);
    const NOON: u64 = TICKS_PER_HOUR * 12;
    const MIDNIGHT: u64 = TICKS_PER_HOUR * 23;

    /// One tribe settlement on the prime meridian, drawing only from `weights`.
    fn village(config: SimConfig, weights: &[(&str, f32)]) -> (Simulation, GridWorld, TileId) {
        let mut world = GridWorld::new(24, 10);
        world.add_faction(TRIBE, "tribe", false);
        let tile = world.tile(12, 5);
        world.add_settlement(tile, TRIBE);

        let mut sim = Simulation::new(config, 17);
        let mut profile = FactionProfile::new(TRIBE, "tribe", BehaviorCategory::Cautious);
        profile.add_settlement(Settlement::new(tile, TRIBE, 1_000));
        profile.action_weights = ActionWeights {
            entries: weights.iter().map(|(name, w)| WeightedAction::new(*name, *w)).collect(),
        };
        sim.state.profiles.insert(TRIBE, profile);
        sim.state.initialized = true;
        (sim, world, tile)
    }

    fn quiet() -> SimConfig {
        let mut config = SimConfig::default();
        config.economy.growth_bonus_chance = 0.0;
        config
    }

    fn spent_anything(sim: &Simulation) -> bool {
        sim.events
            .events
            .iter()
            .any(|e| matches!(e.kind, EventKind::PointsDebited { .. } | EventKind::AgentSpawned { .. }))
    }

    #[test]
    fn test_day_mover_waits_out_the_night() {
        let (mut sim, mut world, tile) = village(quiet(), &[("trade", 1.0)]);
        sim.run_local_evaluation(&mut world, MIDNIGHT);

        assert_eq!(sim.state.settlement(tile).unwrap().next_event_tick, 0);
        assert!(!spent_anything(&sim));
        let next = sim.state.next_local_evaluation_tick;
        assert!((MIDNIGHT + 30..=MIDNIGHT + 100).contains(&next));
    }

    #[test]
    fn test_night_mover_waits_out_the_day() {
        let (mut sim, mut world, tile) = village(quiet(), &[("trade", 1.0)]);
        if let Some(profile) = sim.state.profiles.get_mut(&TRIBE) {
            profile.moves_at_night = true;
        }
        sim.run_local_evaluation(&mut world, NOON);
        assert_eq!(sim.state.settlement(tile).unwrap().next_event_tick, 0);

        sim.run_local_evaluation(&mut world, MIDNIGHT);
        assert!(sim.state.settlement(tile).unwrap().next_event_tick > MIDNIGHT);
    }

    #[test]
    fn test_due_settlement_is_cooled_down() {
        let (mut sim, mut world, tile) = village(quiet(), &[("trade", 1.0)]);
        sim.run_local_evaluation(&mut world, NOON);

        // 12 to 24 maintenance periods of 2500 ticks
        let next = sim.state.settlement(tile).unwrap().next_event_tick;
        assert!((NOON + 30_000..=NOON + 60_000).contains(&next), "cooldown until {}", next);

        let events = sim.events.len();
        sim.run_local_evaluation(&mut world, NOON + 1_000);
        assert_eq!(sim.state.settlement(tile).unwrap().next_event_tick, next);
        assert_eq!(sim.events.len(), events);
    }

    #[test]
    fn test_unknown_action_is_skipped_but_cools_down() {
        let (mut sim, mut world, tile) = village(quiet(), &[("smuggle", 1.0)]);
        sim.run_local_evaluation(&mut world, NOON);

        assert!(!spent_anything(&sim));
        assert!(sim.state.agents.is_empty());
        let settlement = sim.state.settlement(tile).unwrap();
        assert_eq!(settlement.power, 1_000);
        assert!(settlement.next_event_tick >= NOON + 30_000);
    }

    #[test]
    fn test_empty_weight_table_leaves_settlement_due() {
        let (mut sim, mut world, tile) = village(quiet(), &[]);
        sim.run_local_evaluation(&mut world, NOON);
        assert_eq!(sim.state.settlement(tile).unwrap().next_event_tick, 0);
    }

    #[test]
    fn test_growth_bonus_on_evaluation() {
        let mut config = SimConfig::default();
        config.economy.growth_bonus_chance = 1.0;
        config.economy.growth_bonus = (50, 50);
        let (mut sim, mut world, tile) = village(config, &[("smuggle", 1.0)]);
        sim.run_local_evaluation(&mut world, NOON);

        assert_eq!(sim.state.settlement(tile).unwrap().power, 1_050);
        assert!(sim.events.events.iter().any(|e| matches!(
            e.kind,
            EventKind::PointsCredited {
                points: 50,
                source: CreditSource::GrowthBonus,
                ..
            }
        )));
    }

    #[test]
    fn test_unreachable_target_sends_agent_home() {
        let (mut sim, mut world, tile) = village(quiet(), &[]);
        let nowhere = TileId(10_000);
        let order = SpawnOrder {
            role: AgentRole::Warband,
            faction: TRIBE,
            origin: tile,
            target: TargetRef::Site(nowhere),
            target_tile: nowhere,
            power: 200,
        };
        let id = sim.spawn_agent(&world, order, 1);

        let agent = &sim.state.agents[&id];
        assert_eq!(agent.destination, None);
        assert!(!agent.path.moving);

        let period = sim.config.agents.housekeeping_period;
        let Some(mut agent) = sim.state.agents.remove(&id) else {
            panic!("agent vanished");
        };
        assert_eq!(sim.tick_agent(&mut world, &mut agent, period), AgentFate::Active);
        assert_eq!(agent.destination, Some(TargetRef::Settlement(tile)));
    }
}
