//! Agent lifecycle.
//!
//! Each tick an agent checks that its destination still exists, advances
//! along its path, scans its surroundings when the scan timer fires and, on
//! the housekeeping cadence, makes sure it still has a home to report to.
//! Arrival dispatches on whatever occupies the destination tile.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};
use war_events::{
    AgentId, AgentRole, CreditSource, EncounterKind, EventKind, FactionId, RemovalReason, TileId,
};

use super::{is_caravan_like, is_raider, Agent, ScanPolicy, StepResult, TargetRef};
use crate::dispatcher::Simulation;
use crate::faction::scale;
use crate::host::{CaravanId, ObjectKind, WorldHost};
use crate::settlement::Settlement;

/// Whether an agent stays in the world after its tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentFate {
    Active,
    Removed(RemovalReason),
}

/// What sits on a tile an agent just reached.
#[derive(Debug, Clone, Copy)]
enum Occupant {
    Settlement(FactionId),
    Caravan {
        id: CaravanId,
        owner: Option<FactionId>,
    },
    Agent {
        id: AgentId,
        owner: Option<FactionId>,
    },
    Empty,
}

impl Simulation {
    /// Runs one tick of an agent that has been taken out of the agent table.
    pub(crate) fn tick_agent(&mut self, host: &mut dyn WorldHost, agent: &mut Agent, now: u64) -> AgentFate {
        let Some(faction) = agent.faction else {
            return AgentFate::Active;
        };

        if let Some(target) = agent.destination {
            if !self.target_alive(&*host, target) {
                debug!("{} lost its destination {:?}", agent.id, target);
                agent.destination = None;
                let fate = self.return_home(&*host, agent, now);
                if fate != AgentFate::Active {
                    return fate;
                }
            }
        }

        let resting = agent.is_resting(&*host, now, self.config.agents.final_push_cost);
        let ticks_per_move = agent.ticks_per_move;
        if let StepResult::Arrived(tile) = agent.path.advance(&*host, &mut agent.position, ticks_per_move, resting) {
            return self.handle_arrival(host, agent, faction, tile, now);
        }

        let scan = agent.capabilities().scan;
        if scan != ScanPolicy::Disabled && now >= agent.next_scan_tick {
            agent.scan_interval = self.roll_scan_interval(agent.role);
            agent.next_scan_tick = now + agent.scan_interval;
            match scan {
                ScanPolicy::Hostile => {
                    let fate = self.raider_scan(host, agent, faction, now);
                    if fate != AgentFate::Active {
                        return fate;
                    }
                }
                ScanPolicy::TradePartners => self.trader_scan(host, agent, faction, now),
                ScanPolicy::Disabled => {}
            }
        }

        if now % self.config.agents.housekeeping_period.max(1) == 0 {
            let Some(home) = self.resolve_home(&*host, agent) else {
                info!("{} has no settlement left to return to", agent.id);
                return AgentFate::Removed(RemovalReason::Lost);
            };
            if agent.destination.is_none() {
                agent.destination = Some(TargetRef::Settlement(home));
                if agent.path.destination != Some(home) {
                    agent.path_to(&*host, home);
                }
            }
        }

        AgentFate::Active
    }

    fn target_alive(&self, host: &dyn WorldHost, target: TargetRef) -> bool {
        match target {
            TargetRef::Settlement(tile) => host.settlement_at(tile).is_some(),
            TargetRef::Caravan(id) => host.caravan(id).is_some(),
            TargetRef::Agent(id) => self.state.agents.contains_key(&id),
            TargetRef::Site(_) => true,
        }
    }

    fn target_tile(&self, host: &dyn WorldHost, target: TargetRef) -> Option<TileId> {
        match target {
            TargetRef::Settlement(tile) | TargetRef::Site(tile) => Some(tile),
            TargetRef::Caravan(id) => host.caravan(id).map(|c| c.tile),
            TargetRef::Agent(id) => self.state.agents.get(&id).map(|a| a.position),
        }
    }

    fn target_owner(&self, host: &dyn WorldHost, target: TargetRef) -> Option<FactionId> {
        match target {
            TargetRef::Settlement(tile) => host.settlement_at(tile),
            TargetRef::Caravan(id) => host.caravan(id).and_then(|c| c.faction),
            TargetRef::Agent(id) => self.state.agents.get(&id).and_then(|a| a.faction),
            TargetRef::Site(_) => None,
        }
    }

    /// The agent's home if it is still an own settlement, otherwise a random
    /// own settlement near the agent. The search widens once before giving up.
    pub(crate) fn resolve_home(&mut self, host: &dyn WorldHost, agent: &mut Agent) -> Option<TileId> {
        let faction = agent.faction?;
        if let Some(home) = agent.home {
            if host.settlement_at(home) == Some(faction) {
                return Some(home);
            }
        }

        let radius = self.config.agents.parent_search_radius;
        let widened = radius.saturating_mul(self.config.agents.parent_search_widening.max(1));
        let home = match self.find_parent(host, faction, agent.position, radius) {
            Some(home) => home,
            None => self.find_parent(host, faction, agent.position, widened)?,
        };
        debug!("{} adopted {} as its home", agent.id, home);
        agent.home = Some(home);
        Some(home)
    }

    fn find_parent(&mut self, host: &dyn WorldHost, faction: FactionId, position: TileId, radius: u32) -> Option<TileId> {
        let candidates: Vec<TileId> = self
            .state
            .profiles
            .get(&faction)?
            .settlements
            .iter()
            .map(|s| s.tile)
            .filter(|tile| host.settlement_at(*tile) == Some(faction) && host.distance(position, *tile) <= radius)
            .collect();
        candidates.choose(&mut self.rng.0).copied()
    }

    /// Turns the agent around. Removes it if no home can be found.
    fn return_home(&mut self, host: &dyn WorldHost, agent: &mut Agent, now: u64) -> AgentFate {
        let Some(home) = self.resolve_home(host, agent) else {
            return AgentFate::Removed(RemovalReason::Lost);
        };
        agent.destination = Some(TargetRef::Settlement(home));
        agent.path_to(host, home);
        self.events.record(now, EventKind::AgentReturningHome { agent: agent.id, home });
        AgentFate::Active
    }

    fn record_encounter(&mut self, agent: &Agent, encounter: EncounterKind, now: u64) {
        info!("{} {} at {}: {:?}", agent.role, agent.id, agent.position, encounter);
        self.events.record(
            now,
            EventKind::Encounter {
                agent: agent.id,
                tile: agent.position,
                encounter,
            },
        );
    }

    fn raider_scan(&mut self, host: &mut dyn WorldHost, agent: &mut Agent, faction: FactionId, now: u64) -> AgentFate {
        if let Some(target) = self.find_raid_target(&*host, agent, faction) {
            debug!("{} spotted {:?}", agent.id, target);
            agent.destination = Some(target);
            if let Some(tile) = self.target_tile(&*host, target) {
                agent.path_to(&*host, tile);
            }
        }
        match agent.destination {
            Some(target) if target.is_mobile() => self.engage_destination(host, agent, faction, target, now),
            _ => AgentFate::Active,
        }
    }

    /// First hostile caravan, then first hostile raider or caravan-like agent,
    /// within scan radius. The current destination is skipped.
    fn find_raid_target(&self, host: &dyn WorldHost, agent: &Agent, faction: FactionId) -> Option<TargetRef> {
        let radius = self.config.agents.scan_radius;
        for object in host.objects_in_range(agent.position, radius) {
            let ObjectKind::Caravan { id, .. } = object.kind else {
                continue;
            };
            let Some(owner) = object.faction else {
                continue;
            };
            let target = TargetRef::Caravan(id);
            if owner != faction && agent.destination != Some(target) && host.is_hostile(faction, owner) {
                return Some(target);
            }
        }

        for id in self.state.agents_in_range(host, agent.position, radius) {
            let Some(other) = self.state.agents.get(&id) else {
                continue;
            };
            let Some(owner) = other.faction else {
                continue;
            };
            let target = TargetRef::Agent(id);
            if owner != faction
                && agent.destination != Some(target)
                && (is_raider(other.role) || is_caravan_like(other.role))
                && host.is_hostile(faction, owner)
            {
                return Some(target);
            }
        }
        None
    }

    /// Engages a mobile destination in reach, chases one that is close and
    /// gives up on anything farther.
    fn engage_destination(
        &mut self,
        host: &mut dyn WorldHost,
        agent: &mut Agent,
        faction: FactionId,
        target: TargetRef,
        now: u64,
    ) -> AgentFate {
        let Some(tile) = self.target_tile(&*host, target) else {
            agent.destination = None;
            return self.return_home(&*host, agent, now);
        };
        let distance = host.distance(agent.position, tile);

        if distance <= self.config.agents.engage_radius {
            let hostile = self
                .target_owner(&*host, target)
                .is_some_and(|owner| owner != faction && host.is_hostile(faction, owner));
            if !hostile {
                agent.destination = None;
                return self.return_home(&*host, agent, now);
            }
            match target {
                TargetRef::Caravan(id) => {
                    host.raid_caravan(agent, id);
                    self.record_encounter(agent, EncounterKind::RaidCaravan, now);
                    AgentFate::Removed(RemovalReason::Consumed)
                }
                TargetRef::Agent(id) => self.battle(host, agent, id, now),
                _ => AgentFate::Active,
            }
        } else if distance <= self.config.agents.approach_radius {
            agent.path_to(&*host, tile);
            AgentFate::Active
        } else {
            debug!("{} lost track of {:?}", agent.id, target);
            agent.destination = None;
            self.return_home(&*host, agent, now)
        }
    }

    /// Peer battle. A side reduced to zero power is removed.
    fn battle(&mut self, host: &mut dyn WorldHost, agent: &mut Agent, defender_id: AgentId, now: u64) -> AgentFate {
        let Some(mut defender) = self.state.agents.remove(&defender_id) else {
            agent.destination = None;
            return self.return_home(&*host, agent, now);
        };

        let outcome = host.resolve_battle(agent, &defender);
        agent.power = outcome.attacker_power.max(0);
        defender.power = outcome.defender_power.max(0);
        self.record_encounter(agent, EncounterKind::Battle, now);

        if defender.power == 0 {
            self.record_removal(&defender, RemovalReason::Defeated, now);
        } else {
            self.state.agents.insert(defender_id, defender);
        }
        if agent.power == 0 {
            return AgentFate::Removed(RemovalReason::Defeated);
        }
        agent.destination = None;
        self.return_home(&*host, agent, now)
    }

    /// Trades in place with the first peaceful caravan-like partner in range
    /// not traded with before. The agent keeps its mission.
    fn trader_scan(&mut self, host: &mut dyn WorldHost, agent: &mut Agent, faction: FactionId, now: u64) {
        let Some(partner) = self.find_trade_partner(&*host, agent, faction) else {
            return;
        };
        match partner {
            TargetRef::Caravan(id) => {
                host.trade_with_caravan(agent, id);
                self.record_encounter(agent, EncounterKind::TradeWithCaravan, now);
            }
            TargetRef::Agent(id) => {
                let Some(other) = self.state.agents.get(&id) else {
                    return;
                };
                host.trade_with_agent(agent, other);
                self.record_encounter(agent, EncounterKind::TradeWithAgent, now);
            }
            _ => return,
        }
        agent.traded_with.insert(partner);
    }

    fn find_trade_partner(&self, host: &dyn WorldHost, agent: &Agent, faction: FactionId) -> Option<TargetRef> {
        let radius = self.config.agents.scan_radius;
        let peaceful = |owner: FactionId| owner != faction && !host.is_hostile(faction, owner);

        for object in host.objects_in_range(agent.position, radius) {
            let ObjectKind::Caravan { id, .. } = object.kind else {
                continue;
            };
            let target = TargetRef::Caravan(id);
            if object.faction.is_some_and(peaceful) && !agent.traded_with.contains(&target) {
                return Some(target);
            }
        }
        self.state
            .agents_in_range(host, agent.position, radius)
            .into_iter()
            .map(TargetRef::Agent)
            .find(|target| {
                let TargetRef::Agent(id) = target else {
                    return false;
                };
                self.state.agents.get(id).is_some_and(|other| {
                    is_caravan_like(other.role)
                        && other.faction.is_some_and(peaceful)
                        && !agent.traded_with.contains(target)
                })
            })
    }

    fn occupant_at(&self, host: &dyn WorldHost, agent: &Agent, tile: TileId) -> Occupant {
        if let Some(owner) = host.settlement_at(tile) {
            return Occupant::Settlement(owner);
        }
        match agent.destination {
            Some(TargetRef::Site(_)) => return Occupant::Empty,
            Some(TargetRef::Caravan(id)) => {
                if let Some(caravan) = host.caravan(id).filter(|c| c.tile == tile) {
                    return Occupant::Caravan {
                        id,
                        owner: caravan.faction,
                    };
                }
            }
            Some(TargetRef::Agent(id)) => {
                if let Some(other) = self.state.agents.get(&id).filter(|a| a.position == tile) {
                    return Occupant::Agent {
                        id,
                        owner: other.faction,
                    };
                }
            }
            _ => {}
        }

        for object in host.objects_in_range(tile, 0) {
            if let ObjectKind::Caravan { id, .. } = object.kind {
                return Occupant::Caravan {
                    id,
                    owner: object.faction,
                };
            }
        }
        if let Some(&id) = self.state.agents_in_range(host, tile, 0).first() {
            let owner = self.state.agents.get(&id).and_then(|a| a.faction);
            return Occupant::Agent { id, owner };
        }
        Occupant::Empty
    }

    fn handle_arrival(
        &mut self,
        host: &mut dyn WorldHost,
        agent: &mut Agent,
        faction: FactionId,
        tile: TileId,
        now: u64,
    ) -> AgentFate {
        let occupant = self.occupant_at(&*host, agent, tile);
        debug!("{} arrived at {} and found {:?}", agent.id, tile, occupant);

        let owner = match occupant {
            Occupant::Settlement(owner) => Some(owner),
            Occupant::Caravan { owner, .. } | Occupant::Agent { owner, .. } => owner,
            Occupant::Empty => return self.arrive_at_empty_tile(host, agent, faction, tile, now),
        };
        if owner == Some(faction) {
            return match occupant {
                Occupant::Settlement(_) => self.reinforce(&*host, agent, tile, now),
                _ => self.return_home(&*host, agent, now),
            };
        }

        let hostile = owner.is_some_and(|o| host.is_hostile(faction, o));
        if hostile {
            self.arrive_hostile(host, agent, occupant, tile, now)
        } else {
            self.arrive_peaceful(host, agent, occupant, tile, now)
        }
    }

    fn arrive_at_empty_tile(
        &mut self,
        host: &mut dyn WorldHost,
        agent: &mut Agent,
        faction: FactionId,
        tile: TileId,
        now: u64,
    ) -> AgentFate {
        if !agent.capabilities().founds_settlements {
            return self.return_home(&*host, agent, now);
        }
        if !host.found_settlement(agent, tile) {
            debug!("{} could not claim {}", agent.id, tile);
            return self.return_home(&*host, agent, now);
        }

        let Some(profile) = self.state.profiles.get_mut(&faction) else {
            return AgentFate::Removed(RemovalReason::Consumed);
        };
        profile.add_settlement(Settlement::new(tile, faction, agent.power));
        self.record_encounter(agent, EncounterKind::FoundSettlement, now);
        self.events.record(
            now,
            EventKind::SettlementRegistered {
                settlement: tile,
                faction,
                power: agent.power,
            },
        );
        AgentFate::Removed(RemovalReason::Consumed)
    }

    /// Hands the agent's remaining power back to an own settlement.
    fn reinforce(&mut self, host: &dyn WorldHost, agent: &Agent, tile: TileId, now: u64) -> AgentFate {
        if host.has_map_presence(tile) || self.config.economy.credit_without_map_presence {
            let record = if self.state.settlement(tile).is_some() {
                Some(tile)
            } else {
                agent.home.filter(|home| self.state.settlement(*home).is_some())
            };
            match record {
                Some(record) => {
                    self.credit(record, agent.power, CreditSource::Reinforcement, now);
                }
                None => debug!("{} found no record to reinforce at {}", agent.id, tile),
            }
        }
        AgentFate::Removed(RemovalReason::Consumed)
    }

    fn arrive_hostile(
        &mut self,
        host: &mut dyn WorldHost,
        agent: &mut Agent,
        occupant: Occupant,
        tile: TileId,
        now: u64,
    ) -> AgentFate {
        let player = host.player_faction();
        match (occupant, agent.role) {
            (Occupant::Settlement(owner), role) if is_raider(role) => {
                if Some(owner) == player {
                    host.raid_settlement(agent, tile);
                    self.record_encounter(agent, EncounterKind::RaidSettlement, now);
                } else {
                    let lost = host.resolve_world_engagement(agent, tile);
                    self.record_encounter(agent, EncounterKind::WorldEngagement, now);
                    self.apply_engagement_loss(tile, lost, now);
                }
                AgentFate::Removed(RemovalReason::Consumed)
            }
            (Occupant::Settlement(_), AgentRole::Diplomat) => {
                host.conduct_diplomacy(agent, tile);
                self.record_encounter(agent, EncounterKind::Diplomacy, now);
                AgentFate::Removed(RemovalReason::Consumed)
            }
            (Occupant::Caravan { id, .. }, role) if is_raider(role) => {
                host.raid_caravan(agent, id);
                self.record_encounter(agent, EncounterKind::RaidCaravan, now);
                AgentFate::Removed(RemovalReason::Consumed)
            }
            (Occupant::Agent { id, .. }, role) if is_raider(role) => self.battle(host, agent, id, now),
            _ => {
                agent.destination = None;
                self.return_home(&*host, agent, now)
            }
        }
    }

    fn arrive_peaceful(
        &mut self,
        host: &mut dyn WorldHost,
        agent: &mut Agent,
        occupant: Occupant,
        tile: TileId,
        now: u64,
    ) -> AgentFate {
        let player = host.player_faction();
        match (occupant, agent.role) {
            (Occupant::Settlement(owner), AgentRole::Trader) => {
                if Some(owner) == player {
                    host.trade_with_player_settlement(agent, tile);
                    self.record_encounter(agent, EncounterKind::TradeWithPlayerSettlement, now);
                    self.credit_trade_profit(&*host, agent, now);
                } else {
                    host.trade_with_settlement(agent, tile);
                    self.record_encounter(agent, EncounterKind::TradeWithSettlement, now);
                }
                AgentFate::Removed(RemovalReason::Consumed)
            }
            (Occupant::Settlement(_), AgentRole::Diplomat) => {
                host.conduct_diplomacy(agent, tile);
                self.record_encounter(agent, EncounterKind::Diplomacy, now);
                AgentFate::Removed(RemovalReason::Consumed)
            }
            (Occupant::Caravan { id, .. }, AgentRole::Trader)
                if !agent.traded_with.contains(&TargetRef::Caravan(id)) =>
            {
                host.trade_with_caravan(agent, id);
                agent.traded_with.insert(TargetRef::Caravan(id));
                self.record_encounter(agent, EncounterKind::TradeWithCaravan, now);
                self.credit_trade_profit(&*host, agent, now);
                AgentFate::Removed(RemovalReason::Consumed)
            }
            (Occupant::Agent { id, .. }, AgentRole::Trader) => {
                let target = TargetRef::Agent(id);
                if !agent.traded_with.contains(&target) {
                    if let Some(other) = self.state.agents.get(&id) {
                        host.trade_with_agent(agent, other);
                        agent.traded_with.insert(target);
                        self.record_encounter(agent, EncounterKind::TradeWithAgent, now);
                    }
                }
                agent.destination = None;
                self.return_home(&*host, agent, now)
            }
            _ => {
                agent.destination = None;
                self.return_home(&*host, agent, now)
            }
        }
    }

    /// Credits the trader's home with its cargo plus a random margin.
    fn credit_trade_profit(&mut self, host: &dyn WorldHost, agent: &mut Agent, now: u64) {
        let (low, high) = self.config.economy.trade_profit;
        let margin = self.rng.0.gen_range(low..=high.max(low));
        let profit = scale(agent.power, margin);
        match self.resolve_home(host, agent) {
            Some(home) => {
                self.credit(home, profit, CreditSource::TradeProfit, now);
            }
            None => debug!("{} has no home to bring {} profit to", agent.id, profit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::faction::{BehaviorCategory, FactionProfile};
    use crate::host::TileGraph;
    use crate::setup::GridWorld;

    const TRIBE: FactionId = FactionId(1);
    const RAIDERS: FactionId = FactionId(2);
    const COLONY: FactionId = FactionId(0);

    fn world() -> (Simulation, GridWorld) {
        let mut world = GridWorld::new(40, 20);
        world.add_faction(TRIBE, "tribe", false);
        world.add_faction(RAIDERS, "raiders", false);
        world.set_hostile(TRIBE, RAIDERS);
        world.add_settlement(world.tile(2, 2), TRIBE);
        world.add_settlement(world.tile(10, 2), RAIDERS);

        let mut sim = Simulation::new(SimConfig::default(), 3);
        for (faction, tile) in [(TRIBE, world.tile(2, 2)), (RAIDERS, world.tile(10, 2))] {
            let mut profile = FactionProfile::new(faction, "tribe", BehaviorCategory::Cautious);
            profile.add_settlement(Settlement::new(tile, faction, 1_000));
            sim.state.profiles.insert(faction, profile);
        }
        sim.state.initialized = true;
        (sim, world)
    }

    fn place(sim: &mut Simulation, role: AgentRole, faction: FactionId, at: TileId, home: TileId) -> Agent {
        let id = sim.state.allocate_agent_id();
        let mut agent = Agent::new(id, role, faction, at, 300);
        agent.home = Some(home);
        agent.ticks_per_move = 1;
        agent.next_scan_tick = u64::MAX;
        agent
    }

    #[test]
    fn test_faction_less_agent_is_inert() {
        let (mut sim, mut world) = world();
        let mut agent = place(&mut sim, AgentRole::Warband, TRIBE, world.tile(5, 5), world.tile(2, 2));
        agent.faction = None;
        assert_eq!(sim.tick_agent(&mut world, &mut agent, 60), AgentFate::Active);
        assert!(sim.events.is_empty());
    }

    #[test]
    fn test_reinforcement_credits_home() {
        let (mut sim, mut world) = world();
        let home = world.tile(2, 2);
        let mut agent = place(&mut sim, AgentRole::Warband, TRIBE, home, home);
        agent.destination = Some(TargetRef::Settlement(home));
        agent.path_to(&world, home);

        let fate = sim.tick_agent(&mut world, &mut agent, 1);
        assert_eq!(fate, AgentFate::Removed(RemovalReason::Consumed));
        assert_eq!(sim.state.settlement(home).unwrap().power, 1_300);
    }

    #[test]
    fn test_orphaned_agent_is_lost_on_housekeeping() {
        let (mut sim, mut world) = world();
        let home = world.tile(2, 2);
        let mut agent = place(&mut sim, AgentRole::Trader, TRIBE, world.tile(3, 3), home);
        world.remove_settlement(home);

        let period = sim.config.agents.housekeeping_period;
        assert_eq!(sim.tick_agent(&mut world, &mut agent, period - 1), AgentFate::Active);
        assert_eq!(
            sim.tick_agent(&mut world, &mut agent, period),
            AgentFate::Removed(RemovalReason::Lost)
        );
    }

    #[test]
    fn test_raid_on_ai_settlement_queues_reconstitution() {
        let (mut sim, mut world) = world();
        let target = world.tile(10, 2);
        let mut agent = place(&mut sim, AgentRole::Warband, TRIBE, target, world.tile(2, 2));
        agent.destination = Some(TargetRef::Settlement(target));
        agent.path_to(&world, target);

        let fate = sim.tick_agent(&mut world, &mut agent, 1);
        assert_eq!(fate, AgentFate::Removed(RemovalReason::Consumed));
        let raided = sim.state.settlement(target).unwrap();
        assert!(raided.power < 1_000);
        assert_eq!(raided.power + raided.pending_gains[0].points, 1_000);
    }

    #[test]
    fn test_trader_scan_never_trades_twice() {
        let (mut sim, mut world) = world();
        let neighbor = FactionId(3);
        world.add_faction(neighbor, "merchants", false);
        let here = world.tile(5, 5);
        world.add_caravan(CaravanId(7), here, neighbor, 400);

        let mut agent = place(&mut sim, AgentRole::Trader, TRIBE, here, world.tile(2, 2));
        for now in 1..=3 {
            agent.next_scan_tick = now;
            sim.tick_agent(&mut world, &mut agent, now);
        }

        assert_eq!(world.encounters_of(EncounterKind::TradeWithCaravan), 1);
        assert!(agent.traded_with.contains(&TargetRef::Caravan(CaravanId(7))));
    }

    #[test]
    fn test_battle_removes_the_loser() {
        let (mut sim, mut world) = world();
        let here = world.tile(6, 6);
        let mut defender = place(&mut sim, AgentRole::Warband, RAIDERS, here, world.tile(10, 2));
        defender.power = 100;
        let defender_id = defender.id;
        sim.state.agents.insert(defender_id, defender);

        let mut attacker = place(&mut sim, AgentRole::Warband, TRIBE, here, world.tile(2, 2));
        attacker.next_scan_tick = 1;
        let fate = sim.tick_agent(&mut world, &mut attacker, 1);

        assert_eq!(fate, AgentFate::Active);
        assert!(!sim.state.agents.contains_key(&defender_id));
        assert_eq!(attacker.power, 250);
        assert_eq!(attacker.destination, Some(TargetRef::Settlement(world.tile(2, 2))));
    }

    #[test]
    fn test_trader_profit_at_colony_credits_home() {
        let (mut sim, mut world) = world();
        world.add_faction(COLONY, "colony", true);
        let colony = world.tile(5, 2);
        world.add_settlement(colony, COLONY);

        let home = world.tile(2, 2);
        let mut agent = place(&mut sim, AgentRole::Trader, TRIBE, colony, home);
        agent.destination = Some(TargetRef::Settlement(colony));
        agent.path_to(&world, colony);

        let fate = sim.tick_agent(&mut world, &mut agent, 1);
        assert_eq!(fate, AgentFate::Removed(RemovalReason::Consumed));
        assert_eq!(world.encounters_of(EncounterKind::TradeWithPlayerSettlement), 1);

        // 300 power at a 5% to 25% margin
        let power = sim.state.settlement(home).unwrap().power;
        assert!((1_315..=1_375).contains(&power), "home power {}", power);
        let profit = sim.events.events.iter().find_map(|e| match e.kind {
            EventKind::PointsCredited {
                settlement,
                points,
                source: CreditSource::TradeProfit,
                ..
            } if settlement == home => Some(points),
            _ => None,
        });
        assert_eq!(profit, Some(power - 1_000));
    }

    #[test]
    fn test_widened_parent_search_adopts_distant_settlement() {
        let (mut sim, mut world) = world();
        let home = world.tile(2, 2);
        let far = world.tile(32, 2);
        world.add_settlement(far, TRIBE);
        if let Some(profile) = sim.state.profiles.get_mut(&TRIBE) {
            profile.add_settlement(Settlement::new(far, TRIBE, 500));
        }
        world.remove_settlement(home);

        let mut agent = place(&mut sim, AgentRole::Trader, TRIBE, world.tile(7, 2), home);
        assert!(world.distance(agent.position, far) > sim.config.agents.parent_search_radius);

        let period = sim.config.agents.housekeeping_period;
        assert_eq!(sim.tick_agent(&mut world, &mut agent, period), AgentFate::Active);
        assert_eq!(agent.home, Some(far));
        assert_eq!(agent.destination, Some(TargetRef::Settlement(far)));
        assert_eq!(agent.path.destination, Some(far));
    }

    #[test]
    fn test_raider_chases_close_target() {
        let (mut sim, mut world) = world();
        let prey = place(&mut sim, AgentRole::Trader, RAIDERS, world.tile(8, 6), world.tile(10, 2));
        let prey_id = prey.id;
        sim.state.agents.insert(prey_id, prey);

        let mut raider = place(&mut sim, AgentRole::Warband, TRIBE, world.tile(6, 6), world.tile(2, 2));
        raider.destination = Some(TargetRef::Agent(prey_id));
        raider.next_scan_tick = 1;

        assert_eq!(sim.tick_agent(&mut world, &mut raider, 1), AgentFate::Active);
        assert_eq!(raider.destination, Some(TargetRef::Agent(prey_id)));
        assert_eq!(raider.path.destination, Some(world.tile(8, 6)));
        assert!(sim.state.agents.contains_key(&prey_id));
    }

    #[test]
    fn test_raider_gives_up_on_distant_target() {
        let (mut sim, mut world) = world();
        let prey = place(&mut sim, AgentRole::Trader, RAIDERS, world.tile(9, 6), world.tile(10, 2));
        let prey_id = prey.id;
        sim.state.agents.insert(prey_id, prey);

        let home = world.tile(2, 2);
        let mut raider = place(&mut sim, AgentRole::Warband, TRIBE, world.tile(6, 6), home);
        raider.destination = Some(TargetRef::Agent(prey_id));
        raider.next_scan_tick = 1;

        assert_eq!(sim.tick_agent(&mut world, &mut raider, 1), AgentFate::Active);
        assert_eq!(raider.destination, Some(TargetRef::Settlement(home)));
        assert_eq!(raider.path.destination, Some(home));
        let returning = sim.events.events.iter().any(|e| {
            matches!(e.kind, EventKind::AgentReturningHome { agent, home: h } if agent == raider.id && h == home)
        });
        assert!(returning);
    }
}
