//! Settlement-level action attempts.
//!
//! Every action follows the same shape: derive a target range from the
//! settlement's balance, pick a candidate, price it, gate on affordability,
//! then debit the settlement and spawn the agent.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use war_events::{ActionKind, AgentId, FactionId, TileId};

use super::{Simulation, SpawnOrder};
use crate::agent::{is_caravan_like, is_raider, TargetRef};
use crate::error::DispatchError;
use crate::faction::{scale, BehaviorCategory};
use crate::host::{ObjectKind, WorldHost};

/// Share of the balance an immediate raid may spend.
const WARBAND_BUDGET: f64 = 0.75;
/// Share of the balance a launched raid may spend.
const LAUNCHED_WARBAND_BUDGET: f64 = 0.6;
/// Share of the balance trade, diplomacy and scouting may spend.
const MISSION_BUDGET: f64 = 0.5;

/// Result of an action attempt that ran to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Spawned { agent: AgentId, spent: i64 },
    NoTarget,
    OutOfRange,
    Unaffordable,
    BelowMinimumBalance,
    NoFeasibleSite,
    /// The faction is not allowed to take this action
    NotPermitted,
}

impl ActionOutcome {
    pub fn spawned(&self) -> Option<AgentId> {
        match self {
            ActionOutcome::Spawned { agent, .. } => Some(*agent),
            _ => None,
        }
    }
}

/// The acting settlement, captured before anything is mutated.
#[derive(Debug, Clone, Copy)]
struct Origin {
    faction: FactionId,
    tile: TileId,
    power: i64,
    behavior: BehaviorCategory,
    creates_settlements: bool,
}

impl Origin {
    fn can_spend(&self, cost: i64, budget: f64) -> bool {
        self.power as f64 * budget >= cost as f64
    }
}

impl Simulation {
    /// Attempts `action` on behalf of the settlement at `tile` at the current
    /// tick. Refreshes the settlement's neighbor cache first if it is stale.
    pub fn attempt_settlement_action(
        &mut self,
        host: &dyn WorldHost,
        tile: TileId,
        action: ActionKind,
    ) -> Result<ActionOutcome, DispatchError> {
        let faction = self
            .state
            .settlement_owner(tile)
            .ok_or(DispatchError::MissingSettlement(tile))?;
        let now = self.state.tick;
        let staleness = self.config.cadence.neighbor_cache_staleness;
        if self.state.settlement(tile).is_some_and(|s| s.neighbors_stale(now, staleness)) {
            self.refresh_neighbors(host, tile, now);
        }
        self.attempt_action(host, faction, tile, action, now)
    }

    pub(crate) fn attempt_action(
        &mut self,
        host: &dyn WorldHost,
        faction: FactionId,
        tile: TileId,
        action: ActionKind,
        now: u64,
    ) -> Result<ActionOutcome, DispatchError> {
        let origin = self.origin(faction, tile)?;
        let outcome = match action {
            ActionKind::Warband => self.attempt_raid(host, origin, action, 1.25, WARBAND_BUDGET, now),
            ActionKind::LaunchedWarband => {
                self.attempt_raid(host, origin, action, 2.0, LAUNCHED_WARBAND_BUDGET, now)
            }
            ActionKind::Trade => self.attempt_trade(host, origin, now),
            ActionKind::Diplomat => self.attempt_diplomat(host, origin, now),
            ActionKind::Scout => self.attempt_scout(host, origin, now),
            ActionKind::Settle => self.attempt_settle(host, origin, now),
        };
        Ok(outcome)
    }

    fn origin(&self, faction: FactionId, tile: TileId) -> Result<Origin, DispatchError> {
        let profile = self
            .state
            .profiles
            .get(&faction)
            .ok_or(DispatchError::MissingFaction(faction))?;
        if profile.is_player() {
            return Err(DispatchError::PlayerFaction(faction));
        }
        let settlement = profile
            .settlement(tile)
            .ok_or(DispatchError::MissingSettlement(tile))?;
        Ok(Origin {
            faction,
            tile,
            power: settlement.power,
            behavior: profile.behavior,
            creates_settlements: profile.creates_settlements,
        })
    }

    /// `round(round(power / (factor * divider)) * behavior multiplier)`
    fn target_range(&self, origin: Origin, action: ActionKind, divisor_factor: f32) -> u32 {
        let divisor = divisor_factor * self.config.cadence.target_range_divider;
        let base = (origin.power as f32 / divisor).round() as i64;
        scale(base, origin.behavior.range_multiplier(action)).max(0) as u32
    }

    fn pick_neighbor(&mut self, tile: TileId, hostile: bool) -> Option<TileId> {
        let settlement = self.state.settlement(tile)?;
        let neighbors = if hostile {
            &settlement.nearby_hostile
        } else {
            &settlement.nearby_friendly
        };
        neighbors.choose(&mut self.rng.0).copied()
    }

    fn attempt_raid(
        &mut self,
        host: &dyn WorldHost,
        origin: Origin,
        action: ActionKind,
        divisor_factor: f32,
        budget: f64,
        now: u64,
    ) -> ActionOutcome {
        let range = self.target_range(origin, action, divisor_factor);
        let Some(target) = self.pick_neighbor(origin.tile, true) else {
            return ActionOutcome::NoTarget;
        };
        if host.distance(origin.tile, target) > range {
            return ActionOutcome::OutOfRange;
        }
        let Some(record) = self.state.settlement(target) else {
            return ActionOutcome::NoTarget;
        };
        let cost = scale(host.raid_cost(record), origin.behavior.cost_multiplier(action)).max(1);
        if !origin.can_spend(cost, budget) {
            debug!("{} cannot afford a {} costing {}", origin.tile, action, cost);
            return ActionOutcome::Unaffordable;
        }
        self.spend(host, origin, action, TargetRef::Settlement(target), target, cost, now)
    }

    /// Trade never fails on price: the cost is clamped to half the balance.
    fn attempt_trade(&mut self, host: &dyn WorldHost, origin: Origin, now: u64) -> ActionOutcome {
        if origin.power <= self.config.economy.trade_min_balance {
            return ActionOutcome::BelowMinimumBalance;
        }
        let range = self.target_range(origin, ActionKind::Trade, 1.0);
        let Some(target) = self.pick_neighbor(origin.tile, false) else {
            return ActionOutcome::NoTarget;
        };
        if host.distance(origin.tile, target) > range {
            return ActionOutcome::OutOfRange;
        }
        let Some(record) = self.state.settlement(target) else {
            return ActionOutcome::NoTarget;
        };
        let cost = scale(host.raid_cost(record), origin.behavior.cost_multiplier(ActionKind::Trade));
        let max_cost = scale(origin.power, MISSION_BUDGET as f32);
        let spent = cost.min(max_cost).max(1);
        self.spend(host, origin, ActionKind::Trade, TargetRef::Settlement(target), target, spent, now)
    }

    fn attempt_diplomat(&mut self, host: &dyn WorldHost, origin: Origin, now: u64) -> ActionOutcome {
        if origin.power <= self.config.economy.diplomat_min_balance {
            return ActionOutcome::BelowMinimumBalance;
        }
        let range = self.target_range(origin, ActionKind::Diplomat, 1.0);
        let candidates: Vec<TileId> = self
            .state
            .profiles
            .values()
            .filter(|p| p.faction != origin.faction)
            .flat_map(|p| p.settlements.iter().map(|s| s.tile))
            .filter(|tile| host.distance(origin.tile, *tile) <= range)
            .collect();
        let Some(&target) = candidates.choose(&mut self.rng.0) else {
            return ActionOutcome::NoTarget;
        };
        let Some(record) = self.state.settlement(origin.tile) else {
            return ActionOutcome::NoTarget;
        };
        let cost = scale(host.diplomat_cost(record), origin.behavior.cost_multiplier(ActionKind::Diplomat));
        if !origin.can_spend(cost, MISSION_BUDGET) {
            return ActionOutcome::Unaffordable;
        }
        self.spend(host, origin, ActionKind::Diplomat, TargetRef::Settlement(target), target, cost, now)
    }

    /// Scouts the first hostile object in range worth at most half the
    /// balance, if scouting it also costs at most half the balance. Caravans
    /// are only spotted within their visibility.
    fn attempt_scout(&mut self, host: &dyn WorldHost, origin: Origin, now: u64) -> ActionOutcome {
        let range = self.target_range(origin, ActionKind::Scout, 1.0);
        let ceiling = origin.power as f64 * MISSION_BUDGET;
        let hostile = |owner: Option<FactionId>| {
            owner.is_some_and(|o| o != origin.faction && host.is_hostile(origin.faction, o))
        };

        let mut found: Option<(TargetRef, TileId, i64)> = None;
        for object in host.objects_in_range(origin.tile, range) {
            if !hostile(object.faction) {
                continue;
            }
            match object.kind {
                ObjectKind::Caravan { id, wealth, visibility } => {
                    let value = wealth / 200;
                    let sighting = (range as f32 * visibility).round().max(0.0) as u32;
                    if value as f64 <= ceiling && host.distance(origin.tile, object.tile) <= sighting {
                        found = Some((TargetRef::Caravan(id), object.tile, value));
                        break;
                    }
                }
                ObjectKind::Settlement => {
                    if let Some(record) = self.state.settlement(object.tile) {
                        if record.power as f64 <= ceiling {
                            found = Some((TargetRef::Settlement(object.tile), object.tile, record.power));
                            break;
                        }
                    }
                }
            }
        }
        if found.is_none() {
            found = self
                .state
                .agents_in_range(host, origin.tile, range)
                .into_iter()
                .filter_map(|id| self.state.agents.get(&id))
                .find(|a| {
                    (is_raider(a.role) || is_caravan_like(a.role))
                        && hostile(a.faction)
                        && a.power as f64 <= ceiling
                })
                .map(|a| (TargetRef::Agent(a.id), a.position, a.power));
        }

        let Some((target, target_tile, value)) = found else {
            return ActionOutcome::NoTarget;
        };
        let cost = host.scout_cost(origin.behavior, value).max(1);
        if !origin.can_spend(cost, MISSION_BUDGET) {
            debug!("{} cannot afford a scouting party costing {}", origin.tile, cost);
            return ActionOutcome::Unaffordable;
        }
        self.spend(host, origin, ActionKind::Scout, target, target_tile, cost, now)
    }

    /// Samples candidate sites and sends a settler to the first one with no
    /// settlement nearby.
    fn attempt_settle(&mut self, host: &dyn WorldHost, origin: Origin, now: u64) -> ActionOutcome {
        if !origin.creates_settlements {
            return ActionOutcome::NotPermitted;
        }
        let economy = &self.config.economy;
        if origin.power <= economy.settler_min_balance {
            return ActionOutcome::BelowMinimumBalance;
        }
        let (min_distance, candidates, proximity) = (
            economy.settle_min_distance,
            economy.settle_candidates,
            economy.settle_proximity_radius,
        );
        let (fraction_low, fraction_high) = economy.settler_cost_fraction;
        let cost_base = economy.settler_cost_base;

        let range = self.target_range(origin, ActionKind::Settle, 1.0);
        let sites: Vec<TileId> = (0..candidates)
            .filter_map(|_| host.find_new_site(origin.tile, min_distance, range, &mut self.rng.0))
            .collect();

        for site in sites {
            if host.distance(origin.tile, site) > range {
                continue;
            }
            let crowded = host
                .objects_in_range(site, proximity)
                .iter()
                .any(|o| matches!(o.kind, ObjectKind::Settlement));
            if crowded {
                continue;
            }
            let fraction = self.rng.0.gen_range(fraction_low..=fraction_high.max(fraction_low));
            let cost = ((fraction * cost_base).round() as i64).clamp(1, origin.power);
            return self.spend(host, origin, ActionKind::Settle, TargetRef::Site(site), site, cost, now);
        }
        ActionOutcome::NoFeasibleSite
    }

    /// Debits the origin and spawns the agent carrying the spent points.
    #[allow(clippy::too_many_arguments)]
    fn spend(
        &mut self,
        host: &dyn WorldHost,
        origin: Origin,
        action: ActionKind,
        target: TargetRef,
        target_tile: TileId,
        cost: i64,
        now: u64,
    ) -> ActionOutcome {
        self.debit(origin.tile, cost, action, now);
        let agent = self.spawn_agent(
            host,
            SpawnOrder {
                role: action.spawned_role(),
                faction: origin.faction,
                origin: origin.tile,
                target,
                target_tile,
                power: cost,
            },
            now,
        );
        ActionOutcome::Spawned { agent, spent: cost }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::faction::FactionProfile;
    use crate::settlement::Settlement;
    use crate::setup::GridWorld;
    use crate::host::TileGraph;
    use war_events::EventKind;

    const WARLORDS: FactionId = FactionId(1);
    const VILLAGERS: FactionId = FactionId(2);

    fn duel(attacker_power: i64, defender_power: i64) -> (Simulation, GridWorld, TileId, TileId) {
        let mut world = GridWorld::new(40, 40);
        world.add_faction(WARLORDS, "warlords", false);
        world.add_faction(VILLAGERS, "villagers", false);
        world.set_hostile(WARLORDS, VILLAGERS);
        let origin = world.tile(5, 5);
        let target = world.tile(15, 5);
        world.add_settlement(origin, WARLORDS);
        world.add_settlement(target, VILLAGERS);

        let mut sim = Simulation::new(SimConfig::default(), 21);
        let mut warlords = FactionProfile::new(WARLORDS, "warlords", BehaviorCategory::Warmonger);
        warlords.add_settlement(Settlement::new(origin, WARLORDS, attacker_power));
        let mut villagers = FactionProfile::new(VILLAGERS, "villagers", BehaviorCategory::Cautious);
        villagers.add_settlement(Settlement::new(target, VILLAGERS, defender_power));
        sim.state.profiles.insert(WARLORDS, warlords);
        sim.state.profiles.insert(VILLAGERS, villagers);
        sim.state.initialized = true;
        (sim, world, origin, target)
    }

    #[test]
    fn test_warband_spends_exactly_its_cost() {
        let (mut sim, world, origin, target) = duel(1_500, 1_200);

        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::Warband)
            .unwrap();

        let agent = outcome.spawned().expect("warband should spawn");
        assert_eq!(outcome, ActionOutcome::Spawned { agent, spent: 900 });
        assert_eq!(sim.state.settlement(origin).unwrap().power, 600);
        let warband = &sim.state.agents[&agent];
        assert_eq!(warband.position, origin);
        assert_eq!(warband.power, 900);
        assert_eq!(warband.path.destination, Some(target));
    }

    #[test]
    fn test_unaffordable_raid_leaves_balance() {
        let (mut sim, world, origin, _) = duel(1_100, 1_200);
        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::Warband)
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Unaffordable);
        assert_eq!(sim.state.settlement(origin).unwrap().power, 1_100);
        assert!(sim.state.agents.is_empty());
    }

    #[test]
    fn test_out_of_range_target_is_rejected() {
        // Launched raids reach half as far: round(1500 / 200) * 1.25 = 10
        let (mut sim, mut world, origin, _) = duel(1_500, 100);
        let far = world.tile(25, 5);
        world.add_settlement(far, VILLAGERS);
        if let Some(p) = sim.state.profiles.get_mut(&VILLAGERS) {
            p.remove_settlement(world.tile(15, 5));
            p.add_settlement(Settlement::new(far, VILLAGERS, 100));
        }
        world.remove_settlement(world.tile(15, 5));

        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::LaunchedWarband)
            .unwrap();
        assert_eq!(outcome, ActionOutcome::OutOfRange);
    }

    #[test]
    fn test_trade_clamps_cost_to_half_balance() {
        let (mut sim, mut world, origin, target) = duel(1_200, 5_000);
        world.set_goodwill(WARLORDS, VILLAGERS, 50);

        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::Trade)
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Spawned { spent: 600, .. }));
        assert_eq!(sim.state.settlement(origin).unwrap().power, 600);
        assert!(sim.state.settlement(target).is_some());
    }

    #[test]
    fn test_scout_cost_is_capped_at_half_the_balance() {
        // Worth 500 against a 1000 balance, but scouting it costs 550
        let (mut sim, world, origin, _) = duel(1_000, 500);
        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::Scout)
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Unaffordable);
        assert_eq!(sim.state.settlement(origin).unwrap().power, 1_000);

        let (mut sim, world, origin, target) = duel(1_000, 400);
        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::Scout)
            .unwrap();
        assert!(matches!(outcome, ActionOutcome::Spawned { spent: 450, .. }));
        let agent = outcome.spawned().unwrap();
        assert_eq!(sim.state.agents[&agent].destination, Some(TargetRef::Settlement(target)));
    }

    #[test]
    fn test_poor_settlement_cannot_settle() {
        let (mut sim, world, origin, _) = duel(1_500, 100);
        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::Settle)
            .unwrap();
        assert_eq!(outcome, ActionOutcome::BelowMinimumBalance);
    }

    #[test]
    fn test_settler_heads_for_an_open_site() {
        let (mut sim, mut world, origin, target) = duel(3_000, 100);
        world.remove_settlement(target);
        let outcome = sim
            .attempt_settlement_action(&world, origin, ActionKind::Settle)
            .unwrap();
        let Some(agent) = outcome.spawned() else {
            panic!("expected a settler, got {:?}", outcome);
        };
        let settler = &sim.state.agents[&agent];
        let Some(TargetRef::Site(site)) = settler.destination else {
            panic!("settler without a site");
        };
        assert!(world.distance(origin, site) >= 10);
        assert!((800..=1_200).contains(&settler.power));
        assert_eq!(sim.state.settlement(origin).unwrap().power, 3_000 - settler.power);
    }

    #[test]
    fn test_player_settlements_never_act() {
        let (mut sim, mut world, _, _) = duel(1_500, 1_200);
        let home = world.tile(30, 30);
        world.add_faction(FactionId(0), "colony", true);
        world.add_settlement(home, FactionId(0));
        let mut player = FactionProfile::player(FactionId(0), "colony");
        player.add_settlement(Settlement::new(home, FactionId(0), 5_000));
        sim.state.profiles.insert(FactionId(0), player);

        let result = sim.attempt_settlement_action(&world, home, ActionKind::Warband);
        assert_eq!(result, Err(DispatchError::PlayerFaction(FactionId(0))));
        assert_eq!(
            sim.attempt_settlement_action(&world, world.tile(0, 0), ActionKind::Trade),
            Err(DispatchError::MissingSettlement(world.tile(0, 0)))
        );
        assert!(!sim
            .events
            .events
            .iter()
            .any(|e| matches!(e.kind, EventKind::PointsDebited { .. })));
    }
}
