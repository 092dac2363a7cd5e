//! Faction-level global actions.
//!
//! A global action is drawn from the same weight table as settlement actions
//! but acts for the faction as a whole: ambient growth, opportunistic agents
//! sent at the player, or a relationship shift with another faction. Agents
//! sent here are not paid for by their origin.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};
use war_events::{ActionKind, AgentId, CreditSource, EventKind, FactionId, TileId};

use super::{Simulation, SpawnOrder};
use crate::agent::TargetRef;
use crate::error::DispatchError;
use crate::faction::{scale, BehaviorCategory};
use crate::host::WorldHost;

impl Simulation {
    /// Picks a random faction and lets it take one weighted global action.
    /// Failures are logged and skipped.
    pub(crate) fn run_global_action(&mut self, host: &mut dyn WorldHost, now: u64) {
        let factions: Vec<FactionId> = self.state.profiles.keys().copied().collect();
        let Some(&faction) = factions.choose(&mut self.rng.0) else {
            return;
        };
        let Some(profile) = self.state.profiles.get(&faction) else {
            return;
        };
        if profile.is_player() {
            return;
        }
        let Some(name) = profile.action_weights.choose(&mut self.rng.0).map(str::to_owned) else {
            return;
        };
        let action = match name.parse::<ActionKind>() {
            Ok(action) => action,
            Err(e) => {
                warn!("Ignoring global action drawn for {}: {}", faction, e);
                return;
            }
        };

        if let Err(e) = self.global_action(host, faction, action, now) {
            warn!("Global {} by {} failed: {}", action, faction, e);
        }
    }

    /// Runs one global action for `faction`.
    pub fn global_action(
        &mut self,
        host: &mut dyn WorldHost,
        faction: FactionId,
        action: ActionKind,
        now: u64,
    ) -> Result<(), DispatchError> {
        debug!("{} takes global action {}", faction, action);
        match action {
            ActionKind::Trade => {
                let origin = self.random_settlement(faction)?;
                let (low, high) = self.config.economy.ambient_growth;
                let points = self.rng.0.gen_range(low..=high.max(low));
                self.credit(origin, points, CreditSource::AmbientGrowth, now);
            }
            ActionKind::Diplomat => {
                let origin = self.random_settlement(faction)?;
                let target = self.random_player_settlement()?;
                let power = self.priced_at_origin(&*host, origin)?;
                self.send_unpaid(&*host, ActionKind::Diplomat, faction, origin, target, power, now);
            }
            ActionKind::LaunchedWarband => {
                let origin = self.random_settlement(faction)?;
                let target = self.most_vulnerable_player_settlement(&*host)?;
                let behavior = self.behavior_of(faction)?;
                let power = self
                    .state
                    .settlement(target)
                    .map(|s| host.raid_cost(s))
                    .ok_or(DispatchError::MissingSettlement(target))?;
                let power = scale(power, behavior.cost_multiplier(action));
                self.send_unpaid(&*host, action, faction, origin, target, power, now);
            }
            ActionKind::Scout => {
                let origin = self.random_settlement(faction)?;
                let target = self.most_vulnerable_player_settlement(&*host)?;
                let behavior = self.behavior_of(faction)?;
                let target_power = self
                    .state
                    .settlement(target)
                    .map(|s| s.power)
                    .ok_or(DispatchError::MissingSettlement(target))?;
                let power = host.scout_cost(behavior, target_power);
                self.send_unpaid(&*host, action, faction, origin, target, power, now);
            }
            ActionKind::Settle => {
                let delta = self.config.economy.relationship_delta.abs();
                let shift = self.rng.0.gen_range(0..=delta);
                self.shift_relationship(host, faction, shift, now);
            }
            ActionKind::Warband => {
                let delta = self.config.economy.relationship_delta.abs();
                let shift = self.rng.0.gen_range(-delta..=0);
                self.shift_relationship(host, faction, shift, now);
            }
        }
        Ok(())
    }

    fn behavior_of(&self, faction: FactionId) -> Result<BehaviorCategory, DispatchError> {
        self.state
            .profiles
            .get(&faction)
            .map(|p| p.behavior)
            .ok_or(DispatchError::MissingFaction(faction))
    }

    fn random_settlement(&mut self, faction: FactionId) -> Result<TileId, DispatchError> {
        let profile = self
            .state
            .profiles
            .get(&faction)
            .ok_or(DispatchError::MissingFaction(faction))?;
        profile
            .settlements
            .choose(&mut self.rng.0)
            .map(|s| s.tile)
            .ok_or(DispatchError::NoSettlements(faction))
    }

    fn player_settlements(&self) -> Vec<TileId> {
        self.state
            .profiles
            .values()
            .filter(|p| p.is_player())
            .flat_map(|p| p.settlements.iter().map(|s| s.tile))
            .collect()
    }

    fn random_player_settlement(&mut self) -> Result<TileId, DispatchError> {
        let tiles = self.player_settlements();
        tiles
            .choose(&mut self.rng.0)
            .copied()
            .ok_or(DispatchError::NoPlayerSettlements)
    }

    /// The player settlement that is cheapest to raid.
    fn most_vulnerable_player_settlement(&self, host: &dyn WorldHost) -> Result<TileId, DispatchError> {
        self.state
            .profiles
            .values()
            .filter(|p| p.is_player())
            .flat_map(|p| p.settlements.iter())
            .min_by_key(|s| (host.raid_cost(s), s.tile))
            .map(|s| s.tile)
            .ok_or(DispatchError::NoPlayerSettlements)
    }

    fn priced_at_origin(&self, host: &dyn WorldHost, origin: TileId) -> Result<i64, DispatchError> {
        let profile_behavior = self
            .state
            .settlement_owner(origin)
            .and_then(|f| self.state.profiles.get(&f))
            .map(|p| p.behavior)
            .ok_or(DispatchError::MissingSettlement(origin))?;
        let record = self
            .state
            .settlement(origin)
            .ok_or(DispatchError::MissingSettlement(origin))?;
        Ok(scale(
            host.diplomat_cost(record),
            profile_behavior.cost_multiplier(ActionKind::Diplomat),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn send_unpaid(
        &mut self,
        host: &dyn WorldHost,
        action: ActionKind,
        faction: FactionId,
        origin: TileId,
        target: TileId,
        power: i64,
        now: u64,
    ) -> AgentId {
        self.spawn_agent(
            host,
            SpawnOrder {
                role: action.spawned_role(),
                faction,
                origin,
                target: TargetRef::Settlement(target),
                target_tile: target,
                power: power.max(1),
            },
            now,
        )
    }

    /// Shifts goodwill between `faction` and a random other non-player
    /// faction.
    fn shift_relationship(&mut self, host: &mut dyn WorldHost, faction: FactionId, delta: i32, now: u64) {
        let others: Vec<FactionId> = self
            .state
            .profiles
            .values()
            .filter(|p| p.faction != faction && !p.is_player())
            .map(|p| p.faction)
            .collect();
        let Some(&other) = others.choose(&mut self.rng.0) else {
            debug!("{} has no faction to deal with", faction);
            return;
        };
        host.adjust_relationship(faction, other, delta);
        info!("Relations between {} and {} shift by {}", faction, other, delta);
        self.events.record(
            now,
            EventKind::RelationshipShifted {
                faction,
                other,
                delta,
            },
        );
    }
}
