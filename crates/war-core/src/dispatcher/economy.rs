//! Periodic economy maintenance.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};
use war_events::{CreditSource, EventKind, FactionId, TileId};

use super::Simulation;
use crate::host::WorldHost;
use crate::settlement::Settlement;

impl Simulation {
    /// Growth, matured rewards, registry reconciliation and the victory
    /// check, in that order.
    pub(crate) fn run_maintenance(&mut self, host: &mut dyn WorldHost, now: u64) {
        self.grow_settlements(host, now);
        self.drain_pending_gains(now);

        self.register_new_factions(host, now);
        let factions: Vec<FactionId> = self.state.profiles.keys().copied().collect();
        if let Some(&faction) = factions.choose(&mut self.rng.0) {
            self.reconcile_settlements(host, faction, now);
        }

        self.evaluate_victory(host, now);
    }

    /// Organic growth of every non-player settlement:
    /// `(power / 1000 + 2 + biome) * behavior * tech * noise`, rounded.
    pub(crate) fn grow_settlements(&mut self, host: &dyn WorldHost, now: u64) {
        let (noise_low, noise_high) = self.config.economy.growth_noise;
        let expansionist = self.config.economy.expansionist_growth_multiplier;

        let mut credits: Vec<(TileId, i64)> = Vec::new();
        for profile in self.state.profiles.values() {
            if profile.is_player() {
                continue;
            }
            let multiplier =
                profile.behavior.growth_multiplier(expansionist) * host.tech_multiplier(profile.faction);
            for settlement in &profile.settlements {
                let base = (settlement.power / 1000) as f32 + 2.0 + host.biome_multiplier(settlement.tile);
                let noise = self.rng.0.gen_range(noise_low..=noise_high.max(noise_low));
                let points = (base * multiplier * noise).round() as i64;
                credits.push((settlement.tile, points));
            }
        }

        let total: i64 = credits.iter().map(|(_, p)| p).sum();
        for (tile, points) in credits {
            self.credit(tile, points, CreditSource::Growth, now);
        }
        debug!("Settlement growth added {} points at tick {}", total, now);
    }

    /// Applies every matured delayed reward of every settlement.
    pub(crate) fn drain_pending_gains(&mut self, now: u64) {
        let mut applied = Vec::new();
        for profile in self.state.profiles.values_mut() {
            for settlement in profile.settlements.iter_mut() {
                for gain in settlement.drain_matured_gains(now) {
                    applied.push((settlement.tile, settlement.faction, gain.points));
                }
            }
        }
        for (tile, faction, points) in applied {
            self.events.record(
                now,
                EventKind::PointsCredited {
                    settlement: tile,
                    faction,
                    points,
                    source: CreditSource::PendingGain,
                },
            );
        }
    }

    /// Reconciles one faction's settlement records with the world in both
    /// directions: records without a matching world settlement are dropped
    /// and unregistered world settlements gain a record.
    pub(crate) fn reconcile_settlements(&mut self, host: &dyn WorldHost, faction: FactionId, now: u64) {
        let world: Vec<TileId> = host
            .settlements()
            .into_iter()
            .filter(|(_, owner)| *owner == faction)
            .map(|(tile, _)| tile)
            .collect();
        let initial_power = host.initial_settlement_power(faction);

        let Some(profile) = self.state.profiles.get_mut(&faction) else {
            return;
        };

        let orphaned: Vec<TileId> = profile
            .settlements
            .iter()
            .map(|s| s.tile)
            .filter(|tile| !world.contains(tile))
            .collect();
        for tile in &orphaned {
            profile.remove_settlement(*tile);
        }

        let mut registered = Vec::new();
        for tile in world {
            if profile.add_settlement(Settlement::new(tile, faction, initial_power)) {
                registered.push(tile);
            }
        }

        for tile in orphaned {
            info!("Dropped settlement record {} of {}", tile, faction);
            self.events.record(
                now,
                EventKind::SettlementDropped {
                    settlement: tile,
                    faction,
                },
            );
        }
        for tile in registered {
            info!("Registered settlement {} for {}", tile, faction);
            self.events.record(
                now,
                EventKind::SettlementRegistered {
                    settlement: tile,
                    faction,
                    power: initial_power,
                },
            );
        }
    }

    /// Picks a rival if none is set yet, then checks it for defeat in the
    /// same pass.
    pub(crate) fn evaluate_victory(&mut self, host: &dyn WorldHost, now: u64) {
        if let Some(kind) = self.state.victory.select_rival(&self.state.profiles, &mut self.rng.0) {
            self.events.record(now, kind);
        }
        if let Some(kind) = self.state.victory.check_defeat(host) {
            self.events.record(now, kind);
        }
    }

    /// Reduces a settlement after an engagement and queues the loss to flow
    /// back after the reconstitution delay.
    pub(crate) fn apply_engagement_loss(&mut self, tile: TileId, lost: i64, now: u64) {
        if lost <= 0 {
            return;
        }
        let ready_at = now + self.config.economy.reconstitution_delay;
        let Some(settlement) = self.state.settlement_mut(tile) else {
            return;
        };
        let lost = lost.min(settlement.power.max(0));
        settlement.debit(lost);
        settlement.queue_gain(lost, ready_at);
        let faction = settlement.faction;
        self.events.record(
            now,
            EventKind::PointsLost {
                settlement: tile,
                faction,
                points: lost,
            },
        );
    }
}
