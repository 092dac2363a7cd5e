//! Victory monitor.
//!
//! Picks a rival faction for the player and declares game-end once that
//! faction owns no settlement in the world.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use war_events::{EventKind, FactionId};

use crate::faction::FactionProfile;
use crate::host::EntityRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryMonitor {
    pub rival: Option<FactionId>,
    pub achieved: bool,
}

impl VictoryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn game_over(&self) -> bool {
        self.achieved
    }

    /// Chooses the rival if none is set yet. Hostile-to-player factions that
    /// are not hidden come first; otherwise any non-player faction.
    pub fn select_rival<R: Rng>(
        &mut self,
        profiles: &BTreeMap<FactionId, FactionProfile>,
        rng: &mut R,
    ) -> Option<EventKind> {
        if self.rival.is_some() {
            return None;
        }
        let haters: Vec<FactionId> = profiles
            .values()
            .filter(|p| p.hates_player && !p.hidden && !p.is_player())
            .map(|p| p.faction)
            .collect();
        let candidates: Vec<FactionId> = if haters.is_empty() {
            profiles
                .values()
                .filter(|p| !p.is_player())
                .map(|p| p.faction)
                .collect()
        } else {
            haters
        };
        let faction = *candidates.choose(rng)?;
        self.rival = Some(faction);
        tracing::info!("{} issues the victory challenge", faction);
        Some(EventKind::VictoryChallengeIssued { faction })
    }

    /// Declares victory once the rival holds no settlement in the world.
    pub fn check_defeat<H: EntityRegistry + ?Sized>(&mut self, registry: &H) -> Option<EventKind> {
        if self.achieved {
            return None;
        }
        let faction = self.rival?;
        let remaining = registry
            .settlements()
            .into_iter()
            .filter(|(_, owner)| *owner == faction)
            .count();
        if remaining > 0 {
            return None;
        }
        self.achieved = true;
        tracing::info!("{} has lost every settlement, victory achieved", faction);
        Some(EventKind::VictoryAchieved { faction })
    }
}
