//! Faction profiles and behavior categories.
//!
//! A behavior category scales how far a faction reaches for targets and how
//! much it pays for each action. The action weight table is supplied through
//! [`ActionWeighting`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use war_events::{ActionKind, FactionId, TileId};

use crate::settlement::Settlement;

/// Strategic archetype of a faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorCategory {
    Player,
    Cautious,
    Aggressive,
    Warmonger,
    Expansionist,
    Merchant,
}

impl BehaviorCategory {
    /// Categories an AI faction can be rolled into.
    pub fn autonomous() -> &'static [BehaviorCategory] {
        &[
            BehaviorCategory::Cautious,
            BehaviorCategory::Aggressive,
            BehaviorCategory::Warmonger,
            BehaviorCategory::Expansionist,
            BehaviorCategory::Merchant,
        ]
    }

    /// Multiplier applied to the rounded base target range of an action.
    pub fn range_multiplier(self, action: ActionKind) -> f32 {
        use BehaviorCategory::*;
        match (action, self) {
            (ActionKind::Warband, Warmonger) => 1.4,
            (ActionKind::Warband, Cautious) => 0.8,
            (ActionKind::LaunchedWarband, Warmonger) => 1.25,
            (ActionKind::LaunchedWarband, Cautious) => 0.8,
            (ActionKind::Scout, Expansionist) => 1.5,
            (ActionKind::Scout, Warmonger) => 1.25,
            (ActionKind::Scout, Aggressive) => 1.15,
            (ActionKind::Settle, Expansionist) => 1.5,
            (ActionKind::Settle, Warmonger) => 0.8,
            (ActionKind::Trade, Expansionist) => 1.25,
            (ActionKind::Trade, Warmonger) => 0.8,
            (ActionKind::Trade, Merchant) => 1.5,
            (ActionKind::Diplomat, Merchant | Expansionist) => 1.25,
            _ => 1.0,
        }
    }

    /// Multiplier applied to an action's computed point cost.
    pub fn cost_multiplier(self, action: ActionKind) -> f32 {
        use BehaviorCategory::*;
        match (action, self) {
            (ActionKind::Warband | ActionKind::LaunchedWarband, Cautious) => 1.1,
            (ActionKind::Warband | ActionKind::LaunchedWarband, Warmonger) => 1.25,
            (ActionKind::Trade | ActionKind::Diplomat, Cautious) => 1.1,
            (ActionKind::Trade | ActionKind::Diplomat, Warmonger) => 0.8,
            (ActionKind::Trade | ActionKind::Diplomat, Merchant) => 1.3,
            _ => 1.0,
        }
    }

    /// Multiplier on organic settlement growth.
    pub fn growth_multiplier(self, expansionist_bonus: f32) -> f32 {
        match self {
            BehaviorCategory::Expansionist => expansionist_bonus,
            _ => 1.0,
        }
    }
}

impl fmt::Display for BehaviorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BehaviorCategory::Player => "player",
            BehaviorCategory::Cautious => "cautious",
            BehaviorCategory::Aggressive => "aggressive",
            BehaviorCategory::Warmonger => "warmonger",
            BehaviorCategory::Expansionist => "expansionist",
            BehaviorCategory::Merchant => "merchant",
        };
        f.write_str(name)
    }
}

impl FromStr for BehaviorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "player" => Ok(BehaviorCategory::Player),
            "cautious" => Ok(BehaviorCategory::Cautious),
            "aggressive" => Ok(BehaviorCategory::Aggressive),
            "warmonger" => Ok(BehaviorCategory::Warmonger),
            "expansionist" => Ok(BehaviorCategory::Expansionist),
            "merchant" => Ok(BehaviorCategory::Merchant),
            _ => Err(format!("unknown behavior category: '{}'", s)),
        }
    }
}

/// Scales a base value by a multiplier and rounds half away from zero.
pub fn scale(value: i64, multiplier: f32) -> i64 {
    (value as f32 * multiplier).round() as i64
}

/// An action name with its selection weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedAction {
    pub action: String,
    pub weight: f32,
}

impl WeightedAction {
    pub fn new(action: impl Into<String>, weight: f32) -> Self {
        Self {
            action: action.into(),
            weight,
        }
    }
}

/// Name reserved for "do nothing this cycle".
pub const NO_ACTION: &str = "none";

/// A faction's action probability table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionWeights {
    pub entries: Vec<WeightedAction>,
}

impl ActionWeights {
    pub fn from_table(table: &BTreeMap<String, f32>) -> Self {
        Self {
            entries: table
                .iter()
                .filter(|(_, w)| **w > 0.0)
                .map(|(name, w)| WeightedAction::new(name.clone(), *w))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Draws an action name, or `None` for an empty table or the reserved
    /// "none" entry. Names are returned raw; parsing happens at the call site.
    pub fn choose<R: Rng>(&self, rng: &mut R) -> Option<&str> {
        let chosen = weighted_random_choice(rng, &self.entries)?;
        if chosen.action == NO_ACTION {
            None
        } else {
            Some(chosen.action.as_str())
        }
    }
}

/// Weighted random selection over the candidates.
fn weighted_random_choice<'a, R: Rng>(
    rng: &mut R,
    candidates: &'a [WeightedAction],
) -> Option<&'a WeightedAction> {
    let total_weight: f32 = candidates.iter().map(|c| c.weight).sum();

    if total_weight <= 0.0 {
        return candidates.first();
    }

    let mut roll: f32 = rng.gen::<f32>() * total_weight;
    for candidate in candidates {
        roll -= candidate.weight;
        if roll <= 0.0 {
            return Some(candidate);
        }
    }

    // Float drift can leave a sliver of roll
    candidates.last()
}

/// Converts a profile into its action probability table.
pub trait ActionWeighting {
    fn weights_for(&self, profile: &FactionProfile) -> ActionWeights;
}

/// Weighting backed by the per-category tables of the configuration.
#[derive(Debug, Clone, Default)]
pub struct TableWeighting {
    pub tables: BTreeMap<String, BTreeMap<String, f32>>,
}

impl TableWeighting {
    pub fn new(tables: BTreeMap<String, BTreeMap<String, f32>>) -> Self {
        Self { tables }
    }
}

impl ActionWeighting for TableWeighting {
    fn weights_for(&self, profile: &FactionProfile) -> ActionWeights {
        if profile.behavior == BehaviorCategory::Player {
            return ActionWeights::default();
        }
        self.tables
            .get(&profile.behavior.to_string())
            .map(ActionWeights::from_table)
            .unwrap_or_default()
    }
}

/// Per-faction behavior plus the settlements it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionProfile {
    pub faction: FactionId,
    pub def_name: String,
    pub behavior: BehaviorCategory,
    pub moves_at_night: bool,
    pub hates_player: bool,
    pub creates_settlements: bool,
    pub hidden: bool,
    #[serde(default)]
    pub action_weights: ActionWeights,
    /// Owned settlements, unique by tile
    #[serde(default)]
    pub settlements: Vec<Settlement>,
}

impl FactionProfile {
    pub fn new(faction: FactionId, def_name: impl Into<String>, behavior: BehaviorCategory) -> Self {
        Self {
            faction,
            def_name: def_name.into(),
            behavior,
            moves_at_night: false,
            hates_player: false,
            creates_settlements: behavior != BehaviorCategory::Player,
            hidden: false,
            action_weights: ActionWeights::default(),
            settlements: Vec::new(),
        }
    }

    /// The player's profile: every autonomous flag off.
    pub fn player(faction: FactionId, def_name: impl Into<String>) -> Self {
        Self::new(faction, def_name, BehaviorCategory::Player)
    }

    pub fn is_player(&self) -> bool {
        self.behavior == BehaviorCategory::Player
    }

    pub fn settlement(&self, tile: TileId) -> Option<&Settlement> {
        self.settlements.iter().find(|s| s.tile == tile)
    }

    pub fn settlement_mut(&mut self, tile: TileId) -> Option<&mut Settlement> {
        self.settlements.iter_mut().find(|s| s.tile == tile)
    }

    /// Adds a settlement record unless one already exists at the tile.
    /// Returns true if it was added.
    pub fn add_settlement(&mut self, settlement: Settlement) -> bool {
        if self.settlement(settlement.tile).is_some() {
            return false;
        }
        self.settlements.push(settlement);
        true
    }

    pub fn remove_settlement(&mut self, tile: TileId) -> Option<Settlement> {
        let index = self.settlements.iter().position(|s| s.tile == tile)?;
        Some(self.settlements.remove(index))
    }

    pub fn total_power(&self) -> i64 {
        self.settlements.iter().map(|s| s.power).sum()
    }
}
