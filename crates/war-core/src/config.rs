//! Configuration loading for the simulation.
//!
//! All tuning parameters live in a TOML file. Every section falls back to its
//! defaults, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::faction::BehaviorCategory;

/// Default tuning file path
pub const DEFAULT_CONFIG_PATH: &str = "war_sim.toml";

/// Complete simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub agents: AgentConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    /// Behavior name -> action name -> weight
    #[serde(default = "default_action_weights")]
    pub action_weights: BTreeMap<String, BTreeMap<String, f32>>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            cadence: CadenceConfig::default(),
            agents: AgentConfig::default(),
            economy: EconomyConfig::default(),
            behavior: BehaviorConfig::default(),
            action_weights: default_action_weights(),
        }
    }
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads the default config path, or falls back to built-in defaults.
    pub fn load_or_default() -> Self {
        if !Path::new(DEFAULT_CONFIG_PATH).exists() {
            return Self::default();
        }
        Self::from_file(DEFAULT_CONFIG_PATH).unwrap_or_else(|e| {
            tracing::warn!("Could not load {}: {}. Using defaults.", DEFAULT_CONFIG_PATH, e);
            Self::default()
        })
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Static behavior entry for a faction definition name, if any.
    pub fn behavior_entry(&self, def_name: &str) -> Option<&FactionBehaviorEntry> {
        self.behavior.factions.iter().find(|e| e.def_name == def_name)
    }
}

/// Tick cadences of the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    /// Tick at which factions are discovered and profiled
    pub init_tick: u64,
    /// Growth, reward reconciliation, registry drift and victory checks
    pub maintenance_interval: u64,
    /// Faction-level global action
    pub global_action_interval: u64,
    /// Delay between per-settlement evaluations, in ticks
    pub local_evaluation_delay: (u64, u64),
    /// Per-settlement cooldown, in maintenance periods
    pub settlement_cooldown_periods: (u64, u64),
    /// Age after which a settlement's neighbor lists are rescanned
    pub neighbor_cache_staleness: u64,
    /// Settlement points per tile of target range
    pub target_range_divider: f32,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            init_tick: 10,
            maintenance_interval: 2_500,
            global_action_interval: 60_000,
            local_evaluation_delay: (30, 100),
            settlement_cooldown_periods: (12, 24),
            neighbor_cache_staleness: 120_000,
            target_range_divider: 100.0,
        }
    }
}

/// Agent state machine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub housekeeping_period: u64,
    pub scan_radius: u32,
    /// Destinations this close are resolved immediately
    pub engage_radius: u32,
    /// Destinations this close are chased; farther ones are dropped
    pub approach_radius: u32,
    pub parent_search_radius: u32,
    /// Multiplier applied to the parent search radius on the second pass
    pub parent_search_widening: u32,
    pub raider_scan_interval: (u64, u64),
    pub trader_scan_interval: (u64, u64),
    pub raider_ticks_per_move: u32,
    pub trader_ticks_per_move: u32,
    /// Remaining step cost under which a final push ignores night rest
    pub final_push_cost: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            housekeeping_period: 60,
            scan_radius: 1,
            engage_radius: 1,
            approach_radius: 2,
            parent_search_radius: 20,
            parent_search_widening: 10,
            raider_scan_interval: (300, 500),
            trader_scan_interval: (400, 600),
            raider_ticks_per_move: 3_300,
            trader_ticks_per_move: 2_500,
            final_push_cost: 10_000,
        }
    }
}

/// Point economy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub growth_bonus_chance: f64,
    pub growth_bonus: (i64, i64),
    pub growth_noise: (f32, f32),
    pub expansionist_growth_multiplier: f32,
    pub ambient_growth: (i64, i64),
    pub trade_profit: (f32, f32),
    pub relationship_delta: i32,
    pub trade_min_balance: i64,
    pub diplomat_min_balance: i64,
    pub settler_min_balance: i64,
    pub settler_cost_base: f32,
    pub settler_cost_fraction: (f32, f32),
    pub settle_candidates: usize,
    pub settle_proximity_radius: u32,
    pub settle_min_distance: u32,
    /// Delay before points lost to an engagement flow back to the defender
    pub reconstitution_delay: u64,
    /// Credit returning agents even when their home has no active map presence
    pub credit_without_map_presence: bool,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            growth_bonus_chance: 0.02,
            growth_bonus: (20, 200),
            growth_noise: (0.2, 1.0),
            expansionist_growth_multiplier: 1.1,
            ambient_growth: (100, 400),
            trade_profit: (1.05, 1.25),
            relationship_delta: 200,
            trade_min_balance: 1_000,
            diplomat_min_balance: 1_000,
            settler_min_balance: 2_000,
            settler_cost_base: 2_000.0,
            settler_cost_fraction: (0.4, 0.6),
            settle_candidates: 5,
            settle_proximity_radius: 10,
            settle_min_distance: 10,
            reconstitution_delay: 30_000,
            credit_without_map_presence: true,
        }
    }
}

/// Faction behavior assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Ignore the static table and roll every faction's category
    pub randomize_faction_behavior: bool,
    pub factions: Vec<FactionBehaviorEntry>,
}

/// Static behavior for one faction definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactionBehaviorEntry {
    pub def_name: String,
    pub behavior: BehaviorCategory,
    #[serde(default)]
    pub moves_at_night: bool,
    #[serde(default = "default_true")]
    pub creates_settlements: bool,
    #[serde(default)]
    pub hates_player: bool,
}

fn default_true() -> bool {
    true
}

fn weights(entries: &[(&str, f32)]) -> BTreeMap<String, f32> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Built-in action weight tables per behavior category.
pub fn default_action_weights() -> BTreeMap<String, BTreeMap<String, f32>> {
    let mut tables = BTreeMap::new();
    tables.insert(
        BehaviorCategory::Cautious.to_string(),
        weights(&[
            ("trade", 0.30),
            ("diplomat", 0.25),
            ("warband", 0.10),
            ("launched_warband", 0.05),
            ("scout", 0.15),
            ("settle", 0.15),
        ]),
    );
    tables.insert(
        BehaviorCategory::Aggressive.to_string(),
        weights(&[
            ("trade", 0.15),
            ("diplomat", 0.10),
            ("warband", 0.30),
            ("launched_warband", 0.15),
            ("scout", 0.20),
            ("settle", 0.10),
        ]),
    );
    tables.insert(
        BehaviorCategory::Warmonger.to_string(),
        weights(&[
            ("trade", 0.10),
            ("diplomat", 0.05),
            ("warband", 0.40),
            ("launched_warband", 0.25),
            ("scout", 0.15),
            ("settle", 0.05),
        ]),
    );
    tables.insert(
        BehaviorCategory::Expansionist.to_string(),
        weights(&[
            ("trade", 0.20),
            ("diplomat", 0.10),
            ("warband", 0.15),
            ("launched_warband", 0.05),
            ("scout", 0.15),
            ("settle", 0.35),
        ]),
    );
    tables.insert(
        BehaviorCategory::Merchant.to_string(),
        weights(&[
            ("trade", 0.45),
            ("diplomat", 0.20),
            ("warband", 0.05),
            ("launched_warband", 0.05),
            ("scout", 0.10),
            ("settle", 0.15),
        ]),
    );
    tables
}

/// Generates a default configuration file content.
pub fn default_config_toml() -> String {
    r#"# Faction war simulation configuration

[cadence]
init_tick = 10
maintenance_interval = 2500
global_action_interval = 60000
local_evaluation_delay = [30, 100]
settlement_cooldown_periods = [12, 24]
neighbor_cache_staleness = 120000
target_range_divider = 100.0

[agents]
housekeeping_period = 60
scan_radius = 1
engage_radius = 1
approach_radius = 2
parent_search_radius = 20
parent_search_widening = 10
raider_scan_interval = [300, 500]
trader_scan_interval = [400, 600]
raider_ticks_per_move = 3300
trader_ticks_per_move = 2500
final_push_cost = 10000

[economy]
growth_bonus_chance = 0.02
growth_bonus = [20, 200]
growth_noise = [0.2, 1.0]
expansionist_growth_multiplier = 1.1
ambient_growth = [100, 400]
trade_profit = [1.05, 1.25]
relationship_delta = 200
trade_min_balance = 1000
diplomat_min_balance = 1000
settler_min_balance = 2000
settler_cost_base = 2000.0
settler_cost_fraction = [0.4, 0.6]
settle_candidates = 5
settle_proximity_radius = 10
settle_min_distance = 10
reconstitution_delay = 30000
credit_without_map_presence = true

[behavior]
randomize_faction_behavior = false

[[behavior.factions]]
def_name = "tribe_savage"
behavior = "warmonger"
moves_at_night = true
hates_player = true

[[behavior.factions]]
def_name = "outlander_civil"
behavior = "merchant"

[[behavior.factions]]
def_name = "outlander_rough"
behavior = "expansionist"

[[behavior.factions]]
def_name = "pirate"
behavior = "aggressive"
moves_at_night = true
hates_player = true
creates_settlements = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.cadence.maintenance_interval, 2_500);
        assert_eq!(config.cadence.global_action_interval, 60_000);
        assert_eq!(config.agents.parent_search_radius, 20);
        assert_eq!(config.agents.parent_search_widening, 10);
        assert!(config.action_weights.contains_key("warmonger"));
        assert!(!config.action_weights.contains_key("player"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
            [cadence]
            maintenance_interval = 100
        "#;

        let config = SimConfig::from_str(toml).unwrap();

        assert_eq!(config.cadence.maintenance_interval, 100);
        assert_eq!(config.cadence.init_tick, 10);
        assert_eq!(config.economy.settle_candidates, 5);
        assert_eq!(config.action_weights, default_action_weights());
    }

    #[test]
    fn test_default_config_toml_parses() {
        let config = SimConfig::from_str(&default_config_toml()).unwrap();

        assert_eq!(config.cadence.local_evaluation_delay, (30, 100));
        assert_eq!(config.behavior.factions.len(), 4);
        let pirate = config.behavior_entry("pirate").unwrap();
        assert_eq!(pirate.behavior, BehaviorCategory::Aggressive);
        assert!(!pirate.creates_settlements);
        assert!(config.behavior_entry("outlander_civil").unwrap().creates_settlements);
    }

    #[test]
    fn test_custom_action_weights() {
        let toml = r#"
            [action_weights.merchant]
            trade = 1.0
            smuggle = 0.5
        "#;

        let config = SimConfig::from_str(toml).unwrap();
        let merchant = &config.action_weights["merchant"];
        assert_eq!(merchant.get("trade"), Some(&1.0));
        assert_eq!(merchant.get("smuggle"), Some(&0.5));
        assert!(!config.action_weights.contains_key("warmonger"));
    }

    #[test]
    fn test_config_to_toml_roundtrips() {
        let config = SimConfig::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[cadence]"));
        let parsed = SimConfig::from_str(&toml).unwrap();
        assert_eq!(parsed.agents.final_push_cost, 10_000);
        assert_eq!(parsed.action_weights, config.action_weights);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SimConfig::from_file("definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
