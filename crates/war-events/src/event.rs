//! Event Types
//!
//! Every economy mutation, spawn, encounter and lifecycle transition the core
//! performs is reported as an [`Event`]. Summing the credit and debit events of
//! a settlement reproduces its balance history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::{AgentId, FactionId, TileId};
use crate::timestamp::SimTimestamp;

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}

/// Mobile agent roles. All roles share one lifecycle; the role selects the
/// capabilities layered on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Raids a hostile settlement right away.
    Warband,
    /// Raid launched against a distant settlement.
    LaunchedWarband,
    Scout,
    Trader,
    Diplomat,
    Settler,
}

impl AgentRole {
    pub fn all() -> &'static [AgentRole] {
        &[
            AgentRole::Warband,
            AgentRole::LaunchedWarband,
            AgentRole::Scout,
            AgentRole::Trader,
            AgentRole::Diplomat,
            AgentRole::Settler,
        ]
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentRole::Warband => "warband",
            AgentRole::LaunchedWarband => "launched_warband",
            AgentRole::Scout => "scout",
            AgentRole::Trader => "trader",
            AgentRole::Diplomat => "diplomat",
            AgentRole::Settler => "settler",
        };
        f.write_str(name)
    }
}

/// Actions a settlement (or a whole faction) can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Trade,
    Diplomat,
    Warband,
    LaunchedWarband,
    Scout,
    Settle,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::Trade,
            ActionKind::Diplomat,
            ActionKind::Warband,
            ActionKind::LaunchedWarband,
            ActionKind::Scout,
            ActionKind::Settle,
        ]
    }

    /// Role of the agent this action spawns.
    pub fn spawned_role(self) -> AgentRole {
        match self {
            ActionKind::Trade => AgentRole::Trader,
            ActionKind::Diplomat => AgentRole::Diplomat,
            ActionKind::Warband => AgentRole::Warband,
            ActionKind::LaunchedWarband => AgentRole::LaunchedWarband,
            ActionKind::Scout => AgentRole::Scout,
            ActionKind::Settle => AgentRole::Settler,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Trade => "trade",
            ActionKind::Diplomat => "diplomat",
            ActionKind::Warband => "warband",
            ActionKind::LaunchedWarband => "launched_warband",
            ActionKind::Scout => "scout",
            ActionKind::Settle => "settle",
        };
        f.write_str(name)
    }
}

/// Error returned when an action name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownActionError(pub String);

impl fmt::Display for UnknownActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action kind: '{}'", self.0)
    }
}

impl std::error::Error for UnknownActionError {}

impl FromStr for ActionKind {
    type Err = UnknownActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trade" | "caravan" => Ok(ActionKind::Trade),
            "diplomat" => Ok(ActionKind::Diplomat),
            "warband" => Ok(ActionKind::Warband),
            "launched_warband" => Ok(ActionKind::LaunchedWarband),
            "scout" | "scouting_party" => Ok(ActionKind::Scout),
            "settle" | "settler" => Ok(ActionKind::Settle),
            _ => Err(UnknownActionError(s.to_string())),
        }
    }
}

/// Where a balance credit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditSource {
    /// Periodic organic growth.
    Growth,
    /// Small random bonus granted during a local evaluation.
    GrowthBonus,
    /// Faction-level ambient growth from a global action.
    AmbientGrowth,
    /// An agent returned home with its remaining power.
    Reinforcement,
    /// A trader's profit from trading with the player.
    TradeProfit,
    /// A matured entry of the delayed-reward queue.
    PendingGain,
}

/// Encounter handed to an external resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    RaidSettlement,
    RaidCaravan,
    Battle,
    WorldEngagement,
    TradeWithPlayerSettlement,
    TradeWithCaravan,
    TradeWithSettlement,
    TradeWithAgent,
    Diplomacy,
    FoundSettlement,
}

/// Why an agent left the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Arrived and fully resolved.
    Consumed,
    /// No reachable parent settlement.
    Lost,
    /// Power reduced to zero in an engagement.
    Defeated,
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    FactionRegistered {
        faction: FactionId,
        behavior: String,
        settlements: usize,
    },
    /// A settlement record was created with an opening balance.
    SettlementRegistered {
        settlement: TileId,
        faction: FactionId,
        power: i64,
    },
    SettlementDropped {
        settlement: TileId,
        faction: FactionId,
    },
    PointsCredited {
        settlement: TileId,
        faction: FactionId,
        points: i64,
        source: CreditSource,
    },
    PointsDebited {
        settlement: TileId,
        faction: FactionId,
        points: i64,
        action: ActionKind,
    },
    /// Points a settlement lost to an engagement.
    PointsLost {
        settlement: TileId,
        faction: FactionId,
        points: i64,
    },
    AgentSpawned {
        agent: AgentId,
        role: AgentRole,
        faction: FactionId,
        origin: TileId,
        target: TileId,
        power: i64,
    },
    Encounter {
        agent: AgentId,
        tile: TileId,
        encounter: EncounterKind,
    },
    AgentReturningHome {
        agent: AgentId,
        home: TileId,
    },
    AgentRemoved {
        agent: AgentId,
        tile: TileId,
        reason: RemovalReason,
    },
    RelationshipShifted {
        faction: FactionId,
        other: FactionId,
        delta: i32,
    },
    VictoryChallengeIssued {
        faction: FactionId,
    },
    VictoryAchieved {
        faction: FactionId,
    },
}

impl EventKind {
    /// Short category name, used for log summaries.
    pub fn category(&self) -> &'static str {
        match self {
            EventKind::FactionRegistered { .. }
            | EventKind::SettlementRegistered { .. }
            | EventKind::SettlementDropped { .. } => "registry",
            EventKind::PointsCredited { .. }
            | EventKind::PointsDebited { .. }
            | EventKind::PointsLost { .. } => "economy",
            EventKind::AgentSpawned { .. }
            | EventKind::AgentReturningHome { .. }
            | EventKind::AgentRemoved { .. } => "agent",
            EventKind::Encounter { .. } => "encounter",
            EventKind::RelationshipShifted { .. } => "diplomacy",
            EventKind::VictoryChallengeIssued { .. } | EventKind::VictoryAchieved { .. } => {
                "victory"
            }
        }
    }

    /// Signed balance change this event applies to a settlement, if any.
    pub fn balance_delta(&self, settlement: TileId) -> Option<i64> {
        match self {
            EventKind::PointsCredited {
                settlement: s,
                points,
                ..
            } if *s == settlement => Some(*points),
            EventKind::PointsDebited {
                settlement: s,
                points,
                ..
            } if *s == settlement => Some(-*points),
            EventKind::PointsLost {
                settlement: s,
                points,
                ..
            } if *s == settlement => Some(-*points),
            _ => None,
        }
    }
}

/// A single recorded simulation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: String,
    pub tick: u64,
    pub timestamp: SimTimestamp,
    pub kind: EventKind,
}

impl Event {
    pub fn new(event_id: impl Into<String>, tick: u64, kind: EventKind) -> Self {
        Self {
            event_id: event_id.into(),
            tick,
            timestamp: SimTimestamp::from_tick(tick),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_event_id() {
        assert_eq!(generate_event_id(1), "evt_00000001");
        assert_eq!(generate_event_id(12345), "evt_00012345");
    }

    #[test]
    fn test_action_kind_parse_accepts_aliases() {
        assert_eq!("caravan".parse::<ActionKind>().unwrap(), ActionKind::Trade);
        assert_eq!("Scouting_Party".parse::<ActionKind>().unwrap(), ActionKind::Scout);
        assert_eq!("settler".parse::<ActionKind>().unwrap(), ActionKind::Settle);
        assert_eq!(
            "mercenaries".parse::<ActionKind>(),
            Err(UnknownActionError("mercenaries".to_string()))
        );
    }

    #[test]
    fn test_action_display_parses_back() {
        for action in ActionKind::all() {
            assert_eq!(action.to_string().parse::<ActionKind>().unwrap(), *action);
        }
    }

    #[test]
    fn test_spawned_roles() {
        assert_eq!(ActionKind::Trade.spawned_role(), AgentRole::Trader);
        assert_eq!(ActionKind::Settle.spawned_role(), AgentRole::Settler);
        assert_eq!(ActionKind::LaunchedWarband.spawned_role(), AgentRole::LaunchedWarband);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = Event::new(
            generate_event_id(3),
            60_000,
            EventKind::PointsDebited {
                settlement: TileId(4),
                faction: FactionId(2),
                points: 900,
                action: ActionKind::Warband,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event_type":"points_debited""#));
        assert!(json.contains(r#""timestamp":"day_1.hour_0""#));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_balance_delta() {
        let credit = EventKind::PointsCredited {
            settlement: TileId(1),
            faction: FactionId(1),
            points: 50,
            source: CreditSource::PendingGain,
        };
        let debit = EventKind::PointsDebited {
            settlement: TileId(1),
            faction: FactionId(1),
            points: 20,
            action: ActionKind::Scout,
        };
        assert_eq!(credit.balance_delta(TileId(1)), Some(50));
        assert_eq!(debit.balance_delta(TileId(1)), Some(-20));
        assert_eq!(credit.balance_delta(TileId(2)), None);
        assert_eq!(credit.category(), "economy");
    }
}
