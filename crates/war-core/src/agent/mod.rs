//! Mobile agents.
//!
//! Every role runs the same lifecycle (see [`lifecycle`]); the role only
//! selects a [`Capabilities`] set.

pub mod lifecycle;
pub mod pather;

pub use lifecycle::AgentFate;
pub use pather::{PathState, StepResult};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use war_events::{AgentId, AgentRole, FactionId, TileId};

use crate::host::{CaravanId, TileGraph};

/// Weak reference to whatever an agent is heading for. Resolved through the
/// host or the agent table on every use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TargetRef {
    Settlement(TileId),
    Caravan(CaravanId),
    Agent(AgentId),
    /// An unclaimed tile picked for a new settlement
    Site(TileId),
}

impl TargetRef {
    pub fn is_mobile(self) -> bool {
        matches!(self, TargetRef::Caravan(_) | TargetRef::Agent(_))
    }
}

/// What a role's periodic scan looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPolicy {
    /// Hostile raiders and caravan-like entities
    Hostile,
    /// Caravan-like entities not yet traded with
    TradePartners,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_fight: bool,
    pub scan: ScanPolicy,
    pub founds_settlements: bool,
}

pub fn capabilities(role: AgentRole) -> Capabilities {
    match role {
        AgentRole::Warband | AgentRole::LaunchedWarband | AgentRole::Scout => Capabilities {
            can_fight: true,
            scan: ScanPolicy::Hostile,
            founds_settlements: false,
        },
        AgentRole::Trader => Capabilities {
            can_fight: false,
            scan: ScanPolicy::TradePartners,
            founds_settlements: false,
        },
        AgentRole::Diplomat => Capabilities {
            can_fight: false,
            scan: ScanPolicy::Disabled,
            founds_settlements: false,
        },
        AgentRole::Settler => Capabilities {
            can_fight: false,
            scan: ScanPolicy::Disabled,
            founds_settlements: true,
        },
    }
}

pub fn is_raider(role: AgentRole) -> bool {
    capabilities(role).can_fight
}

/// Trader agents count as caravans for scans and raids.
pub fn is_caravan_like(role: AgentRole) -> bool {
    role == AgentRole::Trader
}

/// A faction-owned mobile entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub role: AgentRole,
    /// Owning faction; an agent without one is inert
    pub faction: Option<FactionId>,
    pub position: TileId,
    pub power: i64,
    pub destination: Option<TargetRef>,
    pub home: Option<TileId>,
    pub moves_at_night: bool,
    pub ticks_per_move: u32,
    pub scan_interval: u64,
    pub next_scan_tick: u64,
    #[serde(default)]
    pub path: PathState,
    /// Partners already traded with this lifetime
    #[serde(default)]
    pub traded_with: BTreeSet<TargetRef>,
}

impl Agent {
    pub fn new(id: AgentId, role: AgentRole, faction: FactionId, position: TileId, power: i64) -> Self {
        Self {
            id,
            role,
            faction: Some(faction),
            position,
            power,
            destination: None,
            home: None,
            moves_at_night: false,
            ticks_per_move: 2_500,
            scan_interval: 0,
            next_scan_tick: 0,
            path: PathState::default(),
            traded_with: BTreeSet::new(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        capabilities(self.role)
    }

    /// Points the agent at a tile and starts walking. Returns false if no
    /// path exists.
    pub fn path_to<G: TileGraph + ?Sized>(&mut self, graph: &G, tile: TileId) -> bool {
        self.path.start(graph, self.position, tile, self.ticks_per_move)
    }

    /// Whether the agent sits out this tick for the night (or day, for
    /// night movers). A final push toward a reachable destination within
    /// `final_push_cost` ticks is never paused.
    pub fn is_resting<G: TileGraph + ?Sized>(&self, graph: &G, now: u64, final_push_cost: u32) -> bool {
        if self.path.on_final_step() {
            if let Some(destination) = self.path.destination {
                if graph.is_valid_final_push(destination) && self.path.cost_left <= final_push_cost {
                    return false;
                }
            }
        }
        let resting_hours = graph.is_resting_at(self.position, now);
        if self.moves_at_night {
            !resting_hours
        } else {
            resting_hours
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    struct Clock {
        night: bool,
    }

    impl TileGraph for Clock {
        fn distance(&self, a: TileId, b: TileId) -> u32 {
            a.0.abs_diff(b.0)
        }

        fn next_step(&self, from: TileId, to: TileId) -> Option<TileId> {
            match from.0.cmp(&to.0) {
                std::cmp::Ordering::Less => Some(TileId(from.0 + 1)),
                std::cmp::Ordering::Greater => Some(TileId(from.0 - 1)),
                std::cmp::Ordering::Equal => None,
            }
        }

        fn is_resting_at(&self, _tile: TileId, _tick: u64) -> bool {
            self.night
        }

        fn find_new_site(&self, _: TileId, _: u32, _: u32, _: &mut dyn RngCore) -> Option<TileId> {
            None
        }
    }

    fn walker() -> Agent {
        let mut agent = Agent::new(AgentId(1), AgentRole::Warband, FactionId(2), TileId(0), 300);
        agent.ticks_per_move = 100;
        agent
    }

    #[test]
    fn test_day_movers_rest_at_night() {
        let mut agent = walker();
        agent.path_to(&Clock { night: true }, TileId(5));
        assert!(agent.is_resting(&Clock { night: true }, 0, 10_000));
        assert!(!agent.is_resting(&Clock { night: false }, 0, 10_000));
    }

    #[test]
    fn test_night_movers_rest_by_day() {
        let mut agent = walker();
        agent.moves_at_night = true;
        agent.path_to(&Clock { night: false }, TileId(5));
        assert!(agent.is_resting(&Clock { night: false }, 0, 10_000));
        assert!(!agent.is_resting(&Clock { night: true }, 0, 10_000));
    }

    #[test]
    fn test_final_push_ignores_rest() {
        let mut agent = walker();
        let night = Clock { night: true };
        agent.path_to(&night, TileId(1));
        assert!(agent.path.on_final_step());
        assert!(!agent.is_resting(&night, 0, 10_000));
        // Remaining cost above the bound rests as usual
        assert!(agent.is_resting(&night, 0, 50));
    }

    #[test]
    fn test_role_capabilities() {
        assert!(is_raider(AgentRole::Scout));
        assert!(!is_raider(AgentRole::Trader));
        assert!(is_caravan_like(AgentRole::Trader));
        assert!(!is_caravan_like(AgentRole::Diplomat));
        assert_eq!(capabilities(AgentRole::Trader).scan, ScanPolicy::TradePartners);
        assert!(capabilities(AgentRole::Settler).founds_settlements);
    }
}
