//! Settlement economy records.
//!
//! A settlement holds a power balance, a cooldown for its own actions, cached
//! neighbor lists and a queue of delayed rewards.

use serde::{Deserialize, Serialize};
use war_events::{FactionId, TileId};

/// A reward that becomes payable once the tick reaches `ready_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGain {
    pub points: i64,
    pub ready_at: u64,
}

/// Economy record of one faction-owned location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub tile: TileId,
    pub faction: FactionId,
    /// Point balance. Dispatcher spends are gated so this never goes negative.
    pub power: i64,
    pub next_event_tick: u64,
    /// Tick of the last neighbor scan, `None` if never scanned
    pub last_scan_tick: Option<u64>,
    #[serde(default)]
    pub nearby_hostile: Vec<TileId>,
    #[serde(default)]
    pub nearby_friendly: Vec<TileId>,
    #[serde(default)]
    pub pending_gains: Vec<PendingGain>,
}

impl Settlement {
    pub fn new(tile: TileId, faction: FactionId, power: i64) -> Self {
        Self {
            tile,
            faction,
            power,
            next_event_tick: 0,
            last_scan_tick: None,
            nearby_hostile: Vec::new(),
            nearby_friendly: Vec::new(),
            pending_gains: Vec::new(),
        }
    }

    pub fn credit(&mut self, points: i64) {
        self.power += points;
    }

    pub fn debit(&mut self, points: i64) {
        self.power -= points;
    }

    /// Queues a reward payable at `ready_at`.
    pub fn queue_gain(&mut self, points: i64, ready_at: u64) {
        self.pending_gains.push(PendingGain { points, ready_at });
    }

    /// Applies every matured pending gain and returns the applied entries in
    /// queue order. Unmatured entries stay queued.
    pub fn drain_matured_gains(&mut self, now: u64) -> Vec<PendingGain> {
        let (matured, waiting): (Vec<_>, Vec<_>) = self
            .pending_gains
            .iter()
            .copied()
            .partition(|gain| gain.ready_at <= now);
        self.pending_gains = waiting;
        for gain in &matured {
            self.power += gain.points;
        }
        matured
    }

    /// True if the neighbor lists were never built or are older than `staleness`.
    pub fn neighbors_stale(&self, now: u64, staleness: u64) -> bool {
        match self.last_scan_tick {
            None => true,
            Some(last) => last + staleness <= now,
        }
    }

    pub fn set_neighbors(&mut self, hostile: Vec<TileId>, friendly: Vec<TileId>, now: u64) {
        self.nearby_hostile = hostile;
        self.nearby_friendly = friendly;
        self.last_scan_tick = Some(now);
    }

    /// Whether the settlement's own cooldown has elapsed.
    pub fn ready_for_event(&self, now: u64) -> bool {
        self.next_event_tick <= now
    }
}
