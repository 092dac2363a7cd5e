//! Event collection and logging.

pub mod logger;

pub use logger::{EventLogger, LogStats};

use war_events::{generate_event_id, Event, EventKind};

/// Events produced during the current tick, drained by the driver loop.
#[derive(Debug)]
pub struct TickEvents {
    pub events: Vec<Event>,
    next_event_id: u64,
}

impl Default for TickEvents {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            next_event_id: 1,
        }
    }
}

impl TickEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes id generation after a restore.
    pub fn starting_at(next_event_id: u64) -> Self {
        Self {
            events: Vec::new(),
            next_event_id: next_event_id.max(1),
        }
    }

    pub fn generate_id(&mut self) -> String {
        let id = generate_event_id(self.next_event_id);
        self.next_event_id += 1;
        id
    }

    pub fn next_event_id(&self) -> u64 {
        self.next_event_id
    }

    /// Records an event at `tick` with a fresh id.
    pub fn record(&mut self, tick: u64, kind: EventKind) {
        let id = self.generate_id();
        self.events.push(Event::new(id, tick, kind));
    }

    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use war_events::{FactionId, TileId};

    #[test]
    fn test_ids_keep_increasing_across_drains() {
        let mut events = TickEvents::new();
        events.record(
            5,
            EventKind::SettlementRegistered {
                settlement: TileId(1),
                faction: FactionId(1),
                power: 1_000,
            },
        );
        let first = events.drain();
        assert!(events.is_empty());

        events.record(
            6,
            EventKind::SettlementDropped {
                settlement: TileId(1),
                faction: FactionId(1),
            },
        );

        assert_eq!(first[0].event_id, "evt_00000001");
        assert_eq!(events.events[0].event_id, "evt_00000002");
        assert_eq!(events.next_event_id(), 3);
    }

    #[test]
    fn test_starting_at_resumes_sequence() {
        let mut events = TickEvents::starting_at(41);
        assert_eq!(events.generate_id(), "evt_00000041");
        assert_eq!(TickEvents::starting_at(0).next_event_id(), 1);
    }
}
