//! JSONL event log.
//!
//! The driver hands the logger the tick's [`TickEvents`] after every tick;
//! the logger drains them to one JSON object per line and keeps running
//! per-category counts for the end-of-run summary. A resumed run appends to
//! the log of the run it continues.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, warn};
use war_events::Event;

use super::TickEvents;

/// Running totals of what went into the log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogStats {
    pub written: u64,
    pub by_category: BTreeMap<&'static str, u64>,
    /// Tick of the newest event seen
    pub last_tick: Option<u64>,
}

impl LogStats {
    fn count(&mut self, event: &Event) {
        self.written += 1;
        *self.by_category.entry(event.kind.category()).or_default() += 1;
        self.last_tick = Some(event.tick);
    }
}

pub struct EventLogger {
    sink: Option<BufWriter<File>>,
    stats: LogStats,
}

impl EventLogger {
    /// Starts a fresh log at `path`, truncating any previous one.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::with_sink(Some(BufWriter::new(file))))
    }

    /// Continues an existing log at `path`.
    pub fn append(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_sink(Some(BufWriter::new(file))))
    }

    /// Counts events without writing them anywhere.
    pub fn null() -> Self {
        Self::with_sink(None)
    }

    fn with_sink(sink: Option<BufWriter<File>>) -> Self {
        Self {
            sink,
            stats: LogStats::default(),
        }
    }

    pub fn stats(&self) -> &LogStats {
        &self.stats
    }

    /// Drains the tick's events into the log. Returns how many were written.
    pub fn write_tick(&mut self, events: &mut TickEvents) -> std::io::Result<usize> {
        let drained = events.drain();
        self.write_events(&drained)?;
        Ok(drained.len())
    }

    pub fn write_events(&mut self, events: &[Event]) -> std::io::Result<()> {
        for event in events {
            if let Some(sink) = self.sink.as_mut() {
                serde_json::to_writer(&mut *sink, event)?;
                sink.write_all(b"\n")?;
            }
            self.stats.count(event);
        }
        if let Some(last) = events.last() {
            debug!("Logged {} events through {}", events.len(), last.event_id);
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!("Failed to flush event log: {}", e);
        }
    }
}
