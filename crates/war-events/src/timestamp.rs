//! Simulation Timestamp Types
//!
//! Tick arithmetic and the local day/night cycle that drives night rest and
//! the dispatcher's movement-preference gate.
//!
//! # Example
//!
//! ```
//! use war_events::{DayPhase, SimTimestamp};
//!
//! let ts = SimTimestamp::from_tick(62_500);
//! assert_eq!(ts.day, 1);
//! assert_eq!(ts.hour, 1);
//! assert_eq!(ts.to_string(), "day_1.hour_1");
//! assert_eq!(DayPhase::at_hour(ts.hour), DayPhase::Night);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of ticks in one in-game hour.
pub const TICKS_PER_HOUR: u64 = 2_500;

/// Number of hours in one in-game day.
pub const HOURS_PER_DAY: u64 = 24;

/// Number of ticks in one in-game day.
pub const TICKS_PER_DAY: u64 = TICKS_PER_HOUR * HOURS_PER_DAY;

/// First hour (inclusive) of the nightly rest window.
pub const REST_START_HOUR: u64 = 22;

/// Hour at which the nightly rest window ends (exclusive).
pub const REST_END_HOUR: u64 = 6;

/// Whether a tile is currently in its resting (night) hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPhase {
    Day,
    Night,
}

impl DayPhase {
    /// Phase for a local hour of day.
    pub fn at_hour(hour: u64) -> Self {
        if hour >= REST_START_HOUR || hour < REST_END_HOUR {
            DayPhase::Night
        } else {
            DayPhase::Day
        }
    }

    pub fn is_night(self) -> bool {
        matches!(self, DayPhase::Night)
    }
}

/// Local hour of day at a longitude, shifting the global clock by one hour
/// per 15 degrees east.
pub fn local_hour(tick: u64, longitude: f32) -> u64 {
    let offset_hours = (longitude / 15.0).round() as i64;
    let global_hour = ((tick % TICKS_PER_DAY) / TICKS_PER_HOUR) as i64;
    (global_hour + offset_hours).rem_euclid(HOURS_PER_DAY as i64) as u64
}

/// Error type for parsing a SimTimestamp from strings.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseTimestampError {
    InvalidFormat(String),
    InvalidDay(String),
    InvalidHour(String),
}

impl fmt::Display for ParseTimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseTimestampError::InvalidFormat(s) => {
                write!(f, "invalid timestamp format: '{}', expected 'day_N.hour_M'", s)
            }
            ParseTimestampError::InvalidDay(s) => write!(f, "invalid day: '{}'", s),
            ParseTimestampError::InvalidHour(s) => write!(f, "invalid hour: '{}'", s),
        }
    }
}

impl std::error::Error for ParseTimestampError {}

/// A point in simulation time, at hour resolution.
///
/// Serializes to strings like "day_12.hour_7".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimTimestamp {
    /// Tick at the start of the hour.
    pub tick: u64,
    pub day: u64,
    pub hour: u64,
}

impl SimTimestamp {
    /// Timestamp containing the given tick (global clock, no longitude shift).
    pub fn from_tick(tick: u64) -> Self {
        let day = tick / TICKS_PER_DAY;
        let hour = (tick % TICKS_PER_DAY) / TICKS_PER_HOUR;
        Self {
            tick: day * TICKS_PER_DAY + hour * TICKS_PER_HOUR,
            day,
            hour,
        }
    }

    pub fn phase(&self) -> DayPhase {
        DayPhase::at_hour(self.hour)
    }
}

impl fmt::Display for SimTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day_{}.hour_{}", self.day, self.hour)
    }
}

impl FromStr for SimTimestamp {
    type Err = ParseTimestampError;

    /// Parses a SimTimestamp from a string like "day_12.hour_7".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (day_part, hour_part) = s
            .split_once('.')
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?;

        let day = day_part
            .strip_prefix("day_")
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?
            .parse::<u64>()
            .map_err(|_| ParseTimestampError::InvalidDay(day_part.to_string()))?;

        let hour = hour_part
            .strip_prefix("hour_")
            .ok_or_else(|| ParseTimestampError::InvalidFormat(s.to_string()))?
            .parse::<u64>()
            .map_err(|_| ParseTimestampError::InvalidHour(hour_part.to_string()))?;
        if hour >= HOURS_PER_DAY {
            return Err(ParseTimestampError::InvalidHour(hour_part.to_string()));
        }

        Ok(SimTimestamp {
            tick: day * TICKS_PER_DAY + hour * TICKS_PER_HOUR,
            day,
            hour,
        })
    }
}

impl Serialize for SimTimestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
