//! Error types.
//!
//! Nothing here is fatal to the tick loop: dispatch errors are logged by the
//! dispatcher and the cycle moves on.

use thiserror::Error;
use war_events::{FactionId, TileId};

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Errors that can occur while saving or restoring a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },
}

/// Degenerate state met while attempting an action. The attempt is aborted
/// without mutating anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("no profile for {0}")]
    MissingFaction(FactionId),
    #[error("{0} owns no settlements")]
    NoSettlements(FactionId),
    #[error("no settlement record at {0}")]
    MissingSettlement(TileId),
    #[error("the player owns no settlements")]
    NoPlayerSettlements,
    #[error("{0} is the player faction")]
    PlayerFaction(FactionId),
}
