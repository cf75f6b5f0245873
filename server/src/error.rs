//! Error types raised by the game-state engine and the static data loaders.

use shared::{ConnectionId, EntityId};
use thiserror::Error;

/// Recoverable outcomes of engine operations.
///
/// None of these are fatal to the process. The session layer decides whether
/// the originating connection hears about them; the `Display` text is what a
/// client receives in an error packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("unknown player for connection {0}")]
    UnknownPlayer(ConnectionId),

    #[error("unknown monster {0}")]
    UnknownMonster(EntityId),

    #[error("unknown monster type '{0}'")]
    UnknownMonsterType(String),

    #[error("attack on cooldown ({remaining_ms} ms remaining)")]
    OnCooldown { remaining_ms: u64 },

    #[error("target is dead")]
    TargetDead,

    #[error("target out of range")]
    OutOfRange,

    #[error("invalid intent: {0}")]
    InvalidIntent(String),
}

/// Errors raised while loading or validating the map and monster catalog.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("map dimensions must be > 0, got {width}x{height}")]
    EmptyDimensions { width: usize, height: usize },

    #[error("map has no tile layers")]
    NoLayers,

    #[error("layer {layer} is {rows} rows by {columns} columns, expected {height}x{width}")]
    LayerShape {
        layer: usize,
        rows: usize,
        columns: usize,
        width: usize,
        height: usize,
    },

    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("map encodes to {bytes} bytes, init packets allow at most {limit}")]
    TooLarge { bytes: u64, limit: u64 },

    #[error("spawn point ({x}, {y}) is not a walkable tile")]
    UnwalkableSpawn { x: i32, y: i32 },

    #[error("monster catalog is empty")]
    EmptyCatalog,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_error_messages() {
        assert_eq!(
            GameError::UnknownPlayer(4).to_string(),
            "unknown player for connection 4"
        );
        assert_eq!(
            GameError::OnCooldown { remaining_ms: 250 }.to_string(),
            "attack on cooldown (250 ms remaining)"
        );
        assert_eq!(
            GameError::UnknownMonsterType("dragon".to_string()).to_string(),
            "unknown monster type 'dragon'"
        );
    }

    #[test]
    fn test_too_large_message() {
        let err = MapError::TooLarge {
            bytes: 121_704,
            limit: 49_123,
        };
        assert_eq!(
            err.to_string(),
            "map encodes to 121704 bytes, init packets allow at most 49123"
        );
    }

    #[test]
    fn test_map_error_from_json() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let map_err: MapError = err.into();
        assert!(matches!(map_err, MapError::Json(_)));
    }
}
