//! Error types of the actor core.

use npc_shared::ObjectKind;
use thiserror::Error;

/// Object id as used by maps and observers
pub type ObjectId = u16;

pub type Result<T> = std::result::Result<T, ActorError>;

#[derive(Debug, Error)]
pub enum ActorError {
    #[error("intelligence used before it was bound to an actor")]
    Uninitialized,

    #[error("intelligence is already bound to actor {0}")]
    AlreadyBound(ObjectId),

    /// The actor was removed from its map. Ticks and deferred tasks treat this
    /// as normal termination.
    #[error("actor {0} has been disposed")]
    Disposed(ObjectId),

    #[error("{operation} is not supported by {kind:?} {id}")]
    NotSupported {
        operation: &'static str,
        kind: ObjectKind,
        id: ObjectId,
    },

    #[error("actor {0} cannot be attacked")]
    Unattackable(ObjectId),

    #[error("no valid spawn point in spawn area {area} after {attempts} attempts")]
    NoSpawnPoint { area: u32, attempts: u32 },

    #[error("object {0} is not on a map")]
    NotOnMap(ObjectId),

    #[error("no free object ids left on map {0}")]
    IdsExhausted(u16),

    #[error("unknown actor definition {0}")]
    UnknownDefinition(u16),

    #[error("unknown spawn area {0}")]
    UnknownSpawnArea(u32),

    #[error("no item {0} lying on the map")]
    UnknownItem(u32),

    #[error("item {item} is out of reach of player {player}")]
    ItemOutOfReach { item: u32, player: ObjectId },
}

impl ActorError {
    /// Errors that only signal that the actor is gone
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ActorError::Disposed(_))
    }
}

/// Failure to load configuration, terrain or world data
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid data in {path}: {reason}")]
    Invalid { path: String, reason: String },
}
