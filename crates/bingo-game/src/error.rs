//! Error types for the session layer.

use bingo_bus::BusError;
use bingo_protocol::{GameId, PlayerId, ProtocolError};
use bingo_store::StoreError;
use bingo_transport::ConnectionId;

/// Errors that can occur during session and registry operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The command bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A value could not be encoded for storage.
    #[error("failed to encode stored value: {0}")]
    Encode(#[source] ProtocolError),

    /// A stored blob doesn't parse as what the key should hold.
    #[error("stored value at {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: ProtocolError,
    },

    /// A game config was rejected before being stored.
    #[error("invalid game config: {0}")]
    InvalidConfig(#[source] ProtocolError),

    /// The player has no connection in this session.
    #[error("player {0} is not in game {1}")]
    NotInGame(PlayerId, GameId),

    /// The request came from a socket the player has since replaced.
    #[error("connection {1} of player {0} was replaced by a newer one")]
    StaleConnection(PlayerId, ConnectionId),

    /// The session actor has stopped or its queue is closed.
    #[error("game {0} is unavailable")]
    Unavailable(GameId),
}
