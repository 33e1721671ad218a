//! Unified error type for the bingo engine.

use bingo_bus::BusError;
use bingo_game::GameError;
use bingo_protocol::ProtocolError;
use bingo_store::StoreError;
use bingo_transport::TransportError;

use crate::auth::AuthError;
use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `bingo` meta-crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BingoError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The command bus failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A session or registry operation failed.
    #[error(transparent)]
    Game(#[from] GameError),

    /// The authenticator rejected a connection.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The environment held an unusable setting.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
