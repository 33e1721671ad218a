use bingo_protocol::ProtocolError;

/// Errors that can occur while publishing to or reading from the bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The bus has shut down; nothing more will be delivered.
    #[error("command bus closed")]
    Closed,

    /// A command could not be encoded, or a received payload could not be
    /// decoded as the expected command type.
    #[error("command codec error: {0}")]
    Codec(#[from] ProtocolError),

    /// The backend failed the operation.
    #[error("command bus error: {0}")]
    Backend(String),
}
