//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into text).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type` tag, a
    /// missing field, or a field of the wrong shape.
    #[cfg(feature = "json")]
    #[error("{0}")]
    Decode(serde_json::Error),

    /// The message parsed but breaks a protocol rule, such as an empty
    /// username or an AUTH on an already authenticated connection.
    #[error("{0}")]
    InvalidMessage(String),
}
