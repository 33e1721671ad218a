//! Messages carried over a viewer's WebSocket.
//!
//! Every frame is a JSON object with a `type` tag and, for most kinds, a
//! `payload` object:
//!
//! ```text
//! {"type": "SELECT_SQUARE", "payload": {"squareText": "Streamer laughs"}}
//! {"type": "CLAIM_BINGO"}
//! ```
//!
//! `#[serde(tag = "type", content = "payload")]` gives exactly this
//! "adjacently tagged" shape, and kinds without data simply omit `payload`.

use serde::{Deserialize, Serialize};

use crate::{ClientGameState, GameId, PlayerId, ProtocolError};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Payload of `AUTH`: binds a connection to a game and a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub game_id: GameId,
    pub user_id: PlayerId,
    pub username: String,
}

impl AuthPayload {
    /// Rejects identities the rest of the engine can't work with.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.user_id.as_str().trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "userId must not be empty".into(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "username must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Payload of `SELECT_SQUARE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectSquare {
    pub square_text: String,
}

/// Everything a viewer may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum ClientMessage {
    /// Identify this connection. Must precede any game message.
    Auth(AuthPayload),
    /// Client-initiated liveness probe; answered with `PONG`.
    Ping,
    /// Answer to the server's heartbeat `PING`.
    Pong,
    /// Toggle this viewer's mark on a tile text.
    SelectSquare(SelectSquare),
    /// Ask the server to verify a winning line.
    ClaimBingo,
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// What happened, for the activity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityEventType {
    Join,
    Leave,
    Reconnected,
    Bingo,
}

/// Payload of `ACTIVITY_EVENT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub event_type: ActivityEventType,
    pub username: String,
    /// RFC 3339 / ISO 8601 UTC timestamp.
    pub timestamp: String,
}

/// Payload of `BINGO_COOLDOWN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BingoCooldown {
    pub cooldown_seconds: u64,
}

/// Payload of `SERVER_ERROR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
}

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum ServerMessage {
    /// Heartbeat probe; the client must answer with `PONG`.
    Ping,
    /// Answer to a client `PING`.
    Pong,
    ActivityEvent(ActivityEvent),
    /// This viewer's board plus the per-coordinate heatmap.
    GameState(ClientGameState),
    BingoCooldown(BingoCooldown),
    /// The game is over; the client should stop sending.
    GameEnded,
    ServerError(ServerError),
}

impl ServerMessage {
    /// Shorthand for a `SERVER_ERROR` frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self::ServerError(ServerError {
            message: message.into(),
        })
    }
}
