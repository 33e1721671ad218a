//! Administrative commands exchanged with other processes.
//!
//! Two logical channels exist. The game channel carries instructions *to*
//! the engine from the admin API and the chat bot; the bot channel carries
//! notifications *from* the engine to the chat bot. Both use the same
//! envelope shape:
//!
//! ```text
//! {"command": "END_GAME", "payload": {"gameId": "…"}}
//! ```

use serde::{Deserialize, Serialize};

use crate::{GameConfig, GameId};

/// Commands on the game-control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum GameCommand {
    /// Store the config for a new game. The session itself is created
    /// lazily when the first viewer authenticates.
    StartGame {
        game_id: GameId,
        game_config: GameConfig,
    },
    /// Deal fresh boards to everyone and clear all marks.
    ResetGame { game_id: GameId },
    /// Tear the game down.
    EndGame { game_id: GameId },
}

impl GameCommand {
    /// The game this command targets.
    pub fn game_id(&self) -> GameId {
        match self {
            Self::StartGame { game_id, .. }
            | Self::ResetGame { game_id }
            | Self::EndGame { game_id } => *game_id,
        }
    }
}

/// Commands on the bot-notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "command",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum BotCommand {
    /// A viewer got a valid bingo in a game that announces in chat.
    AnnounceBingo {
        game_id: GameId,
        twitch_username: String,
    },
    /// The game is over; the bot may leave the channel.
    GameEnded { game_id: GameId },
    /// Ask the bot to join a broadcaster's chat. Emitted by the admin API,
    /// never by the engine.
    JoinTwitchChannel { twitch_username: String },
}
