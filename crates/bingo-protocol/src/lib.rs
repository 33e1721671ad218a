//! Wire protocol for the bingo session engine.
//!
//! This crate defines the "language" spoken between viewers, the engine,
//! and the services around it:
//!
//! - **Types** ([`GameId`], [`PlayerId`], [`Board`], [`GameConfig`], ...):
//!   value types shared by every layer.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`]): the tagged union
//!   carried over a viewer's WebSocket.
//! - **Commands** ([`GameCommand`], [`BotCommand`]): administrative
//!   instructions exchanged with other processes over the command bus.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become text.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (ClientMessage) → Game (session actor)
//! ```

mod codec;
mod commands;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use commands::{BotCommand, GameCommand};
pub use error::ProtocolError;
pub use messages::{
    ActivityEvent, ActivityEventType, AuthPayload, BingoCooldown,
    ClientMessage, SelectSquare, ServerError, ServerMessage,
};
pub use types::{
    BOARD_SIZE, Board, CENTER_INDEX, ClientGameState, FREE_SPACE, GameConfig,
    GameId, PlayerId, Square, TileConfig,
};
