//! # Bingo
//!
//! Session engine for consensus bingo: live viewers of a stream share one
//! game, each with a personally shuffled 5×5 board, and a square only
//! counts toward a win once enough of the audience has marked it too.
//!
//! This crate is the outer layer. It accepts WebSocket connections,
//! authenticates them, keeps them alive with a heartbeat, and routes their
//! messages to the game sessions in [`bingo_game`]. Games are started,
//! reset, and ended by other services over the command bus.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bingo::prelude::*;
//!
//! # async fn run() -> Result<(), BingoError> {
//! let config = ServerConfig::from_env()?;
//! let server = BingoServerBuilder::new()
//!     .config(config)
//!     .build(Arc::new(MemoryStore::new()), Arc::new(LocalBus::new()), TrustClaims)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod config;
mod error;
mod handler;
pub mod health;
mod server;

pub use auth::{AuthError, Authenticator, TrustClaims};
pub use config::{ConfigError, ServerConfig};
pub use error::BingoError;
pub use health::{HealthStatus, ServiceHeartbeat, check_health};
pub use server::{BingoServer, BingoServerBuilder};

pub use bingo_game::{PlayerIdentity, SessionConfig, SessionRegistry};

/// Everything needed to embed and run the engine.
pub mod prelude {
    pub use crate::{
        AuthError, Authenticator, BingoError, BingoServer, BingoServerBuilder,
        ServerConfig, SessionConfig, TrustClaims,
    };
    pub use bingo_bus::{Channel, CommandBus, LocalBus};
    pub use bingo_game::{PlayerIdentity, SessionRegistry};
    pub use bingo_protocol::{
        BotCommand, ClientMessage, GameCommand, GameConfig, GameId, PlayerId,
        ServerMessage, TileConfig,
    };
    pub use bingo_store::{MemoryStore, StateStore};
}
