//! Live game sessions for the bingo engine.
//!
//! - [`SessionRegistry`] creates sessions lazily from stored configs, ends
//!   them, and applies administrative commands from the bus.
//! - [`SessionHandle`] talks to one game's actor task, which serializes
//!   every read-modify-write of that game's stored state.
//! - [`GameRepository`] is the typed view of the state store.
//!
//! ```text
//! gateway ──AUTH──▶ SessionRegistry::find_or_create ──▶ SessionHandle
//!                                                         │ mpsc
//! bus ──START/RESET/END_GAME──▶ SessionRegistry           ▼
//!                                                   session actor ──▶ StateStore
//!                                                         │
//!                                   PlayerSender ◀────────┴────▶ bus (bot channel)
//! ```

mod config;
mod error;
mod registry;
mod repository;
mod session;
mod timers;

pub use config::SessionConfig;
pub use error::GameError;
pub use registry::SessionRegistry;
pub use repository::GameRepository;
pub use session::{
    ClaimOutcome, JoinKind, PlayerIdentity, PlayerSender, SessionHandle,
    spawn_session,
};
pub use timers::{ExpiryOutcome, OnExpire};
