//! Pure game rules for consensus bingo.
//!
//! Nothing here does I/O or reads a clock. Every function takes the current
//! [`GameState`] by reference and returns a new value, which the session
//! layer writes back to the store.
//!
//! # Key pieces
//!
//! - [`generate_board`]: shuffle the configured tiles into a 5×5 board
//! - [`calculate_heatmap`]: percentage of players marking each tile text
//! - [`check_bingo`] / [`winning_lines`]: does a player have a line whose
//!   texts all cleared the consensus threshold?
//! - [`transforms`]: `(state, …) → state` transitions for joins,
//!   selections, removals, and new rounds
//! - [`client_game_state`]: project the shared state onto one viewer's board

mod board;
mod client;
mod consensus;
mod model;
pub mod transforms;

pub use board::{PLACEHOLDER_TILE, generate_board};
pub use client::{client_game_state, coordinate_key};
pub use consensus::{
    Heatmap, WinningLine, calculate_heatmap, check_bingo, consensus_for,
    winning_lines,
};
pub use model::{GameState, Player, PlayerStatus};
