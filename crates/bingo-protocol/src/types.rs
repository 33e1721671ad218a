//! Value types shared across the wire, the store, and the command bus.
//!
//! Nothing in here knows about sockets or sessions. These are the nouns of
//! the game: who is playing ([`PlayerId`]), which game ([`GameId`]), what a
//! board looks like ([`Board`], [`Square`]), how a game is configured
//! ([`GameConfig`]), and what a single viewer is shown ([`ClientGameState`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Board geometry
// ---------------------------------------------------------------------------

/// Boards are always 5×5.
pub const BOARD_SIZE: usize = 5;

/// Row-major index of the center square.
pub const CENTER_INDEX: usize = (BOARD_SIZE * BOARD_SIZE) / 2;

/// Text of the pre-marked center square.
pub const FREE_SPACE: &str = "FREE SPACE";

/// Fewest tiles that fill every non-center cell without repeats.
const MIN_TILES: usize = BOARD_SIZE * BOARD_SIZE - 1;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for one live game.
///
/// Generated by whoever starts the game (the administrative API) and used as
/// the correlation key for the stored config, the stored state, and every
/// bus command. `#[serde(transparent)]` keeps it a plain UUID string on the
/// wire; anything that doesn't parse as a UUID is rejected at decode time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct GameId(pub Uuid);

impl GameId {
    /// Generates a fresh random (v4) game id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A viewer's account identifier, as issued by the external identity
/// provider. Opaque to the engine.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Convenience constructor.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// One cell of a board.
///
/// In stored state `selected` is only ever true for the free space. The
/// copy sent to a viewer has it rewritten from that viewer's own selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    pub text: String,
    pub selected: bool,
}

impl Square {
    /// An unmarked square with the given text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            selected: false,
        }
    }

    /// The pre-marked center square.
    pub fn free_space() -> Self {
        Self {
            text: FREE_SPACE.to_string(),
            selected: true,
        }
    }

    /// Returns `true` for the center square.
    pub fn is_free_space(&self) -> bool {
        self.text == FREE_SPACE
    }
}

/// A 5×5 grid, indexed `board[row][column]`.
///
/// Serializes as an array of five row arrays.
pub type Board = [[Square; BOARD_SIZE]; BOARD_SIZE];

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// One configured tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileConfig {
    pub text: String,
}

impl TileConfig {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// The settings a moderator chose when starting a game.
///
/// Written to the store by `START_GAME`, read once when the first viewer
/// joins, and deleted when the game ends. A running session keeps its own
/// copy and never re-reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub title: String,
    pub tiles: Vec<TileConfig>,
    /// Percentage (10–100) of players that must mark a tile text before it
    /// counts toward a win.
    pub heatmap_threshold: u32,
    /// Whether a valid bingo is announced in the broadcaster's chat.
    pub announce_in_chat: bool,
}

impl GameConfig {
    /// Allowed range for `heatmap_threshold`.
    pub const THRESHOLD_RANGE: std::ops::RangeInclusive<u32> = 10..=100;

    /// Checks the rules a config must satisfy before it can be stored.
    ///
    /// A short tile list is not an error here: boards fill the missing
    /// cells with a placeholder. Callers that care can check
    /// [`has_enough_tiles`](Self::has_enough_tiles).
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.title.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage(
                "game title must not be empty".into(),
            ));
        }
        if !Self::THRESHOLD_RANGE.contains(&self.heatmap_threshold) {
            return Err(ProtocolError::InvalidMessage(format!(
                "heatmap threshold must be between {} and {}, got {}",
                Self::THRESHOLD_RANGE.start(),
                Self::THRESHOLD_RANGE.end(),
                self.heatmap_threshold
            )));
        }
        Ok(())
    }

    /// Returns `true` if every non-center cell can get a distinct tile.
    pub fn has_enough_tiles(&self) -> bool {
        self.tiles.len() >= MIN_TILES
    }
}

// ---------------------------------------------------------------------------
// ClientGameState
// ---------------------------------------------------------------------------

/// What one viewer is shown after every state change.
///
/// `heatmap` is keyed by board coordinate (`"row-column"`, e.g. `"0-4"`),
/// not by tile text, because each viewer's board places texts in different
/// cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientGameState {
    pub board: Board,
    pub heatmap: BTreeMap<String, f64>,
    pub heatmap_threshold: u32,
    pub title: String,
}
