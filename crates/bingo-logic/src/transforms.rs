//! State transitions.
//!
//! Each function takes the prior [`GameState`] by reference and returns the
//! next one. The input is never touched, which lets the session compare
//! before and after or simply drop the result if persisting fails.

use std::collections::BTreeSet;

use bingo_protocol::{FREE_SPACE, PlayerId, TileConfig};
use rand::Rng;

use crate::board::generate_board;
use crate::model::{GameState, Player, PlayerStatus};

/// Adds a player, or brings a known one back online.
///
/// A returning player keeps their board and selections and is marked
/// [`PlayerStatus::Connected`]; only a genuinely new player is dealt a
/// board, with the free space already marked. The display name is
/// refreshed either way.
pub fn with_player<R: Rng + ?Sized>(
    state: &GameState,
    player_id: &PlayerId,
    name: &str,
    tiles: &[TileConfig],
    rng: &mut R,
) -> GameState {
    let mut next = state.clone();
    let player = match next.players.remove(player_id) {
        Some(existing) => Player {
            name: name.to_string(),
            status: PlayerStatus::Connected,
            ..existing
        },
        None => Player {
            id: player_id.clone(),
            name: name.to_string(),
            board: generate_board(tiles, rng),
            selections: premarked(),
            status: PlayerStatus::Connected,
        },
    };
    next.players.insert(player_id.clone(), player);
    next
}

/// Toggles `text` in the player's selections. The free space toggles like
/// any other text.
///
/// Unknown players leave the state as it was.
pub fn with_selection(
    state: &GameState,
    player_id: &PlayerId,
    text: &str,
) -> GameState {
    let mut next = state.clone();
    if let Some(player) = next.players.get_mut(player_id) {
        if !player.selections.remove(text) {
            player.selections.insert(text.to_string());
        }
    }
    next
}

pub fn without_player(state: &GameState, player_id: &PlayerId) -> GameState {
    let mut next = state.clone();
    next.players.remove(player_id);
    next
}

pub fn with_status(
    state: &GameState,
    player_id: &PlayerId,
    status: PlayerStatus,
) -> GameState {
    let mut next = state.clone();
    if let Some(player) = next.players.get_mut(player_id) {
        player.status = status;
    }
    next
}

/// Deals every player a new board and clears all marks except the free
/// space. Nobody is removed.
pub fn for_new_round<R: Rng + ?Sized>(
    state: &GameState,
    tiles: &[TileConfig],
    rng: &mut R,
) -> GameState {
    let players = state
        .players
        .iter()
        .map(|(id, player)| {
            let fresh = Player {
                board: generate_board(tiles, rng),
                selections: premarked(),
                ..player.clone()
            };
            (id.clone(), fresh)
        })
        .collect();
    GameState { players }
}

/// Marks a freshly dealt board starts with.
fn premarked() -> BTreeSet<String> {
    BTreeSet::from([FREE_SPACE.to_string()])
}
