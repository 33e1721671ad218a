//! Per-viewer projection of the shared state.

use bingo_protocol::{ClientGameState, GameConfig, PlayerId};

use crate::consensus::{Heatmap, consensus_for};
use crate::model::GameState;

/// Heatmap key for a board coordinate, e.g. `"0-4"`.
pub fn coordinate_key(row: usize, column: usize) -> String {
    format!("{row}-{column}")
}

/// What `player_id` should see, given the game-wide heatmap.
///
/// `selected` on each square reflects only this player's marks, and the
/// text-keyed heatmap is re-keyed onto this player's cell layout. Returns
/// `None` if the player isn't in the game.
pub fn client_game_state(
    state: &GameState,
    heatmap: &Heatmap,
    player_id: &PlayerId,
    config: &GameConfig,
) -> Option<ClientGameState> {
    let player = state.player(player_id)?;

    let mut board = player.board.clone();
    let mut coordinates = Heatmap::new();
    for (row, cells) in board.iter_mut().enumerate() {
        for (column, square) in cells.iter_mut().enumerate() {
            square.selected = player.has_selected(&square.text);
            coordinates.insert(
                coordinate_key(row, column),
                consensus_for(heatmap, &square.text),
            );
        }
    }

    Some(ClientGameState {
        board,
        heatmap: coordinates,
        heatmap_threshold: config.heatmap_threshold,
        title: config.title.clone(),
    })
}
