//! Consensus aggregation and win detection.

use std::collections::{BTreeMap, HashMap};

use bingo_protocol::BOARD_SIZE;

use crate::model::{GameState, Player};

/// Percentage of players (0–100) that marked each tile text.
///
/// Keyed by text, never by coordinate: boards are shuffled independently,
/// so the same text sits in different cells for different players.
pub type Heatmap = BTreeMap<String, f64>;

/// Builds the heatmap for the whole game.
///
/// Every player counts toward the total, including ones in their
/// disconnect grace period. A game with no players yields an empty map.
pub fn calculate_heatmap(state: &GameState) -> Heatmap {
    let total = state.player_count();
    if total == 0 {
        return Heatmap::new();
    }

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for player in state.players.values() {
        // `selections` is a set, so one player adds at most one per text.
        for text in &player.selections {
            *counts.entry(text.as_str()).or_default() += 1;
        }
    }

    counts
        .into_iter()
        .map(|(text, count)| {
            (text.to_string(), count as f64 / total as f64 * 100.0)
        })
        .collect()
}

/// Consensus for a single text. Texts nobody marked are at zero.
pub fn consensus_for(heatmap: &Heatmap, text: &str) -> f64 {
    heatmap.get(text).copied().unwrap_or(0.0)
}

/// A completed line on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WinningLine {
    Row(usize),
    Column(usize),
    /// Top-left to bottom-right.
    MainDiagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

/// Every line on the player's board made up entirely of won cells.
///
/// A cell is won when the player marked its text and that text's consensus
/// is at least `threshold` percent. The free space follows the same rule.
pub fn winning_lines(
    player: &Player,
    heatmap: &Heatmap,
    threshold: u32,
) -> Vec<WinningLine> {
    let threshold = f64::from(threshold);
    let won = |row: usize, column: usize| {
        let square = &player.board[row][column];
        player.has_selected(&square.text)
            && consensus_for(heatmap, &square.text) >= threshold
    };

    let mut lines = Vec::new();
    for row in 0..BOARD_SIZE {
        if (0..BOARD_SIZE).all(|column| won(row, column)) {
            lines.push(WinningLine::Row(row));
        }
    }
    for column in 0..BOARD_SIZE {
        if (0..BOARD_SIZE).all(|row| won(row, column)) {
            lines.push(WinningLine::Column(column));
        }
    }
    if (0..BOARD_SIZE).all(|i| won(i, i)) {
        lines.push(WinningLine::MainDiagonal);
    }
    if (0..BOARD_SIZE).all(|i| won(i, BOARD_SIZE - 1 - i)) {
        lines.push(WinningLine::AntiDiagonal);
    }
    lines
}

/// Returns `true` if the player has at least one winning line.
pub fn check_bingo(player: &Player, heatmap: &Heatmap, threshold: u32) -> bool {
    !winning_lines(player, heatmap, threshold).is_empty()
}
