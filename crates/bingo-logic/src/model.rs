//! Persisted per-game data.

use std::collections::{BTreeMap, BTreeSet};

use bingo_protocol::{Board, PlayerId};
use serde::{Deserialize, Serialize};

/// Whether a player currently has a live socket.
///
/// A `Disconnected` player keeps their board and marks (and still counts
/// toward consensus) until the grace period runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    #[default]
    Connected,
    Disconnected,
}

/// One viewer's stored progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub board: Board,
    /// Tile texts this player has marked. Keyed by text, not position.
    #[serde(default)]
    pub selections: BTreeSet<String>,
    #[serde(default)]
    pub status: PlayerStatus,
}

impl Player {
    /// Returns `true` if the player has marked `text`.
    pub fn has_selected(&self, text: &str) -> bool {
        self.selections.contains(text)
    }
}

/// Every player in one game, keyed by id.
///
/// This is the authoritative copy kept in the state store. `BTreeMap`
/// keeps the stored JSON stable between writes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GameState {
    #[serde(default)]
    pub players: BTreeMap<PlayerId, Player>,
}

impl GameState {
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use bingo_protocol::Square;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_game_state_json_keys_players_by_id() {
        let id = PlayerId::new("u1");
        let mut state = GameState::default();
        state.players.insert(
            id.clone(),
            Player {
                id: id.clone(),
                name: "viewer".into(),
                board: std::array::from_fn(|_| std::array::from_fn(|_| Square::new("x"))),
                selections: BTreeSet::from(["x".to_string()]),
                status: PlayerStatus::Disconnected,
            },
        );

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["players"]["u1"]["status"], json!("disconnected"));
        assert_eq!(value["players"]["u1"]["selections"], json!(["x"]));

        let back: GameState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_player_missing_status_defaults_to_connected() {
        let board: Vec<Vec<Square>> = vec![vec![Square::new("x"); 5]; 5];
        let player: Player = serde_json::from_value(json!({
            "id": "u2",
            "name": "late",
            "board": board,
        }))
        .unwrap();
        assert_eq!(player.status, PlayerStatus::Connected);
        assert!(player.selections.is_empty());
    }
}
