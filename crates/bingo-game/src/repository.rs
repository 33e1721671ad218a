//! Typed access to the per-game blobs in the state store.

use std::sync::Arc;

use bingo_logic::GameState;
use bingo_protocol::{Codec, GameConfig, GameId, JsonCodec};
use bingo_store::StateStore;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::GameError;

const KEY_PREFIX: &str = "bingo";

/// Reads and writes one game's config and state.
///
/// Deleting both keys is what "the game ended" means to every process
/// sharing the store.
pub struct GameRepository<S> {
    store: Arc<S>,
}

impl<S> Clone for GameRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StateStore> GameRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config_key(game_id: GameId) -> String {
        format!("{KEY_PREFIX}:game-config:{game_id}")
    }

    pub fn state_key(game_id: GameId) -> String {
        format!("{KEY_PREFIX}:game-state:{game_id}")
    }

    /// The stored config, or `None` if the game was never started (or has
    /// already ended).
    pub async fn config(
        &self,
        game_id: GameId,
    ) -> Result<Option<GameConfig>, GameError> {
        self.read(&Self::config_key(game_id)).await
    }

    pub async fn save_config(
        &self,
        game_id: GameId,
        config: &GameConfig,
    ) -> Result<(), GameError> {
        self.write(&Self::config_key(game_id), config).await
    }

    /// The stored state. A game nobody has joined yet has an empty one.
    pub async fn state(&self, game_id: GameId) -> Result<GameState, GameError> {
        Ok(self
            .read(&Self::state_key(game_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn save_state(
        &self,
        game_id: GameId,
        state: &GameState,
    ) -> Result<(), GameError> {
        self.write(&Self::state_key(game_id), state).await
    }

    /// Deletes config and state. Returns how many keys existed.
    pub async fn clear(&self, game_id: GameId) -> Result<usize, GameError> {
        let keys = [Self::config_key(game_id), Self::state_key(game_id)];
        Ok(self.store.delete(&keys).await?)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, GameError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        JsonCodec
            .decode(raw.as_bytes())
            .map(Some)
            .map_err(|source| GameError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    async fn write<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), GameError> {
        let raw = JsonCodec.encode(value).map_err(GameError::Encode)?;
        self.store.set(key, raw, None).await?;
        Ok(())
    }
}
