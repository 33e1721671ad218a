//! Session registry: creates, tracks, and ends session actors by game id.
//!
//! This is the entry point for session operations from higher layers (the
//! connection gateway) and the only component that listens to the
//! game-control channel of the command bus.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use bingo_bus::{CommandBus, TypedSubscription};
use bingo_protocol::{GameCommand, GameConfig, GameId, PlayerId};
use bingo_store::StateStore;
use bingo_transport::ConnectionId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::session::spawn_session;
use crate::timers::{ExpiryOutcome, OnExpire};
use crate::{GameError, GameRepository, SessionConfig, SessionHandle};

/// Owns every live session in this process.
///
/// Sessions are created lazily: `START_GAME` only stores a config, and the
/// first authenticated viewer of that game brings the session up through
/// [`find_or_create`](Self::find_or_create).
pub struct SessionRegistry<S, B> {
    repository: GameRepository<S>,
    bus: Arc<B>,
    settings: SessionConfig,
    /// Live sessions, keyed by game id. Held across the config lookup in
    /// `find_or_create` so two viewers joining at once share one session.
    sessions: Mutex<HashMap<GameId, SessionHandle>>,
}

impl<S: StateStore, B: CommandBus> SessionRegistry<S, B> {
    pub fn new(store: Arc<S>, bus: Arc<B>, settings: SessionConfig) -> Self {
        Self {
            repository: GameRepository::new(store),
            bus,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &GameRepository<S> {
        &self.repository
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    /// Returns the live session for `game_id`, creating it from the stored
    /// config if needed.
    ///
    /// `Ok(None)` means no config exists: the game was never started or has
    /// already ended. Callers treat that as an authentication failure.
    pub async fn find_or_create(
        &self,
        game_id: GameId,
    ) -> Result<Option<SessionHandle>, GameError> {
        let mut sessions = self.sessions.lock().await;

        if let Some(handle) = sessions.get(&game_id) {
            if !handle.is_closed() {
                return Ok(Some(handle.clone()));
            }
            tracing::warn!(%game_id, "dropping handle to stopped session");
            sessions.remove(&game_id);
        }

        let Some(config) = self.repository.config(game_id).await? else {
            tracing::warn!(%game_id, "no stored config, cannot create session");
            return Ok(None);
        };

        let handle = spawn_session(
            game_id,
            config,
            self.settings.clone(),
            self.repository.clone(),
            Arc::clone(&self.bus),
        );
        sessions.insert(game_id, handle.clone());
        tracing::info!(%game_id, sessions = sessions.len(), "session created");
        Ok(Some(handle))
    }

    /// The live session for `game_id`, if this process hosts one.
    pub async fn get(&self, game_id: GameId) -> Option<SessionHandle> {
        self.sessions.lock().await.get(&game_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Stores a config so the game can be joined. Does not create a
    /// session.
    pub async fn start(
        &self,
        game_id: GameId,
        config: GameConfig,
    ) -> Result<(), GameError> {
        config.validate().map_err(GameError::InvalidConfig)?;
        if !config.has_enough_tiles() {
            tracing::warn!(
                %game_id,
                tiles = config.tiles.len(),
                "fewer tiles than board cells, placeholders will be used"
            );
        }
        if self.get(game_id).await.is_some() {
            tracing::warn!(
                %game_id,
                "game already running, new config applies to the next session"
            );
        }

        self.repository.save_config(game_id, &config).await?;
        tracing::info!(%game_id, title = %config.title, "game config stored");
        Ok(())
    }

    /// Resets the live session, if any. Returns `false` if none is hosted
    /// here.
    pub async fn reset(&self, game_id: GameId) -> Result<bool, GameError> {
        let Some(handle) = self.get(game_id).await else {
            tracing::debug!(%game_id, "no live session to reset");
            return Ok(false);
        };
        handle.reset().await?;
        Ok(true)
    }

    /// Ends a game: stored data is deleted, everyone gets `GAME_ENDED`, and
    /// the session is dropped from the registry.
    ///
    /// The session stays registered until its data is gone, so a failed end
    /// can be retried. With no live session here the stored data is still
    /// deleted, which keeps the game from being joined again. Returns
    /// whether a session ended.
    pub async fn end(&self, game_id: GameId) -> Result<bool, GameError> {
        let Some(handle) = self.get(game_id).await else {
            let removed = self.repository.clear(game_id).await?;
            tracing::warn!(%game_id, removed, "no live session to end, stored data cleared");
            return Ok(false);
        };

        match handle.end().await {
            Ok(()) => {}
            Err(GameError::Unavailable(_)) => {
                tracing::warn!(
                    %game_id,
                    "session already stopped, clearing stored data directly"
                );
                self.repository.clear(game_id).await?;
            }
            Err(err) => return Err(err),
        }

        let mut sessions = self.sessions.lock().await;
        if sessions.get(&game_id).is_some_and(|h| h.same_session(&handle)) {
            sessions.remove(&game_id);
        }
        tracing::info!(%game_id, "game ended and cleaned up");
        Ok(true)
    }

    /// Ends the game only if its session has no connections left.
    pub async fn end_if_empty(&self, game_id: GameId) -> Result<bool, GameError> {
        let Some(handle) = self.get(game_id).await else {
            return Ok(false);
        };
        if !handle.is_empty().await? {
            tracing::debug!(%game_id, "session still has players, keeping it");
            return Ok(false);
        }
        tracing::info!(%game_id, "last player gone, ending game");
        self.end(game_id).await
    }

    /// Applies one command from the game-control channel.
    pub async fn handle_command(
        &self,
        command: GameCommand,
    ) -> Result<(), GameError> {
        let game_id = command.game_id();
        match command {
            GameCommand::StartGame { game_config, .. } => {
                tracing::info!(%game_id, "received START_GAME");
                self.start(game_id, game_config).await
            }
            GameCommand::ResetGame { .. } => {
                tracing::info!(%game_id, "received RESET_GAME");
                self.reset(game_id).await.map(|_| ())
            }
            GameCommand::EndGame { .. } => {
                tracing::info!(%game_id, "received END_GAME");
                self.end(game_id).await.map(|_| ())
            }
        }
    }
}

impl<S: StateStore, B: CommandBus> SessionRegistry<S, B> {
    /// Subscribes to the game-control channel and spawns a task applying
    /// each command in arrival order.
    ///
    /// The subscription exists by the time this returns, so commands
    /// published afterwards are not missed. The task runs until the bus
    /// closes.
    pub async fn listen(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<()>, GameError> {
        let mut commands =
            TypedSubscription::<GameCommand>::subscribe(self.bus.as_ref()).await?;
        let registry = Arc::clone(self);

        Ok(tokio::spawn(async move {
            tracing::info!("listening for game commands");
            while let Some(received) = commands.recv().await {
                match received {
                    Ok(command) => {
                        if let Err(err) = registry.handle_command(command).await {
                            tracing::error!(error = %err, "game command failed");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "ignoring malformed game command");
                    }
                }
            }
            tracing::info!("game command channel closed");
        }))
    }

    /// Starts the disconnect grace period for a closed connection.
    ///
    /// When the grace period runs out and the session is left without
    /// connections, the game is ended. Returns `false` if no live session
    /// exists for the game or `connection_id` was already superseded.
    pub async fn begin_grace_period(
        self: &Arc<Self>,
        game_id: GameId,
        player_id: PlayerId,
        connection_id: ConnectionId,
    ) -> Result<bool, GameError> {
        let Some(handle) = self.get(game_id).await else {
            tracing::debug!(%game_id, %player_id, "no live session for closed connection");
            return Ok(false);
        };
        let on_expire = end_when_empty(Arc::downgrade(self));
        handle
            .start_disconnect_timer(player_id, connection_id, on_expire)
            .await
    }
}

/// Expiry callback that ends the game once nobody is left.
///
/// Holds the registry weakly so pending timers don't keep it alive.
fn end_when_empty<S: StateStore, B: CommandBus>(
    registry: Weak<SessionRegistry<S, B>>,
) -> OnExpire {
    Box::new(move |outcome: ExpiryOutcome| {
        if !outcome.game_empty {
            return;
        }
        let Some(registry) = registry.upgrade() else {
            return;
        };
        // Runs on the session task, which `end_if_empty` talks to.
        tokio::spawn(async move {
            if let Err(err) = registry.end_if_empty(outcome.game_id).await {
                tracing::error!(
                    game_id = %outcome.game_id,
                    error = %err,
                    "failed to end empty game"
                );
            }
        });
    })
}

#[cfg(test)]
mod tests {
    use bingo_bus::LocalBus;
    use bingo_protocol::TileConfig;
    use bingo_store::MemoryStore;

    use super::*;

    fn registry() -> SessionRegistry<MemoryStore, LocalBus> {
        SessionRegistry::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalBus::new()),
            SessionConfig::default(),
        )
    }

    fn config(threshold: u32) -> GameConfig {
        GameConfig {
            title: "Registry".into(),
            tiles: (0..24).map(|i| TileConfig::new(format!("t{i}"))).collect(),
            heatmap_threshold: threshold,
            announce_in_chat: false,
        }
    }

    #[tokio::test]
    async fn test_find_or_create_without_config_is_none() {
        let registry = registry();
        assert!(registry.find_or_create(GameId::new()).await.unwrap().is_none());
        assert_eq!(registry.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_start_does_not_create_session() {
        let registry = registry();
        let game_id = GameId::new();
        registry.start(game_id, config(50)).await.unwrap();

        assert_eq!(registry.session_count().await, 0);
        assert!(registry.repository().config(game_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_or_create_reuses_live_session() {
        let registry = registry();
        let game_id = GameId::new();
        registry.start(game_id, config(50)).await.unwrap();

        let first = registry.find_or_create(game_id).await.unwrap().unwrap();
        let second = registry.find_or_create(game_id).await.unwrap().unwrap();
        assert_eq!(first.game_id(), second.game_id());
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_threshold() {
        let registry = registry();
        let game_id = GameId::new();
        let result = registry.start(game_id, config(5)).await;
        assert!(matches!(result, Err(GameError::InvalidConfig(_))));
        assert!(registry.repository().config(game_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_unknown_game_is_noop() {
        let registry = registry();
        assert!(!registry.end(GameId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_end_without_session_clears_stored_config() {
        let registry = registry();
        let game_id = GameId::new();
        registry.start(game_id, config(50)).await.unwrap();

        assert!(!registry.end(game_id).await.unwrap());
        assert!(registry.repository().config(game_id).await.unwrap().is_none());
        assert!(registry.find_or_create(game_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_is_idempotent_and_clears_store() {
        let registry = registry();
        let game_id = GameId::new();
        registry.start(game_id, config(50)).await.unwrap();
        registry.find_or_create(game_id).await.unwrap();

        assert!(registry.end(game_id).await.unwrap());
        assert!(!registry.end(game_id).await.unwrap());
        assert_eq!(registry.session_count().await, 0);
        assert!(registry.repository().store().is_empty());
    }

    #[tokio::test]
    async fn test_reset_without_session_returns_false() {
        let registry = registry();
        assert!(!registry.reset(GameId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_end_if_empty_ends_session_without_players() {
        let registry = registry();
        let game_id = GameId::new();
        registry.start(game_id, config(50)).await.unwrap();
        registry.find_or_create(game_id).await.unwrap();

        assert!(registry.end_if_empty(game_id).await.unwrap());
        assert!(registry.get(game_id).await.is_none());
    }
}
