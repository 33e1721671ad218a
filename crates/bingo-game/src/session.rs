//! Session actor: one Tokio task per live game.
//!
//! The actor owns the game's in-memory connection map and disconnect
//! timers, and is the only writer of the game's persisted state while it
//! runs. Every operation arrives as a [`SessionCommand`] on a bounded
//! channel and is handled to completion before the next one starts, so the
//! fetch → transform → write cycle against the store never interleaves
//! between two players of the same game.

use std::collections::HashMap;
use std::sync::Arc;

use bingo_bus::{CommandBus, publish_command};
use bingo_logic::{
    GameState, PlayerStatus, calculate_heatmap, check_bingo, client_game_state,
    transforms,
};
use bingo_protocol::{
    ActivityEvent, ActivityEventType, BingoCooldown, BotCommand, ClientMessage,
    GameConfig, GameId, PlayerId, ServerMessage,
};
use bingo_store::StateStore;
use bingo_transport::ConnectionId;
use chrono::{SecondsFormat, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::timers::{DisconnectTimers, ExpiryOutcome, OnExpire};
use crate::{GameError, GameRepository, SessionConfig};

/// Channel for delivering outbound messages to one connection's writer.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

/// Who is behind a connection, as established by `AUTH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub player_id: PlayerId,
    pub username: String,
}

/// How [`SessionHandle::add_player`] treated the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// First time in this game, or already connected on another socket.
    Joined,
    /// Came back during their grace period; board and marks kept.
    Reconnected,
}

/// Result of a `CLAIM_BINGO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Accepted,
    /// No line met the threshold. Nothing is sent to anyone.
    Rejected,
}

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    AddPlayer {
        identity: PlayerIdentity,
        connection_id: ConnectionId,
        sender: PlayerSender,
        reply: Reply<JoinKind>,
    },
    SelectSquare {
        player_id: PlayerId,
        connection_id: ConnectionId,
        square_text: String,
        reply: Reply<()>,
    },
    ClaimBingo {
        player_id: PlayerId,
        connection_id: ConnectionId,
        reply: Reply<ClaimOutcome>,
    },
    Disconnect {
        player_id: PlayerId,
        connection_id: ConnectionId,
        on_expire: OnExpire,
        reply: Reply<bool>,
    },
    /// Posted by a disconnect timer when it wakes.
    GraceExpired {
        player_id: PlayerId,
        generation: u64,
    },
    RemovePlayer {
        player_id: PlayerId,
        reply: Reply<bool>,
    },
    Reset {
        reply: Reply<()>,
    },
    /// Stops the actor once the stored data is gone.
    End {
        reply: Reply<()>,
    },
    IsEmpty {
        reply: oneshot::Sender<bool>,
    },
}

/// Handle to a running session actor.
///
/// Cheap to clone. The registry holds one per live game, and each
/// authenticated connection keeps its own copy.
#[derive(Clone)]
pub struct SessionHandle {
    game_id: GameId,
    sender: mpsc::Sender<SessionCommand>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("game_id", &self.game_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SessionHandle {
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles talk to the same actor.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Registers a connection for a player and persists them in the game.
    ///
    /// A player whose stored status is `disconnected` is reconnecting: their
    /// grace timer is cancelled and their board and marks are kept.
    /// Everyone connected then receives an activity event and a fresh
    /// per-player `GAME_STATE`.
    pub async fn add_player(
        &self,
        identity: PlayerIdentity,
        connection_id: ConnectionId,
        sender: PlayerSender,
    ) -> Result<JoinKind, GameError> {
        self.request(|reply| SessionCommand::AddPlayer {
            identity,
            connection_id,
            sender,
            reply,
        })
        .await?
    }

    /// Toggles the player's mark on `square_text` and rebroadcasts state.
    ///
    /// `connection_id` must be the player's current connection; requests
    /// from a replaced socket fail with [`GameError::StaleConnection`].
    pub async fn select_square(
        &self,
        player_id: PlayerId,
        connection_id: ConnectionId,
        square_text: String,
    ) -> Result<(), GameError> {
        self.request(|reply| SessionCommand::SelectSquare {
            player_id,
            connection_id,
            square_text,
            reply,
        })
        .await?
    }

    /// Verifies a bingo claim against the current consensus.
    pub async fn claim_bingo(
        &self,
        player_id: PlayerId,
        connection_id: ConnectionId,
    ) -> Result<ClaimOutcome, GameError> {
        self.request(|reply| SessionCommand::ClaimBingo {
            player_id,
            connection_id,
            reply,
        })
        .await?
    }

    /// Routes a game message from an authenticated connection.
    ///
    /// Messages that aren't game messages are ignored.
    pub async fn handle_message(
        &self,
        player_id: PlayerId,
        connection_id: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), GameError> {
        match msg {
            ClientMessage::SelectSquare(select) => {
                self.select_square(player_id, connection_id, select.square_text)
                    .await
            }
            ClientMessage::ClaimBingo => {
                self.claim_bingo(player_id, connection_id).await.map(|_| ())
            }
            other => {
                tracing::debug!(
                    game_id = %self.game_id,
                    %player_id,
                    ?other,
                    "not a game message, ignoring"
                );
                Ok(())
            }
        }
    }

    /// Starts the grace period for a player whose connection closed.
    ///
    /// The player is marked `disconnected` right away but still counts
    /// toward consensus. If they don't reconnect in time they are removed
    /// and `on_expire` runs. Returns `false` without doing anything when
    /// `connection_id` is not the player's current connection.
    pub async fn start_disconnect_timer(
        &self,
        player_id: PlayerId,
        connection_id: ConnectionId,
        on_expire: OnExpire,
    ) -> Result<bool, GameError> {
        self.request(|reply| SessionCommand::Disconnect {
            player_id,
            connection_id,
            on_expire,
            reply,
        })
        .await?
    }

    /// Removes a player from the game immediately. Returns `false` if they
    /// had no connection here.
    pub async fn remove_player(
        &self,
        player_id: PlayerId,
    ) -> Result<bool, GameError> {
        self.request(|reply| SessionCommand::RemovePlayer { player_id, reply })
            .await?
    }

    /// Deals everyone a new board and clears all marks.
    pub async fn reset(&self) -> Result<(), GameError> {
        self.request(|reply| SessionCommand::Reset { reply }).await?
    }

    /// Deletes the game's stored data, sends `GAME_ENDED` to everyone,
    /// notifies the bot, and stops the actor.
    ///
    /// If the data can't be deleted the error is returned, nobody is told
    /// anything, and the session keeps running so the end can be retried.
    pub async fn end(&self) -> Result<(), GameError> {
        self.request(|reply| SessionCommand::End { reply }).await?
    }

    /// `true` when no connections (live or in grace) remain.
    pub async fn is_empty(&self) -> Result<bool, GameError> {
        self.request(|reply| SessionCommand::IsEmpty { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))?;
        reply_rx
            .await
            .map_err(|_| GameError::Unavailable(self.game_id))
    }
}

/// A connection's slot in the session.
///
/// `sender` is `None` while the player is in their grace period.
struct PlayerConnection {
    connection_id: ConnectionId,
    username: String,
    sender: Option<PlayerSender>,
}

/// The internal session state. Runs inside a Tokio task.
struct GameSession<S, B> {
    game_id: GameId,
    config: GameConfig,
    settings: SessionConfig,
    repository: GameRepository<S>,
    bus: Arc<B>,
    connections: HashMap<PlayerId, PlayerConnection>,
    timers: DisconnectTimers,
    rng: StdRng,
    receiver: mpsc::Receiver<SessionCommand>,
    /// Handed to timers so a pending expiry doesn't keep the actor alive.
    weak_sender: mpsc::WeakSender<SessionCommand>,
}

impl<S: StateStore, B: CommandBus> GameSession<S, B> {
    async fn run(mut self) {
        tracing::info!(game_id = %self.game_id, "session started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::AddPlayer {
                    identity,
                    connection_id,
                    sender,
                    reply,
                } => {
                    let result =
                        self.add_player(identity, connection_id, sender).await;
                    let _ = reply.send(self.logged(result, "add player"));
                }
                SessionCommand::SelectSquare {
                    player_id,
                    connection_id,
                    square_text,
                    reply,
                } => {
                    let result = self
                        .select_square(&player_id, connection_id, &square_text)
                        .await;
                    let _ = reply.send(self.logged(result, "select square"));
                }
                SessionCommand::ClaimBingo {
                    player_id,
                    connection_id,
                    reply,
                } => {
                    let result = self.claim_bingo(&player_id, connection_id).await;
                    let _ = reply.send(self.logged(result, "claim bingo"));
                }
                SessionCommand::Disconnect {
                    player_id,
                    connection_id,
                    on_expire,
                    reply,
                } => {
                    let result = self
                        .disconnect(player_id, connection_id, on_expire)
                        .await;
                    let _ = reply.send(self.logged(result, "disconnect"));
                }
                SessionCommand::GraceExpired {
                    player_id,
                    generation,
                } => {
                    self.grace_expired(player_id, generation).await;
                }
                SessionCommand::RemovePlayer { player_id, reply } => {
                    self.timers.cancel(&player_id);
                    let result = self.remove_player(&player_id).await;
                    let _ = reply.send(self.logged(result, "remove player"));
                }
                SessionCommand::Reset { reply } => {
                    let result = self.reset().await;
                    let _ = reply.send(self.logged(result, "reset"));
                }
                SessionCommand::End { reply } => {
                    let result = self.end().await;
                    let ended = result.is_ok();
                    let _ = reply.send(self.logged(result, "end"));
                    if ended {
                        break;
                    }
                }
                SessionCommand::IsEmpty { reply } => {
                    let _ = reply.send(self.connections.is_empty());
                }
            }
        }

        self.timers.cancel_all();
        tracing::info!(game_id = %self.game_id, "session stopped");
    }

    fn logged<T>(
        &self,
        result: Result<T, GameError>,
        operation: &str,
    ) -> Result<T, GameError> {
        if let Err(err) = &result {
            match err {
                GameError::NotInGame(..) | GameError::StaleConnection(..) => tracing::warn!(
                    game_id = %self.game_id,
                    operation,
                    error = %err,
                    "request rejected"
                ),
                _ => tracing::error!(
                    game_id = %self.game_id,
                    operation,
                    error = %err,
                    "session operation failed"
                ),
            }
        }
        result
    }

    // -------------------------------------------------------------------
    // Operations
    // -------------------------------------------------------------------

    async fn add_player(
        &mut self,
        identity: PlayerIdentity,
        connection_id: ConnectionId,
        sender: PlayerSender,
    ) -> Result<JoinKind, GameError> {
        let PlayerIdentity {
            player_id,
            username,
        } = identity;
        let state = self.repository.state(self.game_id).await?;
        let reconnecting = state
            .player(&player_id)
            .is_some_and(|p| p.status == PlayerStatus::Disconnected);

        if reconnecting {
            self.timers.cancel(&player_id);
        }

        let next = transforms::with_player(
            &state,
            &player_id,
            &username,
            &self.config.tiles,
            &mut self.rng,
        );
        self.repository.save_state(self.game_id, &next).await?;

        let kind = if reconnecting {
            JoinKind::Reconnected
        } else {
            JoinKind::Joined
        };
        tracing::info!(
            game_id = %self.game_id,
            %player_id,
            conn_id = %connection_id,
            ?kind,
            players = next.player_count(),
            "player added"
        );

        self.connections.insert(
            player_id,
            PlayerConnection {
                connection_id,
                username: username.clone(),
                sender: Some(sender),
            },
        );

        let event = match kind {
            JoinKind::Joined => ActivityEventType::Join,
            JoinKind::Reconnected => ActivityEventType::Reconnected,
        };
        self.broadcast(&activity(event, username));
        self.broadcast_state(&next);
        Ok(kind)
    }

    async fn select_square(
        &mut self,
        player_id: &PlayerId,
        connection_id: ConnectionId,
        square_text: &str,
    ) -> Result<(), GameError> {
        self.require_current(player_id, connection_id)?;
        let state = self.repository.state(self.game_id).await?;
        let next = transforms::with_selection(&state, player_id, square_text);
        self.repository.save_state(self.game_id, &next).await?;

        tracing::debug!(
            game_id = %self.game_id,
            %player_id,
            square_text,
            "square toggled"
        );
        self.broadcast_state(&next);
        Ok(())
    }

    async fn claim_bingo(
        &mut self,
        player_id: &PlayerId,
        connection_id: ConnectionId,
    ) -> Result<ClaimOutcome, GameError> {
        self.require_current(player_id, connection_id)?;
        let state = self.repository.state(self.game_id).await?;
        let player = state
            .player(player_id)
            .ok_or_else(|| GameError::NotInGame(player_id.clone(), self.game_id))?;

        let heatmap = calculate_heatmap(&state);
        if !check_bingo(player, &heatmap, self.config.heatmap_threshold) {
            tracing::debug!(
                game_id = %self.game_id,
                %player_id,
                "bingo claim did not meet consensus"
            );
            return Ok(ClaimOutcome::Rejected);
        }

        tracing::info!(game_id = %self.game_id, %player_id, "bingo!");
        self.broadcast(&activity(ActivityEventType::Bingo, player.name.clone()));

        if self.config.announce_in_chat {
            let announce = BotCommand::AnnounceBingo {
                game_id: self.game_id,
                twitch_username: player.name.clone(),
            };
            if let Err(err) = publish_command(self.bus.as_ref(), &announce).await {
                tracing::error!(
                    game_id = %self.game_id,
                    error = %err,
                    "failed to announce bingo"
                );
            }
        }

        let cooldown = ServerMessage::BingoCooldown(BingoCooldown {
            cooldown_seconds: self.settings.bingo_cooldown.as_secs(),
        });
        self.send_to(player_id, cooldown);
        Ok(ClaimOutcome::Accepted)
    }

    async fn disconnect(
        &mut self,
        player_id: PlayerId,
        connection_id: ConnectionId,
        on_expire: OnExpire,
    ) -> Result<bool, GameError> {
        let Some(connection) = self.connections.get_mut(&player_id) else {
            tracing::debug!(
                game_id = %self.game_id,
                %player_id,
                "disconnect for unknown player, ignoring"
            );
            return Ok(false);
        };
        if connection.connection_id != connection_id {
            tracing::debug!(
                game_id = %self.game_id,
                %player_id,
                stale = %connection_id,
                current = %connection.connection_id,
                "close from superseded connection, ignoring"
            );
            return Ok(false);
        }
        connection.sender = None;

        self.timers.schedule(
            player_id.clone(),
            self.settings.disconnect_grace,
            on_expire,
            self.weak_sender.clone(),
        );
        tracing::info!(
            game_id = %self.game_id,
            %player_id,
            grace_secs = self.settings.disconnect_grace.as_secs(),
            "player disconnected, grace period started"
        );

        let state = self.repository.state(self.game_id).await?;
        let next = transforms::with_status(
            &state,
            &player_id,
            PlayerStatus::Disconnected,
        );
        self.repository.save_state(self.game_id, &next).await?;
        Ok(true)
    }

    async fn grace_expired(&mut self, player_id: PlayerId, generation: u64) {
        let Some(on_expire) = self.timers.take_if_current(&player_id, generation)
        else {
            tracing::warn!(
                game_id = %self.game_id,
                %player_id,
                generation,
                "stale disconnect timer, ignoring"
            );
            return;
        };

        tracing::info!(
            game_id = %self.game_id,
            %player_id,
            "player did not reconnect in time"
        );
        let result = self.remove_player(&player_id).await;
        let _ = self.logged(result, "remove expired player");

        on_expire(ExpiryOutcome {
            game_id: self.game_id,
            player_id,
            game_empty: self.connections.is_empty(),
        });
    }

    async fn remove_player(
        &mut self,
        player_id: &PlayerId,
    ) -> Result<bool, GameError> {
        let Some(connection) = self.connections.remove(player_id) else {
            return Ok(false);
        };

        let state = self.repository.state(self.game_id).await?;
        let next = transforms::without_player(&state, player_id);
        self.repository.save_state(self.game_id, &next).await?;

        tracing::info!(
            game_id = %self.game_id,
            %player_id,
            players = next.player_count(),
            "player removed"
        );
        self.broadcast(&activity(ActivityEventType::Leave, connection.username));
        self.broadcast_state(&next);
        Ok(true)
    }

    async fn reset(&mut self) -> Result<(), GameError> {
        let state = self.repository.state(self.game_id).await?;
        let next =
            transforms::for_new_round(&state, &self.config.tiles, &mut self.rng);
        self.repository.save_state(self.game_id, &next).await?;

        tracing::info!(
            game_id = %self.game_id,
            players = next.player_count(),
            "new round dealt"
        );
        self.broadcast_state(&next);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), GameError> {
        // Nothing is torn down until the stored game is gone.
        let removed = self.repository.clear(self.game_id).await?;
        tracing::info!(game_id = %self.game_id, removed, "game data cleared");

        self.timers.cancel_all();
        self.broadcast(&ServerMessage::GameEnded);
        self.connections.clear();

        let ended = BotCommand::GameEnded {
            game_id: self.game_id,
        };
        if let Err(err) = publish_command(self.bus.as_ref(), &ended).await {
            tracing::error!(
                game_id = %self.game_id,
                error = %err,
                "failed to notify bot of game end"
            );
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Delivery
    // -------------------------------------------------------------------

    /// The player must be connected, and on `connection_id`.
    fn require_current(
        &self,
        player_id: &PlayerId,
        connection_id: ConnectionId,
    ) -> Result<(), GameError> {
        match self.connections.get(player_id) {
            Some(connection) if connection.sender.is_none() => {
                Err(GameError::NotInGame(player_id.clone(), self.game_id))
            }
            Some(connection) if connection.connection_id != connection_id => {
                Err(GameError::StaleConnection(player_id.clone(), connection_id))
            }
            Some(_) => Ok(()),
            None => Err(GameError::NotInGame(player_id.clone(), self.game_id)),
        }
    }

    /// Sends to one player. A closed channel is logged and skipped.
    fn send_to(&self, player_id: &PlayerId, msg: ServerMessage) {
        let Some(sender) = self
            .connections
            .get(player_id)
            .and_then(|c| c.sender.as_ref())
        else {
            return;
        };
        if sender.send(msg).is_err() {
            tracing::warn!(
                game_id = %self.game_id,
                %player_id,
                "outbound channel closed, message dropped"
            );
        }
    }

    fn broadcast(&self, msg: &ServerMessage) {
        for player_id in self.connections.keys() {
            self.send_to(player_id, msg.clone());
        }
    }

    /// Sends each connected player their own view of `state`.
    fn broadcast_state(&self, state: &GameState) {
        let heatmap = calculate_heatmap(state);
        for (player_id, connection) in &self.connections {
            if connection.sender.is_none() {
                continue;
            }
            match client_game_state(state, &heatmap, player_id, &self.config) {
                Some(view) => self.send_to(player_id, ServerMessage::GameState(view)),
                None => tracing::warn!(
                    game_id = %self.game_id,
                    %player_id,
                    "connected player missing from stored state"
                ),
            }
        }
    }
}

fn activity(event_type: ActivityEventType, username: String) -> ServerMessage {
    ServerMessage::ActivityEvent(ActivityEvent {
        event_type,
        username,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Spawns a session actor for `game_id` and returns a handle to it.
///
/// `config` is the game's settings as read from the store; the session
/// keeps this copy for its whole life.
pub fn spawn_session<S: StateStore, B: CommandBus>(
    game_id: GameId,
    config: GameConfig,
    settings: SessionConfig,
    repository: GameRepository<S>,
    bus: Arc<B>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(settings.command_buffer.max(1));

    let session = GameSession {
        game_id,
        config,
        settings,
        repository,
        bus,
        connections: HashMap::new(),
        timers: DisconnectTimers::default(),
        rng: StdRng::from_os_rng(),
        receiver: rx,
        weak_sender: tx.downgrade(),
    };

    tokio::spawn(session.run());

    SessionHandle {
        game_id,
        sender: tx,
    }
}
