//! Per-connection gateway: authentication, heartbeat, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task that drains the connection's outbound queue.
//!      Sessions push `GAME_STATE` and activity events into that queue.
//!   2. Loop: probe liveness on every heartbeat tick, decode inbound frames,
//!      and dispatch `AUTH`, `PING`, `PONG`, or a game message.
//!   3. On close, hand the player to the session's disconnect grace period.
//!
//! Replies that only concern this connection (`PONG`, the heartbeat `PING`,
//! `SERVER_ERROR`) are written directly to the socket, since they must work
//! before the connection is bound to any session.

use std::sync::Arc;

use bingo_bus::CommandBus;
use bingo_game::{GameError, JoinKind, PlayerSender, SessionHandle};
use bingo_protocol::{
    AuthPayload, ClientMessage, Codec, PlayerId, ServerMessage,
};
use bingo_store::StateStore;
use bingo_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::auth::Authenticator;
use crate::server::ServerState;
use crate::BingoError;

/// The session binding established by a successful `AUTH`.
struct Authenticated {
    handle: SessionHandle,
    player_id: PlayerId,
}

/// What the read loop should do after a frame.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, B, A>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, B, A>>,
) -> Result<(), BingoError>
where
    S: StateStore,
    B: CommandBus,
    A: Authenticator,
{
    let conn_id = conn.id();
    let conn = Arc::new(conn);
    tracing::debug!(%conn_id, "handling new connection");

    let (outbound, queue) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbound(
        Arc::clone(&conn),
        queue,
        state.codec,
    ));

    let mut bound: Option<Authenticated> = None;
    let result =
        read_loop(&conn, &state, &outbound, &mut bound).await;

    // Whatever happened, the player gets their grace period.
    if let Some(Authenticated { handle, player_id }) = bound {
        let game_id = handle.game_id();
        match state
            .registry
            .begin_grace_period(game_id, player_id.clone(), conn_id)
            .await
        {
            Ok(true) => tracing::info!(
                %game_id, %player_id, %conn_id,
                "connection closed, grace period started"
            ),
            Ok(false) => tracing::debug!(
                %game_id, %player_id, %conn_id,
                "connection closed, no grace period needed"
            ),
            Err(err) => tracing::error!(
                %game_id, %player_id, %conn_id, error = %err,
                "failed to start grace period"
            ),
        }
    }

    drop(outbound);
    writer.abort();
    result
}

/// Runs the heartbeat and dispatches inbound frames until the connection
/// ends.
async fn read_loop<S, B, A>(
    conn: &WebSocketConnection,
    state: &ServerState<S, B, A>,
    outbound: &PlayerSender,
    bound: &mut Option<Authenticated>,
) -> Result<(), BingoError>
where
    S: StateStore,
    B: CommandBus,
    A: Authenticator,
{
    let conn_id = conn.id();
    let period = state.config.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut alive = true;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !alive {
                    tracing::info!(%conn_id, "no PONG since last heartbeat, terminating");
                    if let Err(e) = conn.close().await {
                        tracing::debug!(%conn_id, error = %e, "close failed");
                    }
                    return Ok(());
                }
                alive = false;
                reply(conn, state, &ServerMessage::Ping).await?;
            }
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        return Ok(());
                    }
                };

                let msg: ClientMessage = match state.codec.decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "failed to decode message");
                        reply(conn, state, &ServerMessage::error(format!("invalid message: {e}"))).await?;
                        continue;
                    }
                };

                match msg {
                    ClientMessage::Ping => {
                        reply(conn, state, &ServerMessage::Pong).await?;
                    }
                    ClientMessage::Pong => {
                        alive = true;
                    }
                    ClientMessage::Auth(claims) => {
                        authenticate(conn, state, outbound, bound, claims).await?;
                    }
                    game_message => {
                        if let Flow::Close =
                            route_game_message(conn, state, bound.as_ref(), game_message).await?
                        {
                            if let Err(e) = conn.close().await {
                                tracing::debug!(%conn_id, error = %e, "close failed");
                            }
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Handles `AUTH`: validate, authenticate, then join the game's session.
///
/// Every failure is reported with `SERVER_ERROR` and leaves the connection
/// unauthenticated, so the client may try again.
async fn authenticate<S, B, A>(
    conn: &WebSocketConnection,
    state: &ServerState<S, B, A>,
    outbound: &PlayerSender,
    bound: &mut Option<Authenticated>,
    claims: AuthPayload,
) -> Result<(), BingoError>
where
    S: StateStore,
    B: CommandBus,
    A: Authenticator,
{
    let conn_id = conn.id();
    let game_id = claims.game_id;

    if let Some(existing) = bound.as_ref() {
        tracing::warn!(
            %conn_id,
            player_id = %existing.player_id,
            "AUTH on an already authenticated connection"
        );
        return reply(conn, state, &ServerMessage::error("already authenticated")).await;
    }
    if let Err(e) = claims.validate() {
        return reply(conn, state, &ServerMessage::error(e.to_string())).await;
    }

    let identity = match state.auth.authenticate(&claims).await {
        Ok(identity) => identity,
        Err(e) => {
            tracing::info!(%conn_id, %game_id, error = %e, "authentication rejected");
            return reply(conn, state, &ServerMessage::error(e.to_string())).await;
        }
    };

    let handle = match state.registry.find_or_create(game_id).await {
        Ok(Some(handle)) => handle,
        Ok(None) => {
            return reply(conn, state, &ServerMessage::error("game not found")).await;
        }
        Err(e) => {
            tracing::error!(%conn_id, %game_id, error = %e, "session lookup failed");
            return reply(conn, state, &ServerMessage::error(e.to_string())).await;
        }
    };

    let player_id = identity.player_id.clone();
    match handle.add_player(identity, conn_id, outbound.clone()).await {
        Ok(kind) => {
            match kind {
                JoinKind::Joined => {
                    tracing::info!(%conn_id, %game_id, %player_id, "player authenticated")
                }
                JoinKind::Reconnected => {
                    tracing::info!(%conn_id, %game_id, %player_id, "player reconnected")
                }
            }
            *bound = Some(Authenticated { handle, player_id });
            Ok(())
        }
        Err(e) => {
            tracing::error!(%conn_id, %game_id, %player_id, error = %e, "join failed");
            reply(conn, state, &ServerMessage::error(e.to_string())).await
        }
    }
}

/// Forwards a game message to the bound session.
///
/// A game message before `AUTH` has nowhere to go and closes the
/// connection.
async fn route_game_message<S, B, A>(
    conn: &WebSocketConnection,
    state: &ServerState<S, B, A>,
    bound: Option<&Authenticated>,
    msg: ClientMessage,
) -> Result<Flow, BingoError>
where
    S: StateStore,
    B: CommandBus,
    A: Authenticator,
{
    let Some(Authenticated { handle, player_id }) = bound else {
        tracing::info!(conn_id = %conn.id(), "game message before AUTH, closing");
        reply(conn, state, &ServerMessage::error("not authenticated")).await?;
        return Ok(Flow::Close);
    };

    match handle.handle_message(player_id.clone(), conn.id(), msg).await {
        Ok(()) => {}
        Err(GameError::NotInGame(..)) => {
            reply(conn, state, &ServerMessage::error("not in game")).await?;
        }
        Err(GameError::StaleConnection(..)) => {
            tracing::info!(
                game_id = %handle.game_id(),
                %player_id,
                conn_id = %conn.id(),
                "game message from replaced connection"
            );
            reply(conn, state, &ServerMessage::error("connection replaced")).await?;
        }
        Err(e) => {
            tracing::error!(
                game_id = %handle.game_id(),
                %player_id,
                error = %e,
                "game message failed"
            );
            reply(conn, state, &ServerMessage::error(e.to_string())).await?;
        }
    }
    Ok(Flow::Continue)
}

/// Writes a local reply straight to the socket.
async fn reply<S, B, A>(
    conn: &WebSocketConnection,
    state: &ServerState<S, B, A>,
    msg: &ServerMessage,
) -> Result<(), BingoError> {
    let text = state.codec.encode(msg)?;
    conn.send_text(&text).await?;
    Ok(())
}

/// Drains session messages for one connection onto its socket.
///
/// Ends when every sender is gone or the socket stops accepting writes.
async fn write_outbound(
    conn: Arc<WebSocketConnection>,
    mut queue: mpsc::UnboundedReceiver<ServerMessage>,
    codec: impl Codec,
) {
    let conn_id = conn.id();
    while let Some(msg) = queue.recv().await {
        let text = match codec.encode(&msg) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(%conn_id, error = %e, "failed to encode outbound message");
                continue;
            }
        };
        if let Err(e) = conn.send_text(&text).await {
            tracing::debug!(%conn_id, error = %e, "outbound write failed, stopping writer");
            break;
        }
    }
}

