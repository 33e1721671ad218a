//! Integration tests for the bingo server, gateway, and full connection flow.

use std::sync::Arc;
use std::time::Duration;

use bingo::health::DEFAULT_MAX_DELAY;
use bingo::prelude::*;
use bingo::check_health;
use bingo_bus::publish_command;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    addr: String,
    registry: Arc<SessionRegistry<MemoryStore, LocalBus>>,
    store: Arc<MemoryStore>,
    bus: Arc<LocalBus>,
}

/// Starts a server on a random port with `config` (bind address ignored).
async fn start_server(mut config: ServerConfig) -> TestServer {
    config.bind_addr = "127.0.0.1:0".into();
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(LocalBus::new());

    let server = BingoServerBuilder::new()
        .config(config)
        .build(Arc::clone(&store), Arc::clone(&bus), TrustClaims)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let registry = Arc::clone(server.registry());

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop and the bus listener a moment to start.
    tokio::time::sleep(Duration::from_millis(20)).await;
    TestServer {
        addr,
        registry,
        store,
        bus,
    }
}

fn game_config() -> GameConfig {
    GameConfig {
        title: "Speedrun".into(),
        tiles: (0..24).map(|i| TileConfig::new(format!("split {i}"))).collect(),
        heatmap_threshold: 50,
        announce_in_chat: false,
    }
}

async fn started_game(server: &TestServer) -> GameId {
    let game_id = GameId::new();
    server.registry.start(game_id, game_config()).await.unwrap();
    game_id
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

async fn auth(ws: &mut ClientWs, game_id: GameId, user_id: &str) {
    send_json(
        ws,
        json!({
            "type": "AUTH",
            "payload": {"gameId": game_id.to_string(), "userId": user_id, "username": user_id}
        }),
    )
    .await;
}

/// Next JSON text frame, or `None` once the server closed the connection.
async fn recv_json(ws: &mut ClientWs) -> Option<Value> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for a frame")?;
        match frame {
            Ok(Message::Text(text)) => {
                return Some(serde_json::from_str(text.as_str()).expect("frame should be JSON"));
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Skips frames until one of type `kind` arrives.
async fn recv_until(ws: &mut ClientWs, kind: &str) -> Value {
    loop {
        let msg = recv_json(ws)
            .await
            .unwrap_or_else(|| panic!("connection closed before {kind}"));
        if msg["type"] == kind {
            return msg;
        }
    }
}

fn row_texts(state: &Value, row: usize) -> Vec<String> {
    state["payload"]["board"][row]
        .as_array()
        .expect("row should be an array")
        .iter()
        .map(|square| square["text"].as_str().unwrap().to_string())
        .collect()
}

// =========================================================================
// Authentication
// =========================================================================

#[tokio::test]
async fn test_auth_started_game_receives_game_state() {
    let server = start_server(ServerConfig::default()).await;
    let game_id = started_game(&server).await;
    let mut ws = connect(&server.addr).await;

    auth(&mut ws, game_id, "viewer1").await;

    let joined = recv_until(&mut ws, "ACTIVITY_EVENT").await;
    assert_eq!(joined["payload"]["eventType"], "join");
    assert_eq!(joined["payload"]["username"], "viewer1");

    let state = recv_until(&mut ws, "GAME_STATE").await;
    assert_eq!(state["payload"]["title"], "Speedrun");
    assert_eq!(state["payload"]["heatmapThreshold"], 50);
    assert_eq!(state["payload"]["board"][2][2]["text"], "FREE SPACE");
    assert_eq!(state["payload"]["board"][2][2]["selected"], true);
    assert_eq!(state["payload"]["heatmap"]["2-2"], 100.0);
}

#[tokio::test]
async fn test_auth_unknown_game_errors_then_retry_succeeds() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = connect(&server.addr).await;
    let game_id = GameId::new();

    auth(&mut ws, game_id, "early").await;
    let err = recv_json(&mut ws).await.unwrap();
    assert_eq!(err["type"], "SERVER_ERROR");
    assert_eq!(err["payload"]["message"], "game not found");

    server.registry.start(game_id, game_config()).await.unwrap();
    auth(&mut ws, game_id, "early").await;
    recv_until(&mut ws, "GAME_STATE").await;
}

#[tokio::test]
async fn test_auth_blank_username_is_rejected() {
    let server = start_server(ServerConfig::default()).await;
    let game_id = started_game(&server).await;
    let mut ws = connect(&server.addr).await;

    send_json(
        &mut ws,
        json!({
            "type": "AUTH",
            "payload": {"gameId": game_id.to_string(), "userId": "u1", "username": "  "}
        }),
    )
    .await;

    let err = recv_json(&mut ws).await.unwrap();
    assert_eq!(err["type"], "SERVER_ERROR");
    assert_eq!(server.registry.session_count().await, 0);
}

#[tokio::test]
async fn test_auth_twice_on_one_connection_is_rejected() {
    let server = start_server(ServerConfig::default()).await;
    let game_id = started_game(&server).await;
    let mut ws = connect(&server.addr).await;

    auth(&mut ws, game_id, "viewer1").await;
    recv_until(&mut ws, "GAME_STATE").await;

    auth(&mut ws, game_id, "viewer2").await;
    let err = recv_until(&mut ws, "SERVER_ERROR").await;
    assert_eq!(err["payload"]["message"], "already authenticated");
}

#[tokio::test]
async fn test_game_message_before_auth_closes_connection() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    send_json(&mut ws, json!({"type": "CLAIM_BINGO"})).await;

    let err = recv_json(&mut ws).await.unwrap();
    assert_eq!(err["type"], "SERVER_ERROR");
    assert_eq!(err["payload"]["message"], "not authenticated");
    assert!(recv_json(&mut ws).await.is_none());
}

// =========================================================================
// Protocol errors and liveness
// =========================================================================

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let server = start_server(ServerConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    let err = recv_json(&mut ws).await.unwrap();
    assert_eq!(err["type"], "SERVER_ERROR");

    send_json(&mut ws, json!({"type": "SELECT_SQUARE"})).await;
    let err = recv_json(&mut ws).await.unwrap();
    assert_eq!(err["type"], "SERVER_ERROR");

    send_json(&mut ws, json!({"type": "PING"})).await;
    let pong = recv_json(&mut ws).await.unwrap();
    assert_eq!(pong, json!({"type": "PONG"}));
}

#[tokio::test]
async fn test_heartbeat_terminates_silent_client() {
    let server = start_server(ServerConfig {
        heartbeat_interval: Duration::from_millis(100),
        ..ServerConfig::default()
    })
    .await;
    let mut ws = connect(&server.addr).await;

    let ping = recv_json(&mut ws).await.unwrap();
    assert_eq!(ping, json!({"type": "PING"}));
    // No PONG: the next tick closes the connection.
    assert!(recv_json(&mut ws).await.is_none());
}

#[tokio::test]
async fn test_heartbeat_pong_keeps_client_connected() {
    let server = start_server(ServerConfig {
        heartbeat_interval: Duration::from_millis(100),
        ..ServerConfig::default()
    })
    .await;
    let mut ws = connect(&server.addr).await;

    for _ in 0..4 {
        let ping = recv_json(&mut ws).await.unwrap();
        assert_eq!(ping["type"], "PING");
        send_json(&mut ws, json!({"type": "PONG"})).await;
    }

    send_json(&mut ws, json!({"type": "PING"})).await;
    recv_until(&mut ws, "PONG").await;
}

// =========================================================================
// Gameplay
// =========================================================================

#[tokio::test]
async fn test_select_and_claim_line_sends_cooldown() {
    let server = start_server(ServerConfig::default()).await;
    let game_id = started_game(&server).await;
    let mut ws = connect(&server.addr).await;

    auth(&mut ws, game_id, "solo").await;
    let state = recv_until(&mut ws, "GAME_STATE").await;

    let line = row_texts(&state, 0);
    for text in &line {
        send_json(
            &mut ws,
            json!({"type": "SELECT_SQUARE", "payload": {"squareText": text}}),
        )
        .await;
    }
    let mut state = state;
    for _ in &line {
        state = recv_until(&mut ws, "GAME_STATE").await;
    }
    for column in 0..5 {
        assert_eq!(state["payload"]["board"][0][column]["selected"], true);
        assert_eq!(state["payload"]["heatmap"][format!("0-{column}")], 100.0);
    }

    send_json(&mut ws, json!({"type": "CLAIM_BINGO"})).await;
    let bingo = recv_until(&mut ws, "ACTIVITY_EVENT").await;
    assert_eq!(bingo["payload"]["eventType"], "bingo");
    let cooldown = recv_until(&mut ws, "BINGO_COOLDOWN").await;
    assert_eq!(cooldown["payload"]["cooldownSeconds"], 60);
}

#[tokio::test]
async fn test_game_message_from_replaced_socket_is_refused() {
    let server = start_server(ServerConfig::default()).await;
    let game_id = started_game(&server).await;

    let mut old = connect(&server.addr).await;
    auth(&mut old, game_id, "twotabs").await;
    let state = recv_until(&mut old, "GAME_STATE").await;
    let text = row_texts(&state, 1)[0].clone();

    let mut new = connect(&server.addr).await;
    auth(&mut new, game_id, "twotabs").await;
    recv_until(&mut new, "GAME_STATE").await;

    send_json(
        &mut old,
        json!({"type": "SELECT_SQUARE", "payload": {"squareText": text}}),
    )
    .await;
    let err = recv_until(&mut old, "SERVER_ERROR").await;
    assert_eq!(err["payload"]["message"], "connection replaced");

    let stored = server.registry.repository().state(game_id).await.unwrap();
    let player = stored.player(&PlayerId::new("twotabs")).unwrap();
    assert!(!player.has_selected(&text));
}

#[tokio::test]
async fn test_close_then_reconnect_keeps_board() {
    let mut config = ServerConfig::default();
    config.session.disconnect_grace = Duration::from_secs(5);
    let server = start_server(config).await;
    let game_id = started_game(&server).await;

    let mut first = connect(&server.addr).await;
    auth(&mut first, game_id, "returning").await;
    let before = recv_until(&mut first, "GAME_STATE").await;
    first.close(None).await.unwrap();
    drop(first);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut second = connect(&server.addr).await;
    auth(&mut second, game_id, "returning").await;
    let event = recv_until(&mut second, "ACTIVITY_EVENT").await;
    assert_eq!(event["payload"]["eventType"], "reconnected");
    let after = recv_until(&mut second, "GAME_STATE").await;
    assert_eq!(after["payload"]["board"], before["payload"]["board"]);
}

#[tokio::test]
async fn test_last_player_leaving_ends_game_after_grace() {
    let mut config = ServerConfig::default();
    config.session.disconnect_grace = Duration::from_millis(200);
    let server = start_server(config).await;
    let game_id = started_game(&server).await;

    let mut ws = connect(&server.addr).await;
    auth(&mut ws, game_id, "leaver").await;
    recv_until(&mut ws, "GAME_STATE").await;
    ws.close(None).await.unwrap();
    drop(ws);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while server.registry.session_count().await > 0 {
        assert!(tokio::time::Instant::now() < deadline, "game was not ended");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(server.registry.repository().config(game_id).await.unwrap().is_none());
}

// =========================================================================
// Bus and health
// =========================================================================

#[tokio::test]
async fn test_end_game_command_sends_game_ended() {
    let server = start_server(ServerConfig::default()).await;
    let game_id = GameId::new();
    publish_command(
        server.bus.as_ref(),
        &GameCommand::StartGame {
            game_id,
            game_config: game_config(),
        },
    )
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut ws = connect(&server.addr).await;
    auth(&mut ws, game_id, "watcher").await;
    recv_until(&mut ws, "GAME_STATE").await;

    publish_command(server.bus.as_ref(), &GameCommand::EndGame { game_id })
        .await
        .unwrap();

    let ended = recv_until(&mut ws, "GAME_ENDED").await;
    assert_eq!(ended, json!({"type": "GAME_ENDED"}));
}

#[tokio::test]
async fn test_run_writes_service_health() {
    let server = start_server(ServerConfig {
        service_name: "bingo-test".into(),
        ..ServerConfig::default()
    })
    .await;

    let status = check_health(server.store.as_ref(), "bingo-test", DEFAULT_MAX_DELAY)
        .await
        .unwrap();
    assert!(status.is_healthy());
}
