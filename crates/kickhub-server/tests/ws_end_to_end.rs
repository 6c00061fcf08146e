//! End-to-end tests using a real WebSocket client.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use kickhub_server::{start, ServerConfig, ServerHandle};

const TIMEOUT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(300);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn boot_server() -> ServerHandle {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..Default::default()
    };
    start(config).await.unwrap()
}

/// Connect and consume `pusher:connection_established`, returning its decoded data.
async fn connect(handle: &ServerHandle, session: Option<&str>) -> (WsStream, Value) {
    let url = match session {
        Some(s) => format!("ws://127.0.0.1:{}/ws?session={s}", handle.port),
        None => format!("ws://127.0.0.1:{}/ws", handle.port),
    };
    let (mut ws, _) = connect_async(url).await.unwrap();
    let welcome = read_json(&mut ws).await;
    assert_eq!(welcome["event"], "pusher:connection_established");
    assert_eq!(welcome["channel"], "");
    let data = decode_data(&welcome);
    (ws, data)
}

/// Read the next text message as JSON.
async fn read_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Nothing but control frames arrives within `QUIET`.
async fn assert_quiet(ws: &mut WsStream) {
    let deadline = tokio::time::Instant::now() + QUIET;
    loop {
        match tokio::time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {}", text.as_str()),
            Ok(Some(Ok(_))) => {}
            Ok(other) => panic!("connection ended: {other:?}"),
        }
    }
}

fn decode_data(envelope: &Value) -> Value {
    let data = envelope["data"].as_str().expect("data is a JSON string");
    serde_json::from_str(data).unwrap()
}

async fn send(ws: &mut WsStream, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

async fn subscribe(ws: &mut WsStream, channel: &str) {
    send(ws, json!({"event": "pusher:subscribe", "data": {"channel": channel}})).await;
    let ack = read_json(ws).await;
    assert_eq!(ack["event"], "pusher_internal:subscription_succeeded");
    assert_eq!(ack["channel"], channel);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_connection_established_carries_ids() {
    let handle = boot_server().await;
    let (_ws, data) = connect(&handle, Some("abc123")).await;

    assert_eq!(data["session_id"], "abc123");
    assert_eq!(data["activity_timeout"], 120);
    assert!(data["socket_id"].as_str().unwrap().starts_with("conn_"));

    let (_ws2, generated) = connect(&handle, None).await;
    assert!(!generated["session_id"].as_str().unwrap().is_empty());
    assert_ne!(generated["session_id"], "abc123");

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_raid_trigger_delivers_exactly_one_envelope() {
    let handle = boot_server().await;
    let (mut ws, _) = connect(&handle, Some("s1")).await;
    subscribe(&mut ws, "chatroom.1").await;

    send(&mut ws, json!({"event": "trigger_event", "data": {"type": "raid"}})).await;

    let raid = read_json(&mut ws).await;
    assert_eq!(raid["event"], "App\\Events\\StreamHostedEvent");
    assert_eq!(raid["channel"], "chatroom.1");
    let data = decode_data(&raid);
    let viewers = data["message"]["numberOfViewers"].as_u64().unwrap();
    assert!((1..=1000).contains(&viewers));
    assert!(data["user"]["username"].as_str().unwrap().starts_with("host"));

    assert_quiet(&mut ws).await;
    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_trigger_stays_inside_session() {
    let handle = boot_server().await;
    let (mut a, _) = connect(&handle, Some("a")).await;
    let (mut b, _) = connect(&handle, Some("b")).await;
    subscribe(&mut a, "chatroom.1").await;
    subscribe(&mut b, "chatroom.1").await;

    send(&mut a, json!({"event": "trigger_event", "data": {"type": "chat"}})).await;

    let chat = read_json(&mut a).await;
    assert_eq!(chat["event"], "App\\Events\\ChatMessageEvent");
    assert_quiet(&mut b).await;

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_malformed_frame_keeps_connection_open() {
    let handle = boot_server().await;
    let (mut ws, _) = connect(&handle, Some("s1")).await;

    ws.send(Message::text("{not json")).await.unwrap();
    send(&mut ws, json!({"event": "pusher:subscribe", "data": {}})).await;
    send(&mut ws, json!({"event": "pusher:ping", "data": {}})).await;

    let pong = read_json(&mut ws).await;
    assert_eq!(pong["event"], "pusher:pong");
    assert_eq!(handle.hub.connection_count(), 1);

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_chat_emitter_streams_until_toggled_off() {
    let handle = boot_server().await;
    let (mut ws, _) = connect(&handle, Some("s1")).await;
    subscribe(&mut ws, "chatroom.1").await;

    send(&mut ws, json!({"event": "set_message_rate", "data": {"rate": 20}})).await;
    send(&mut ws, json!({"event": "toggle_chat_interval", "data": {}})).await;
    for _ in 0..3 {
        let chat = read_json(&mut ws).await;
        assert_eq!(chat["event"], "App\\Events\\ChatMessageEvent");
    }

    send(&mut ws, json!({"event": "toggle_chat_interval", "data": {}})).await;
    // Drain anything already in flight, then expect silence.
    let drain_until = tokio::time::Instant::now() + Duration::from_millis(150);
    while let Ok(Some(Ok(_))) = tokio::time::timeout_at(drain_until, ws.next()).await {}
    assert_quiet(&mut ws).await;

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_health_tracks_disconnects() {
    let handle = boot_server().await;
    let health_url = format!("http://127.0.0.1:{}/health", handle.port);

    let (mut ws, _) = connect(&handle, Some("s1")).await;
    let body: Value = reqwest::get(&health_url).await.unwrap().json().await.unwrap();
    assert_eq!(body["connections"], 1);
    assert_eq!(body["sessions"], 1);

    ws.close(None).await.unwrap();
    // Teardown runs on the server after the close frame arrives.
    let mut remaining = 1;
    for _ in 0..50 {
        remaining = handle.hub.connection_count();
        if remaining == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(remaining, 0);
    assert_eq!(handle.hub.session_count(), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_pusher_app_path_connects() {
    let handle = boot_server().await;
    let url = format!("ws://127.0.0.1:{}/app/demo?session=s9", handle.port);
    let (mut ws, _) = connect_async(url).await.unwrap();

    let welcome = read_json(&mut ws).await;
    assert_eq!(welcome["event"], "pusher:connection_established");
    assert_eq!(decode_data(&welcome)["session_id"], "s9");
    subscribe(&mut ws, "channel.1").await;

    handle.shutdown().await;
}

#[tokio::test]
async fn e2e_shutdown_closes_clients() {
    let handle = boot_server().await;
    let (mut ws, _) = connect(&handle, Some("s1")).await;

    handle.shutdown().await;

    let next = timeout(TIMEOUT, ws.next()).await.expect("timeout waiting for close");
    assert!(matches!(next, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
}
