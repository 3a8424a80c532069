use std::time::Duration;

use crate::fixtures::test_app::TestApp;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(app: &TestApp, token: &str) -> Socket {
    let (mut ws, _) =
        tokio_test::assert_ok!(tokio_tungstenite::connect_async(app.ws_url(token)).await);
    let hello = next_frame(&mut ws).await;
    assert_eq!(hello["type"], "connected");
    ws
}

async fn next_frame(ws: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timeout waiting for WS frame")
            .unwrap()
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send_frame(ws: &mut Socket, frame: Value) {
    ws.send(Message::text(frame.to_string())).await.unwrap();
}

#[tokio::test]
async fn connect_and_ping() {
    let app = TestApp::spawn().await;
    let user = app
        .register_user("ws@edificio.test", "Ws", "resident", "1A")
        .await;

    let mut ws = connect(&app, &user.access_token).await;
    send_frame(&mut ws, serde_json::json!({ "type": "ping" })).await;
    assert_eq!(next_frame(&mut ws).await["type"], "pong");

    send_frame(&mut ws, serde_json::json!({ "type": "shout" })).await;
    assert_eq!(next_frame(&mut ws).await["type"], "error");
}

#[tokio::test]
async fn bad_token_is_rejected_before_upgrade() {
    let app = TestApp::spawn().await;
    let result = tokio_tungstenite::connect_async(app.ws_url("not-a-token")).await;
    tokio_test::assert_err!(result);
}

#[tokio::test]
async fn chat_subscription_streams_full_snapshots() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let chat_id = app
        .open_chat(&b.resident_a.access_token, &b.resident_b.id)
        .await;
    let topic = serde_json::json!({ "kind": "chat", "id": chat_id });

    let mut ws = connect(&app, &b.resident_b.access_token).await;
    send_frame(&mut ws, serde_json::json!({ "type": "subscribe", "topic": topic })).await;

    let initial = next_frame(&mut ws).await;
    assert_eq!(initial["type"], "snapshot");
    assert_eq!(initial["topic"], topic);
    assert_eq!(initial["data"].as_array().unwrap().len(), 0);

    app.send_chat_message(&b.resident_a.access_token, &chat_id, "hola")
        .await;
    let update = next_frame(&mut ws).await;
    assert_eq!(update["type"], "snapshot");
    let data = update["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["text"], "hola");

    app.send_chat_message(&b.resident_b.access_token, &chat_id, "que tal")
        .await;
    let update = next_frame(&mut ws).await;
    let texts: Vec<&str> = update["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["hola", "que tal"]);

    // After unsubscribing no more snapshots arrive
    send_frame(&mut ws, serde_json::json!({ "type": "unsubscribe", "topic": topic })).await;
    send_frame(&mut ws, serde_json::json!({ "type": "ping" })).await;
    assert_eq!(next_frame(&mut ws).await["type"], "pong");

    app.send_chat_message(&b.resident_a.access_token, &chat_id, "sigues ahi?")
        .await;
    let quiet = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    assert!(quiet.is_err(), "No snapshot expected after unsubscribe");
}

#[tokio::test]
async fn outsiders_cannot_follow_a_chat() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let chat_id = app
        .open_chat(&b.resident_a.access_token, &b.resident_b.id)
        .await;

    let mut ws = connect(&app, &b.concierge.access_token).await;
    send_frame(
        &mut ws,
        serde_json::json!({ "type": "subscribe", "topic": { "kind": "chat", "id": chat_id } }),
    )
    .await;
    assert_eq!(next_frame(&mut ws).await["type"], "error");

    send_frame(
        &mut ws,
        serde_json::json!({ "type": "subscribe", "topic": { "kind": "chat", "id": "undefined_x" } }),
    )
    .await;
    assert_eq!(next_frame(&mut ws).await["type"], "error");
}

#[tokio::test]
async fn chat_with_unknown_peer_cannot_be_followed() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let mut ids = [b.resident_a.id.clone(), "000000000000000000000000".to_string()];
    ids.sort();
    let topic = serde_json::json!({ "kind": "chat", "id": format!("{}_{}", ids[0], ids[1]) });

    let mut ws = connect(&app, &b.resident_a.access_token).await;
    send_frame(&mut ws, serde_json::json!({ "type": "subscribe", "topic": topic })).await;
    let frame = next_frame(&mut ws).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["topic"], topic);
}

#[tokio::test]
async fn building_logs_are_concierge_only() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let mut resident_ws = connect(&app, &b.resident_a.access_token).await;
    for kind in ["visitor_log", "package_log"] {
        send_frame(
            &mut resident_ws,
            serde_json::json!({ "type": "subscribe", "topic": { "kind": kind } }),
        )
        .await;
        let frame = next_frame(&mut resident_ws).await;
        assert_eq!(frame["type"], "error");
        assert_eq!(frame["topic"]["kind"], kind);
    }

    let mut concierge_ws = connect(&app, &b.concierge.access_token).await;
    send_frame(
        &mut concierge_ws,
        serde_json::json!({ "type": "subscribe", "topic": { "kind": "visitor_log" } }),
    )
    .await;
    let initial = next_frame(&mut concierge_ws).await;
    assert_eq!(initial["type"], "snapshot");
    assert!(initial["data"].as_array().unwrap().is_empty());

    let resp = app
        .auth_post("/api/visitor", &b.concierge.access_token)
        .json(&serde_json::json!({ "visitor_name": "Pedro Visita", "visiting_apartment": "4B" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let update = next_frame(&mut concierge_ws).await;
    assert_eq!(update["data"][0]["visitor_name"], "Pedro Visita");
    assert_eq!(update["data"][0]["inside"], true);
}

#[tokio::test]
async fn bulletin_subscription_sees_new_posts() {
    let app = TestApp::spawn().await;
    let b = app.seed_building().await;

    let mut ws = connect(&app, &b.resident_b.access_token).await;
    send_frame(
        &mut ws,
        serde_json::json!({ "type": "subscribe", "topic": { "kind": "bulletin" } }),
    )
    .await;
    assert_eq!(next_frame(&mut ws).await["type"], "snapshot");

    let resp = app
        .auth_post("/api/bulletin", &b.resident_a.access_token)
        .json(&serde_json::json!({ "title": "Reunion de vecinos", "description": "Sabado" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let update = next_frame(&mut ws).await;
    assert_eq!(update["data"][0]["title"], "Reunion de vecinos");
}
