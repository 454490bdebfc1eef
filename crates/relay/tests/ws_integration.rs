// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket integration tests using real connections against an in-process
//! axum server.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use chatrelay::test_support::{spawn_http_server, RelayStateBuilder};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsRx = futures_util::stream::SplitStream<WsStream>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Send a JSON message over the WebSocket.
async fn ws_send(stream: &mut WsTx, value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    stream.send(WsMessage::Text(text.into())).await.map_err(|e| anyhow::anyhow!("ws send: {e}"))?;
    Ok(())
}

/// Receive a JSON message from the WebSocket with timeout.
async fn ws_recv(stream: &mut WsRx) -> anyhow::Result<serde_json::Value> {
    let msg = tokio::time::timeout(RECV_TIMEOUT, stream.next())
        .await
        .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
        .ok_or_else(|| anyhow::anyhow!("ws stream closed"))?
        .map_err(|e| anyhow::anyhow!("ws recv: {e}"))?;

    match msg {
        WsMessage::Text(text) => Ok(serde_json::from_str(&text)?),
        other => anyhow::bail!("expected Text message, got {other:?}"),
    }
}

/// Connect and consume the `connectResp` greeting.
async fn ws_connect(addr: &std::net::SocketAddr) -> anyhow::Result<(WsTx, WsRx)> {
    let url = format!("ws://{addr}/ws");
    let (stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .map_err(|e| anyhow::anyhow!("ws connect: {e}"))?;
    let (tx, mut rx) = stream.split();

    let hello = ws_recv(&mut rx).await?;
    anyhow::ensure!(hello["type"] == "connectResp", "unexpected greeting: {hello}");
    anyhow::ensure!(hello["status"] == "OK", "unexpected greeting: {hello}");
    Ok((tx, rx))
}

/// Connect and join under `name`, returning once the join is acknowledged.
async fn ws_join(addr: &std::net::SocketAddr, name: &str) -> anyhow::Result<(WsTx, WsRx)> {
    let (mut tx, mut rx) = ws_connect(addr).await?;
    ws_send(&mut tx, &json!({"type": "join", "username": name})).await?;
    let resp = ws_recv(&mut rx).await?;
    anyhow::ensure!(resp["type"] == "joinResp" && resp["status"] == "OK", "join failed: {resp}");
    Ok((tx, rx))
}

#[tokio::test]
async fn connect_receives_distinct_ids() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let (stream, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .map_err(|e| anyhow::anyhow!("ws connect: {e}"))?;
        let (_tx, mut rx) = stream.split();
        let hello = ws_recv(&mut rx).await?;
        ids.push(hello["id"].as_u64());
    }
    assert!(ids.iter().all(Option::is_some), "ids: {ids:?}");
    assert_ne!(ids[0], ids[1]);
    Ok(())
}

#[tokio::test]
async fn chat_round_trip_between_two_clients() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let (mut alice_tx, mut alice_rx) = ws_join(&addr, "alice").await?;
    let (_bob_tx, mut bob_rx) = ws_join(&addr, "bob").await?;

    let joined = ws_recv(&mut alice_rx).await?;
    assert_eq!(joined["type"], "broadcast-join", "msg: {joined}");
    assert_eq!(joined["username"], "bob");

    ws_send(&mut alice_tx, &json!({"type": "chat", "msg": "hi bob"})).await?;

    let echo = ws_recv(&mut alice_rx).await?;
    assert_eq!(echo["type"], "chatResp", "msg: {echo}");
    assert_eq!(echo["status"], "OK");
    assert_eq!(echo["msg"], "hi bob");

    let relayed = ws_recv(&mut bob_rx).await?;
    assert_eq!(relayed["type"], "broadcast-chat", "msg: {relayed}");
    assert_eq!(relayed["username"], "alice");
    assert_eq!(relayed["msg"], "hi bob");
    Ok(())
}

#[tokio::test]
async fn roster_contains_both_names() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let (mut a_tx, mut a_rx) = ws_join(&addr, "A").await?;
    let (_b_tx, _b_rx) = ws_join(&addr, "B").await?;
    let _ = ws_recv(&mut a_rx).await?; // broadcast-join B

    ws_send(&mut a_tx, &json!({"type": "getUsers"})).await?;
    let resp = ws_recv(&mut a_rx).await?;
    assert_eq!(resp["type"], "getUsersResp", "msg: {resp}");
    let mut names: Vec<String> = serde_json::from_value(resp["userList"].clone())?;
    names.sort();
    assert_eq!(names, vec!["A".to_owned(), "B".to_owned()]);
    Ok(())
}

#[tokio::test]
async fn duplicate_name_over_socket_is_in_use() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let (_bob_tx, _bob_rx) = ws_join(&addr, "Bob").await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;
    ws_send(&mut tx, &json!({"type": "join", "username": "bob"})).await?;
    let resp = ws_recv(&mut rx).await?;
    assert_eq!(resp["type"], "joinResp");
    assert_eq!(resp["status"], "USERNAME_IN_USE");
    Ok(())
}

#[tokio::test]
async fn disconnect_broadcasts_leave_and_shrinks_roster() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(std::sync::Arc::clone(&state)).await?;

    let (mut alice_tx, mut alice_rx) = ws_join(&addr, "alice").await?;
    let (mut bob_tx, bob_rx) = ws_join(&addr, "bob").await?;
    let _ = ws_recv(&mut alice_rx).await?; // broadcast-join bob

    bob_tx.send(WsMessage::Close(None)).await.map_err(|e| anyhow::anyhow!("close: {e}"))?;
    drop(bob_tx);
    drop(bob_rx);

    let left = ws_recv(&mut alice_rx).await?;
    assert_eq!(left["type"], "broadcast-leave", "msg: {left}");
    assert_eq!(left["username"], "bob");

    // Deregistration follows the leave broadcast; wait for it to land.
    tokio::time::timeout(RECV_TIMEOUT, async {
        while state.registry.len() > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("bob was never deregistered"))?;

    ws_send(&mut alice_tx, &json!({"type": "getUsers"})).await?;
    let resp = ws_recv(&mut alice_rx).await?;
    assert_eq!(resp["userList"], json!(["alice"]), "msg: {resp}");
    Ok(())
}

#[tokio::test]
async fn malformed_frames_keep_connection_open() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let (mut tx, mut rx) = ws_connect(&addr).await?;
    let garbage = WsMessage::Text("{not json".to_owned().into());
    tx.send(garbage).await.map_err(|e| anyhow::anyhow!("{e}"))?;
    let binary = WsMessage::Binary(vec![1, 2, 3].into());
    tx.send(binary).await.map_err(|e| anyhow::anyhow!("{e}"))?;
    ws_send(&mut tx, &json!({"type": "sendFile"})).await?;

    ws_send(&mut tx, &json!({"type": "join", "username": "still"})).await?;
    let resp = ws_recv(&mut rx).await?;
    assert_eq!(resp["type"], "joinResp", "msg: {resp}");
    assert_eq!(resp["status"], "OK");
    Ok(())
}

#[tokio::test]
async fn concurrent_joins_over_sockets_admit_one() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().build();
    let (addr, _handle) = spawn_http_server(state).await?;

    let mut tasks = Vec::new();
    for i in 0..8 {
        tasks.push(tokio::spawn(async move {
            let (mut tx, mut rx) = ws_connect(&addr).await?;
            let name = if i % 2 == 0 { "racer" } else { "Racer" };
            ws_send(&mut tx, &json!({"type": "join", "username": name})).await?;
            let resp = ws_recv(&mut rx).await?;
            anyhow::ensure!(resp["type"] == "joinResp", "unexpected reply: {resp}");
            anyhow::Ok((resp["status"] == "OK", tx, rx))
        }));
    }

    let mut winners = 0;
    let mut keep_open = Vec::new();
    for task in tasks {
        let (won, tx, rx) = task.await??;
        if won {
            winners += 1;
        }
        keep_open.push((tx, rx));
    }
    assert_eq!(winners, 1);
    Ok(())
}

#[tokio::test]
async fn shutdown_closes_sockets() -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let state = RelayStateBuilder::new().shutdown(shutdown.clone()).build();
    let (addr, _handle) = spawn_http_server(std::sync::Arc::clone(&state)).await?;

    let (_tx, mut rx) = ws_join(&addr, "alice").await?;
    shutdown.cancel();

    let msg = tokio::time::timeout(RECV_TIMEOUT, rx.next())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for close"))?;
    match msg {
        Some(Ok(WsMessage::Close(Some(frame)))) => {
            assert_eq!(u16::from(frame.code), 1001);
        }
        other => anyhow::bail!("expected close frame, got {other:?}"),
    }
    assert!(state.registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_frame_drops_only_that_connection() -> anyhow::Result<()> {
    let state = RelayStateBuilder::new().max_message_bytes(256).build();
    let (addr, _handle) = spawn_http_server(std::sync::Arc::clone(&state)).await?;

    let (mut alice_tx, mut alice_rx) = ws_join(&addr, "alice").await?;
    let (mut bob_tx, _bob_rx) = ws_join(&addr, "bob").await?;
    let _ = ws_recv(&mut alice_rx).await?; // broadcast-join bob

    let huge = "x".repeat(1024);
    ws_send(&mut bob_tx, &json!({"type": "chat", "msg": huge})).await?;

    let left = ws_recv(&mut alice_rx).await?;
    assert_eq!(left["type"], "broadcast-leave", "msg: {left}");
    assert_eq!(left["username"], "bob");

    ws_send(&mut alice_tx, &json!({"type": "chat", "msg": "still here"})).await?;
    let echo = ws_recv(&mut alice_rx).await?;
    assert_eq!(echo["type"], "chatResp", "msg: {echo}");
    assert_eq!(echo["status"], "OK");
    Ok(())
}
