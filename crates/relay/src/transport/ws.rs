// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket upgrade and the per-connection read loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::protocol::Outbound;
use crate::registry::Outbox;
use crate::session::Session;
use crate::state::RelayState;
use crate::transport::http::error_response;

/// How long the writer gets to flush queued frames and the close frame once
/// the read loop has ended.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// `GET /ws` — WebSocket upgrade for a chat client.
pub async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::debug!(err = %rejection.body_text(), "rejected websocket upgrade");
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let max = state.config.max_message_bytes;
    ws.max_message_size(max)
        .max_frame_size(max)
        .on_upgrade(move |socket| handle_connection(state, socket))
}

/// Drive one accepted connection from registration to cleanup.
///
/// A writer task owns the socket sink and drains the connection's bounded
/// outbound queue; this task reads inbound frames in order and hands them to
/// the session. The loop ends on client close, receive error, eviction of a
/// client that stopped reading, or server shutdown. Cleanup runs in every case.
pub async fn handle_connection(state: Arc<RelayState>, socket: WebSocket) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (tx, rx) = mpsc::channel::<Outbound>(state.config.outbound_queue);
    let mut writer = tokio::spawn(writer_task(ws_tx, rx));

    let outbox = Outbox::new(tx);
    let session = Session::open(&state, outbox.clone());
    let conn_id = session.id();
    tracing::info!(conn_id = %conn_id, "socket connected");

    let code = loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                tracing::debug!(conn_id = %conn_id, "closing socket for shutdown");
                break close_code::AWAY;
            }
            _ = outbox.evicted() => {
                tracing::warn!(conn_id = %conn_id, "client stopped reading, closing socket");
                break close_code::POLICY;
            }
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()),
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(conn_id = %conn_id, len = data.len(), "ignoring binary frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(conn_id = %conn_id, reason = ?frame, "client initiated close");
                    break close_code::NORMAL;
                }
                // Pings are answered by the protocol layer.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(conn_id = %conn_id, err = %e, "websocket receive error");
                    break close_code::ERROR;
                }
                None => break close_code::NORMAL,
            }
        }
    };

    session.close();
    tracing::info!(conn_id = %conn_id, "socket disconnected");

    // A full queue cannot take the close frame; the drain timeout covers it.
    outbox.request_close(code);
    drop(outbox);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(conn_id = %conn_id, "writer did not drain in time");
        writer.abort();
    }
}

/// Forward queued frames to the socket until a close is requested or the
/// socket fails. Dropping the receiver marks the connection as not live.
async fn writer_task(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Outbound>,
) {
    while let Some(frame) = rx.recv().await {
        match frame {
            Outbound::Text(text) => {
                if ws_tx.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Outbound::Close(code) => {
                let frame = CloseFrame { code, reason: Default::default() };
                let _ = ws_tx.send(Message::Close(Some(frame))).await;
                break;
            }
        }
    }
}
