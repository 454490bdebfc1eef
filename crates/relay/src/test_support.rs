// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: builders, fake connections, and helpers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::protocol::{Outbound, ServerMessage};
use crate::registry::Outbox;
use crate::session::Session;
use crate::state::RelayState;

/// Builder for constructing `RelayState` in tests with sensible defaults.
pub struct RelayStateBuilder {
    config: RelayConfig,
    shutdown: CancellationToken,
}

impl Default for RelayStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayStateBuilder {
    pub fn new() -> Self {
        Self {
            config: RelayConfig { port: 0, ..RelayConfig::default() },
            shutdown: CancellationToken::new(),
        }
    }

    pub fn uppercase_usernames(mut self, on: bool) -> Self {
        self.config.uppercase_usernames = on;
        self
    }

    pub fn max_message_bytes(mut self, n: usize) -> Self {
        self.config.max_message_bytes = n;
        self
    }

    pub fn outbound_queue(mut self, n: usize) -> Self {
        self.config.outbound_queue = n;
        self
    }

    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn build(self) -> Arc<RelayState> {
        Arc::new(RelayState::new(self.config, self.shutdown))
    }
}

/// An in-memory connection: a session plus the receiving end of its
/// outbound queue, standing in for the socket writer.
pub struct FakeClient {
    pub session: Session,
    pub rx: mpsc::Receiver<Outbound>,
}

impl FakeClient {
    /// Open a session and consume its `connectResp` greeting.
    pub fn connect(state: &RelayState) -> anyhow::Result<Self> {
        let (queue, mut rx) = outbox(state.config.outbound_queue);
        let session = Session::open(state, queue);
        match drain(&mut rx)?.as_slice() {
            [ServerMessage::ConnectResp { .. }] => Ok(Self { session, rx }),
            other => anyhow::bail!("expected connectResp greeting, got {other:?}"),
        }
    }

    /// Send a raw JSON frame through the session.
    pub fn send(&self, value: serde_json::Value) {
        self.session.handle_text(&value.to_string());
    }

    /// All messages queued for this client since the last call.
    pub fn received(&mut self) -> anyhow::Result<Vec<ServerMessage>> {
        drain(&mut self.rx)
    }
}

/// A fresh outbox and the receiver its writer task would own.
pub fn outbox(capacity: usize) -> (Outbox, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Outbox::new(tx), rx)
}

/// Drain every text frame currently queued, decoding each as a server
/// message. Close requests are skipped.
pub fn drain(rx: &mut mpsc::Receiver<Outbound>) -> anyhow::Result<Vec<ServerMessage>> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let Outbound::Text(text) = frame {
            out.push(serde_json::from_str(text.as_str())?);
        }
    }
    Ok(out)
}

/// Convert any `Result<T, E: Display>` into `anyhow::Result<T>`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

/// Spawn an HTTP + WebSocket server on a random port for integration testing.
///
/// Returns the bound address and a join handle for the server task.
pub async fn spawn_http_server(
    state: Arc<RelayState>,
) -> anyhow::Result<(std::net::SocketAddr, tokio::task::JoinHandle<()>)> {
    let router = crate::transport::build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok((addr, handle))
}
