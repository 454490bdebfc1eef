// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chatrelay: real-time chat relay over WebSocket.
//!
//! Clients claim a unique display name, exchange broadcast messages, and see a
//! consistent roster of who is in the chat.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod state;
pub mod test_support;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::RelayConfig;
use crate::state::RelayState;
use crate::transport::build_router;

/// Run the relay until SIGINT or SIGTERM.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let state = Arc::new(RelayState::new(config, shutdown));
    let listener = TcpListener::bind(&addr).await?;
    info!("chatrelay listening on {}", listener.local_addr()?);
    serve(listener, state).await
}

/// Serve relay routes on an already-bound listener until `state.shutdown`
/// is cancelled.
pub async fn serve(listener: TcpListener, state: Arc<RelayState>) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;
    info!("chatrelay stopped");
    Ok(())
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = recv_or_pending(sigterm.as_mut()) => info!("received SIGTERM"),
            _ = recv_or_pending(sigint.as_mut()) => info!("received SIGINT"),
        }
        shutdown.cancel();
    });
}

/// Wait on a signal stream, or forever if it could not be installed.
async fn recv_or_pending(signal: Option<&mut tokio::signal::unix::Signal>) {
    match signal {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
