// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the relay.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

/// Build the axum `Router` with all relay routes.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        // Introspection
        .route("/api/v1/health", get(http::health))
        .route("/api/v1/users", get(http::users))
        // Chat socket
        .route("/ws", get(ws::ws_handler))
        .fallback(http::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
