// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for relay introspection.

use std::sync::Arc;

use axum::extract::{OriginalUri, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::state::RelayState;

/// JSON error envelope: `{"error": {"code": "NOT_FOUND", "message": ...}}`.
///
/// The code is the status's canonical reason in upper snake case.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let code = status.canonical_reason().unwrap_or("Error").to_ascii_uppercase().replace(' ', "_");
    let body = json!({ "error": { "code": code, "message": message.into() } });
    (status, Json(body)).into_response()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Open sockets, joined or not.
    pub connections: usize,
    pub joined: usize,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<String>,
}

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running",
        connections: s.registry.len(),
        joined: s.registry.joined_count(),
    })
}

/// `GET /api/v1/users` — current roster, sorted for display.
pub async fn users(State(s): State<Arc<RelayState>>) -> impl IntoResponse {
    let mut users = s.registry.roster();
    users.sort();
    Json(UsersResponse { users })
}

/// Fallback for unknown routes.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("no route for {}", uri.path()))
}
