// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire messages for the chat protocol.
//!
//! Frames are JSON text messages, internally tagged on `type`. Client and
//! server directions each get their own enum so the handler can match
//! exhaustively on what a client is allowed to send.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Status;

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join { username: String },
    #[serde(rename = "leave")]
    Leave {},
    #[serde(rename = "chat")]
    Chat { msg: String },
    #[serde(rename = "getUsers")]
    GetUsers {},
}

impl ClientMessage {
    /// Decode one inbound text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Message kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave {} => "leave",
            Self::Chat { .. } => "chat",
            Self::GetUsers {} => "getUsers",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connectResp")]
    ConnectResp { status: Status, id: u64 },
    #[serde(rename = "joinResp")]
    JoinResp { status: Status, username: String },
    #[serde(rename = "leaveResp")]
    LeaveResp { status: Status },
    #[serde(rename = "chatResp")]
    ChatResp { status: Status, msg: String },
    #[serde(rename = "getUsersResp")]
    GetUsersResp {
        status: Status,
        #[serde(rename = "userList")]
        user_list: Vec<String>,
    },
    #[serde(rename = "broadcast-join")]
    BroadcastJoin { username: String },
    #[serde(rename = "broadcast-leave")]
    BroadcastLeave { username: String },
    #[serde(rename = "broadcast-chat")]
    BroadcastChat { username: String, msg: String },
}

impl ServerMessage {
    /// Serialize into a text frame payload.
    pub fn encode(&self) -> Result<Utf8Bytes, serde_json::Error> {
        serde_json::to_string(self).map(Utf8Bytes::from)
    }
}

/// A frame queued for a connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    Text(Utf8Bytes),
    /// Ask the writer to send a close frame with this code and stop.
    Close(u16),
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
