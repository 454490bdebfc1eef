// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection protocol state machine.
//!
//! A connection starts `Unjoined`, becomes `Joined` after a successful
//! `join`, and returns to `Unjoined` on `leave` (it may join again later).
//! Closing the channel from either state ends the session.

use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::error::Status;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{ConnectionId, ConnectionRegistry, Outbox};
use crate::state::RelayState;

/// Protocol handler bound to one registered connection.
pub struct Session {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Dispatcher,
    uppercase_usernames: bool,
}

impl Session {
    /// Register a freshly accepted connection and greet it with its id.
    pub fn open(state: &RelayState, outbox: Outbox) -> Self {
        let id = state.registry.register(outbox);
        let session = Self {
            id,
            registry: Arc::clone(&state.registry),
            dispatcher: state.dispatcher.clone(),
            uppercase_usernames: state.config.uppercase_usernames,
        };
        session.respond(ServerMessage::ConnectResp { status: Status::Ok, id: id.get() });
        session
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Decode and handle one inbound text frame. Frames that do not decode
    /// to a known message are dropped.
    pub fn handle_text(&self, text: &str) {
        match ClientMessage::decode(text) {
            Ok(msg) => self.handle(msg),
            Err(e) => {
                tracing::debug!(conn_id = %self.id, err = %e, "ignoring unrecognized message");
            }
        }
    }

    pub fn handle(&self, msg: ClientMessage) {
        tracing::trace!(conn_id = %self.id, kind = msg.kind(), "inbound message");
        match msg {
            ClientMessage::Join { username } => self.join(&username),
            ClientMessage::Leave {} => self.leave(),
            ClientMessage::Chat { msg } => self.chat(msg),
            ClientMessage::GetUsers {} => self.get_users(),
        }
    }

    /// End the session: announce departure if joined, then deregister.
    ///
    /// Peers always see the `broadcast-leave` before the name disappears from
    /// the roster.
    pub fn close(self) {
        if let Some(name) = self.depart() {
            tracing::info!(conn_id = %self.id, username = %name, "user disconnected");
        }
        self.registry.deregister(self.id);
        tracing::debug!(conn_id = %self.id, "connection deregistered");
    }

    fn join(&self, requested: &str) {
        let name = self.normalize(requested);
        let result = if self.joined_name().is_some() {
            Err(Status::AlreadyInChat)
        } else if !is_valid_username(&name) {
            Err(Status::UsernameInvalid)
        } else {
            self.registry.claim_name(self.id, &name)
        };

        match result {
            Ok(name) => {
                let announce = ServerMessage::BroadcastJoin { username: name.clone() };
                self.dispatcher.broadcast(self.id, &announce);
                tracing::info!(conn_id = %self.id, username = %name, "user joined");
                self.respond(ServerMessage::JoinResp { status: Status::Ok, username: name });
            }
            Err(status) => {
                tracing::debug!(conn_id = %self.id, requested, %status, "join rejected");
                let current = self.joined_name().unwrap_or_default();
                self.respond(ServerMessage::JoinResp { status, username: current });
            }
        }
    }

    fn leave(&self) {
        let Some(name) = self.depart() else {
            self.respond(ServerMessage::LeaveResp { status: Status::NotInChat });
            return;
        };
        tracing::info!(conn_id = %self.id, username = %name, "user left");
        self.respond(ServerMessage::LeaveResp { status: Status::Ok });
    }

    fn chat(&self, msg: String) {
        let Some(name) = self.joined_name() else {
            self.respond(ServerMessage::ChatResp { status: Status::NotInChat, msg });
            return;
        };
        let relayed = ServerMessage::BroadcastChat { username: name, msg: msg.clone() };
        let delivered = self.dispatcher.broadcast(self.id, &relayed);
        tracing::debug!(conn_id = %self.id, delivered, "chat relayed");
        self.respond(ServerMessage::ChatResp { status: Status::Ok, msg });
    }

    fn get_users(&self) {
        let reply = if self.joined_name().is_some() {
            ServerMessage::GetUsersResp { status: Status::Ok, user_list: self.registry.roster() }
        } else {
            ServerMessage::GetUsersResp { status: Status::NotInChat, user_list: Vec::new() }
        };
        self.respond(reply);
    }

    /// Release this connection's name and tell the other joined connections,
    /// in one registry step.
    fn depart(&self) -> Option<String> {
        self.registry.depart(self.id, |name, peers| {
            let leave = ServerMessage::BroadcastLeave { username: name.to_owned() };
            Dispatcher::deliver(peers, &leave);
        })
    }

    fn respond(&self, msg: ServerMessage) {
        self.dispatcher.respond_to(self.id, &msg);
    }

    /// Current display name, if this connection is joined.
    fn joined_name(&self) -> Option<String> {
        self.registry.get(self.id).filter(|c| c.is_joined()).map(|c| c.name)
    }

    fn normalize(&self, name: &str) -> String {
        if self.uppercase_usernames {
            name.to_ascii_uppercase()
        } else {
            name.to_owned()
        }
    }
}

/// Usernames are one or more ASCII letters or digits.
pub fn is_valid_username(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
