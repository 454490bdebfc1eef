// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of live connections and their chat session state.
//!
//! Every operation takes the lock exactly once, so callers never observe a
//! half-applied insert, delete, or name claim. The lock is never held across
//! an `.await`.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::error::Status;
use crate::protocol::Outbound;

/// A connection's bounded outbound queue. The writer task owns the receiving
/// end and the socket sink.
///
/// Pushes never wait. A full queue means the peer stopped reading: the frame
/// is dropped and the connection is marked evicted so its read loop can shut
/// it down.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::Sender<Outbound>,
    evicted: CancellationToken,
}

impl Outbox {
    pub fn new(sender: mpsc::Sender<Outbound>) -> Self {
        Self { sender, evicted: CancellationToken::new() }
    }

    /// Queue a frame. Returns whether it was accepted.
    pub fn push(&self, frame: Outbound) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.evicted.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Best-effort close request for the writer. Never evicts.
    pub fn request_close(&self, code: u16) -> bool {
        self.sender.try_send(Outbound::Close(code)).is_ok()
    }

    /// The writer is still draining and the queue has never overflowed.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed() && !self.evicted.is_cancelled()
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted.is_cancelled()
    }

    /// Resolves once a push has found the queue full.
    pub async fn evicted(&self) {
        self.evicted.cancelled().await;
    }
}

/// Process-unique connection identifier. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Unjoined,
    Joined,
}

/// Point-in-time copy of a registry entry.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub state: SessionState,
    /// Empty while `Unjoined`.
    pub name: String,
    pub outbox: Outbox,
}

impl Connection {
    pub fn is_joined(&self) -> bool {
        self.state == SessionState::Joined
    }

    pub fn is_open(&self) -> bool {
        self.outbox.is_open()
    }
}

struct Entry {
    state: SessionState,
    name: String,
    outbox: Outbox,
}

impl Entry {
    fn to_connection(&self, id: ConnectionId) -> Connection {
        Connection {
            id,
            state: self.state,
            name: self.name.clone(),
            outbox: self.outbox.clone(),
        }
    }

    fn holds_name(&self, name: &str) -> bool {
        self.state == SessionState::Joined && self.name.eq_ignore_ascii_case(name)
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: HashMap<ConnectionId, Entry>,
}

/// Shared set of live connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new `Unjoined` connection and return its id.
    pub fn register(&self, outbox: Outbox) -> ConnectionId {
        let mut inner = self.inner.write();
        let id = ConnectionId(inner.next_id);
        inner.next_id += 1;
        let entry = Entry { state: SessionState::Unjoined, name: String::new(), outbox };
        inner.entries.insert(id, entry);
        id
    }

    /// Remove a connection. Returns whether it was present.
    pub fn deregister(&self, id: ConnectionId) -> bool {
        self.inner.write().entries.remove(&id).is_some()
    }

    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.inner.read().entries.get(&id).map(|e| e.to_connection(id))
    }

    /// First `Joined` connection holding `name`, compared case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<Connection> {
        let inner = self.inner.read();
        inner
            .entries
            .iter()
            .find(|(_, e)| e.holds_name(name))
            .map(|(id, e)| e.to_connection(*id))
    }

    /// Copy of every entry, in no particular order.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.inner.read().entries.iter().map(|(id, e)| e.to_connection(*id)).collect()
    }

    /// Registered and its outbound queue is still open.
    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.inner.read().entries.get(&id).is_some_and(|e| e.outbox.is_open())
    }

    /// Atomically check that `name` is free and assign it to `id`.
    ///
    /// The uniqueness check and the state change happen under one write
    /// lock, so two concurrent joins with the same name cannot both succeed.
    pub fn claim_name(&self, id: ConnectionId, name: &str) -> Result<String, Status> {
        let mut inner = self.inner.write();
        match inner.entries.get(&id) {
            None => return Err(Status::NotInChat),
            Some(e) if e.state == SessionState::Joined => return Err(Status::AlreadyInChat),
            Some(_) => {}
        }
        if inner.entries.values().any(|e| e.holds_name(name)) {
            return Err(Status::UsernameInUse);
        }
        let entry = inner.entries.get_mut(&id).ok_or(Status::NotInChat)?;
        entry.state = SessionState::Joined;
        entry.name = name.to_owned();
        Ok(entry.name.clone())
    }

    /// Return a `Joined` connection to `Unjoined` and announce it, atomically.
    ///
    /// `announce` receives the released name and every other `Joined`
    /// connection. It runs under the write lock, so no join can land between
    /// the announcement and the state change, and it must not call back into
    /// the registry. Returns the released name, or `None` if `id` was not
    /// joined.
    pub fn depart<F>(&self, id: ConnectionId, announce: F) -> Option<String>
    where
        F: FnOnce(&str, &[Connection]),
    {
        let mut inner = self.inner.write();
        let name = inner.entries.get(&id).filter(|e| e.state == SessionState::Joined)?.name.clone();
        let peers: Vec<Connection> = inner
            .entries
            .iter()
            .filter(|(peer, e)| **peer != id && e.state == SessionState::Joined)
            .map(|(peer, e)| e.to_connection(*peer))
            .collect();
        announce(&name, &peers);

        let entry = inner.entries.get_mut(&id)?;
        entry.state = SessionState::Unjoined;
        entry.name.clear();
        Some(name)
    }

    /// Display names of all `Joined` connections, unordered.
    pub fn roster(&self) -> Vec<String> {
        self.inner
            .read()
            .entries
            .values()
            .filter(|e| e.state == SessionState::Joined)
            .map(|e| e.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn joined_count(&self) -> usize {
        self.inner.read().entries.values().filter(|e| e.state == SessionState::Joined).count()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
