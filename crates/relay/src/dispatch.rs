// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound delivery to one connection or fan-out to many.

use std::sync::Arc;

use crate::protocol::{Outbound, ServerMessage};
use crate::registry::{Connection, ConnectionId, ConnectionRegistry};

/// Delivers server messages through the registry's outbound queues.
///
/// Sends only enqueue on the recipient's bounded outbox, so a slow client
/// never stalls the caller or the registry. A client whose outbox overflows
/// is evicted instead.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `message` to one connection. Dropped silently if the connection is
    /// gone. Returns whether the frame was queued.
    pub fn respond_to(&self, id: ConnectionId, message: &ServerMessage) -> bool {
        if !self.registry.is_live(id) {
            tracing::trace!(conn_id = %id, "dropping response to closed connection");
            return false;
        }
        let Some(conn) = self.registry.get(id) else {
            return false;
        };
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(conn_id = %id, err = %e, "failed to encode response");
                return false;
            }
        };
        let queued = conn.outbox.push(Outbound::Text(frame));
        if !queued && conn.outbox.is_evicted() {
            tracing::warn!(conn_id = %id, "outbound queue full, evicting connection");
        }
        queued
    }

    /// Send `message` to every joined, live connection except `sender`.
    ///
    /// Recipients are taken from a single registry snapshot. A failed send to
    /// one recipient does not affect the others. Returns the number of
    /// connections the frame was queued for.
    pub fn broadcast(&self, sender: ConnectionId, message: &ServerMessage) -> usize {
        let recipients: Vec<Connection> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|conn| conn.id != sender && conn.is_joined())
            .collect();
        Self::deliver(&recipients, message)
    }

    /// Encode `message` once and queue it for each open connection in
    /// `recipients`. Touches no registry state, so it may run while the
    /// registry lock is held.
    pub fn deliver(recipients: &[Connection], message: &ServerMessage) -> usize {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(err = %e, "failed to encode broadcast");
                return 0;
            }
        };

        let mut delivered = 0;
        for conn in recipients {
            if !conn.is_open() {
                continue;
            }
            if conn.outbox.push(Outbound::Text(frame.clone())) {
                delivered += 1;
            } else if conn.outbox.is_evicted() {
                tracing::warn!(conn_id = %conn.id, "outbound queue full, evicting connection");
            } else {
                tracing::debug!(conn_id = %conn.id, "recipient closed mid-broadcast");
            }
        }
        delivered
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
