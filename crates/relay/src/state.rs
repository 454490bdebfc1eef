// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::registry::ConnectionRegistry;

/// Shared relay state, handed to every route and connection task.
pub struct RelayState {
    pub config: RelayConfig,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Dispatcher,
    /// Cancelled on server shutdown; every connection loop watches it.
    pub shutdown: CancellationToken,
}

impl RelayState {
    pub fn new(config: RelayConfig, shutdown: CancellationToken) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry));
        Self { config, registry, dispatcher, shutdown }
    }
}
