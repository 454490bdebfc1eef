// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

/// Real-time chat relay over WebSocket.
#[derive(Debug, Clone, Parser)]
#[command(name = "chatrelay", version, about)]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "CHATRELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "CHATRELAY_PORT")]
    pub port: u16,

    /// Store and display usernames in uppercase.
    #[arg(long, env = "CHATRELAY_UPPERCASE_USERNAMES")]
    pub uppercase_usernames: bool,

    /// Maximum size of a single inbound WebSocket message in bytes.
    #[arg(long, default_value_t = 64 * 1024, env = "CHATRELAY_MAX_MESSAGE_BYTES")]
    pub max_message_bytes: usize,

    /// Frames buffered per connection before a client that stopped reading
    /// is disconnected.
    #[arg(long, default_value_t = 256, env = "CHATRELAY_OUTBOUND_QUEUE")]
    pub outbound_queue: usize,

    /// Log filter directive (e.g. `info`, `chatrelay=debug`).
    #[arg(long, default_value = "info", env = "CHATRELAY_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format (text, json).
    #[arg(long, default_value = "text", env = "CHATRELAY_LOG_FORMAT")]
    pub log_format: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
            uppercase_usernames: false,
            max_message_bytes: 64 * 1024,
            outbound_queue: 256,
            log_level: "info".to_owned(),
            log_format: "text".to_owned(),
        }
    }
}

impl RelayConfig {
    /// Check option combinations clap cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other} (expected text or json)"),
        }
        if self.max_message_bytes == 0 {
            anyhow::bail!("--max-message-bytes must be greater than zero");
        }
        if self.outbound_queue == 0 {
            anyhow::bail!("--outbound-queue must be greater than zero");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
