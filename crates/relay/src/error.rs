// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a client request, carried in every `*Resp` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    UsernameInvalid,
    UsernameInUse,
    NotInChat,
    AlreadyInChat,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::UsernameInvalid => "USERNAME_INVALID",
            Self::UsernameInUse => "USERNAME_IN_USE",
            Self::NotInChat => "NOT_IN_CHAT",
            Self::AlreadyInChat => "ALREADY_IN_CHAT",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
