// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decides whether and when lost sessions are re-established.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::RelayError;

pub const TRANSPORT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const CHAT_RECONNECT_DELAY: Duration = Duration::from_secs(6);

/// Normal closure; the session was shut down on purpose.
const CLOSE_NORMAL: u16 = 1000;
/// The chat gateway rejected the bot token.
const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Ignore,
    RetryAfter(Duration),
}

/// Holds the "keep reconnecting" flag. Clones share the flag.
#[derive(Debug, Clone)]
pub struct Supervisor {
    reconnect: Arc<AtomicBool>,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            reconnect: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop all future reconnects, including ones already scheduled.
    pub fn stop(&self) {
        self.reconnect.store(false, Ordering::SeqCst);
    }

    /// Checked both when scheduling and when a scheduled reconnect fires.
    pub fn should_reconnect(&self) -> bool {
        self.reconnect.load(Ordering::SeqCst)
    }

    pub fn on_transport_closed(&self) -> Decision {
        if self.should_reconnect() {
            Decision::RetryAfter(TRANSPORT_RECONNECT_DELAY)
        } else {
            Decision::Ignore
        }
    }

    pub fn on_transport_failed_login(&self) -> Result<Decision, RelayError> {
        Err(RelayError::TransportAuth)
    }

    pub fn on_chat_disconnected(&self, code: Option<u16>) -> Result<Decision, RelayError> {
        match code {
            Some(CLOSE_NORMAL) => Ok(Decision::Ignore),
            Some(CLOSE_AUTHENTICATION_FAILED) => Err(RelayError::ChatAuth),
            _ => Ok(self.on_chat_error()),
        }
    }

    pub fn on_chat_error(&self) -> Decision {
        if self.should_reconnect() {
            Decision::RetryAfter(CHAT_RECONNECT_DELAY)
        } else {
            Decision::Ignore
        }
    }
}
