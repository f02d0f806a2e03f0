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

//! Connection state and the bot presence derived from it.

use std::time::Duration;

use crate::platform::{Availability, Presence};

/// Presence values expire on the chat platform unless re-sent.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ConnectionState {
    /// Forces the next update through the dedup check.
    Unknown = -100,
    Error = -1,
    Connecting = 0,
    Online = 1,
}

impl ConnectionState {
    pub fn describe(&self) -> &'static str {
        match self {
            ConnectionState::Error => ":red_circle: Error",
            ConnectionState::Connecting => ":white_circle: Connecting...",
            ConnectionState::Online => ":large_blue_circle: Online",
            ConnectionState::Unknown => ":red_circle: Error Unknown Status",
        }
    }
}

pub struct StatusTracker {
    current: ConnectionState,
    reporting: bool,
    prefix: String,
}

impl StatusTracker {
    /// `prefix` is the command prefix as shown to users.
    pub fn new(reporting: bool, prefix: String) -> Self {
        Self {
            current: ConnectionState::Unknown,
            reporting,
            prefix,
        }
    }

    pub fn current(&self) -> ConnectionState {
        self.current
    }

    /// Record `state` without publishing anything.
    pub fn assume(&mut self, state: ConnectionState) {
        self.current = state;
    }

    /// Move to `state`. Returns the presence to publish, or `None` if nothing changed or
    /// reporting is disabled.
    pub fn set(&mut self, state: ConnectionState, bound: bool) -> Option<Presence> {
        let changed = state != self.current;
        self.current = state;
        if !changed || !self.reporting {
            return None;
        }
        self.presence_for(state, bound)
    }

    /// Re-publish the current state.
    pub fn refresh(&mut self, bound: bool) -> Option<Presence> {
        let state = self.current;
        self.current = ConnectionState::Unknown;
        self.set(state, bound)
    }

    /// Apply a transport close. An error state is kept so the failure stays visible.
    pub fn closed(&mut self, bound: bool) -> Option<Presence> {
        if self.current == ConnectionState::Error {
            return None;
        }
        self.set(ConnectionState::Connecting, bound)
    }

    fn presence_for(&self, state: ConnectionState, bound: bool) -> Option<Presence> {
        let prefix = &self.prefix;
        let (activity, availability) = match state {
            ConnectionState::Connecting => (
                format!("Connecting... | Type {prefix}info"),
                Availability::DoNotDisturb,
            ),
            ConnectionState::Error => (
                format!("Error | Type {prefix}help"),
                Availability::DoNotDisturb,
            ),
            ConnectionState::Online if bound => {
                (format!("7DTD | Type {prefix}help"), Availability::Online)
            }
            ConnectionState::Online => (
                format!("No channel | Type {prefix}setchannel"),
                Availability::Idle,
            ),
            ConnectionState::Unknown => return None,
        };
        Some(Presence {
            activity,
            availability,
        })
    }
}
