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

//! Correlates remote commands with answers that show up later on the data stream.
//!
//! The console often acknowledges a command without including the answer, which then arrives
//! as ordinary output with nothing tying it to the request. Each response shape gets a single
//! slot; the first line of that shape completes it.

use std::time::Instant;

use tracing::debug;

use crate::classify::{ClassifiedEvent, Shape};
use crate::platform::{ChannelId, UserId};

/// Where the answer to a command should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub channel: ChannelId,
    pub requested_by: UserId,
}

#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub shape: Shape,
    pub origin: Origin,
    pub created_at: Instant,
}

#[derive(Debug, Default)]
pub struct PendingRequests {
    day: Option<PendingRequest>,
    version: Option<PendingRequest>,
    players: Option<PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, shape: Shape) -> &mut Option<PendingRequest> {
        match shape {
            Shape::DayInfo => &mut self.day,
            Shape::VersionInfo => &mut self.version,
            Shape::PlayerCount => &mut self.players,
        }
    }

    /// Wait for the next line of `shape`. Replaces any request already waiting on it.
    pub fn register(&mut self, shape: Shape, origin: Origin) {
        let previous = self.slot(shape).replace(PendingRequest {
            shape,
            origin,
            created_at: Instant::now(),
        });
        if let Some(previous) = previous {
            debug!(
                ?shape,
                age = ?previous.created_at.elapsed(),
                channel = %previous.origin.channel,
                "Replacing unanswered pending request"
            );
        }
    }

    pub fn is_waiting(&self, shape: Shape) -> bool {
        match shape {
            Shape::DayInfo => self.day.is_some(),
            Shape::VersionInfo => self.version.is_some(),
            Shape::PlayerCount => self.players.is_some(),
        }
    }

    /// Complete and clear the request this event answers, if one is waiting.
    pub fn resolve(&mut self, event: &ClassifiedEvent) -> Option<PendingRequest> {
        let shape = event.shape()?;
        self.slot(shape).take()
    }
}
