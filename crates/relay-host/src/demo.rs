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

//! A stand-in console that answers the query commands with canned output.

use async_trait::async_trait;
use horde_relay::{CommandError, EventSender, RelayEvent, RemoteShell, TransportEvent};
use tracing::info;

pub struct DemoShell {
    events: EventSender,
}

impl DemoShell {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

#[async_trait]
impl RemoteShell for DemoShell {
    fn connect(&self) {
        info!("Demo console ready");
        let _ = self.events.send(RelayEvent::Transport(TransportEvent::Ready));
    }

    fn terminate(&self) {}

    async fn execute(&self, command: &str) -> Result<(), CommandError> {
        let response = match command {
            "gettime" => "Day 1, 07:00\n6 days to next horde.",
            "version" => {
                "Game version: Alpha 17 (b240) Compatibility Version: Alpha 17 (Simulated)"
            }
            "lp" => "Total of 0 in the game",
            _ => "",
        };
        let _ = self
            .events
            .send(RelayEvent::Transport(TransportEvent::Response(
                response.to_string(),
            )));
        Ok(())
    }
}
