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

//! Relays chat between a 7 Days to Die server console and a chat platform channel.
//!
//! The crate holds everything that doesn't touch the network: classifying console output,
//! reassembling chat lines the console truncates, correlating commands with answers that arrive
//! later, presence tracking, chat commands and the reconnect policy. Transports plug in through
//! the traits in [`platform`].

pub mod classify;
pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod pending;
pub mod platform;
pub mod reassembly;
pub mod relay;
pub mod status;
pub mod supervisor;

pub use config::RelayConfig;
pub use error::{ChatError, CommandError, ConfigError, PersistError, RelayError};
pub use platform::{
    Author, Availability, ChannelId, ChannelInfo, ChannelKind, ChatEvent, ChatPlatform,
    ConfigStore, InboundMessage, Outbound, Presence, RelayEvent, RemoteShell, ScopeId,
    TransportEvent, UserId,
};
pub use relay::{EventReceiver, EventSender, Relay, event_channel};
pub use supervisor::Supervisor;
