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

//! The collaborators the relay drives, and the events they feed back into it.

use std::fmt;

use async_trait::async_trait;

use crate::error::{ChatError, CommandError, PersistError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// Accepts a bare id or a `<#id>` channel mention. Zero is never a valid id.
    pub fn parse(text: &str) -> Option<Self> {
        let id = text
            .trim()
            .trim_start_matches("<#")
            .trim_end_matches('>')
            .parse::<u64>()
            .ok()?;
        (id != 0).then_some(ChannelId(id))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The server/guild a channel belongs to. Permissions are checked per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Text { scope: ScopeId },
    Direct,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub kind: ChannelKind,
}

impl ChannelInfo {
    pub fn scope(&self) -> Option<ScopeId> {
        match self.kind {
            ChannelKind::Text { scope } => Some(scope),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, ChannelKind::Text { .. })
    }

    pub fn is_direct(&self) -> bool {
        matches!(self.kind, ChannelKind::Direct)
    }
}

#[derive(Debug, Clone)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    pub bot: bool,
    /// Whether the author may manage the scope the message was sent in.
    pub can_manage: bool,
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub author: Author,
    pub channel: ChannelInfo,
    pub content: String,
    /// Content with mentions rendered as plain names.
    pub clean_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Rich {
        description: String,
        colour: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Idle,
    DoNotDisturb,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub activity: String,
    pub availability: Availability,
}

/// The game server console session.
///
/// Lifecycle and stream data are delivered as [`TransportEvent`]s on the relay's event channel.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Start (or restart) a session in the background.
    fn connect(&self);

    /// Drop the current session, if any. Dropping a live session reports
    /// [`TransportEvent::Closed`]; calling this with no session is a no-op.
    fn terminate(&self);

    /// Send one command and wait for the console to answer.
    ///
    /// On `Ok`, the answering chunk is posted as [`TransportEvent::Response`] behind any output
    /// that arrived before it and ahead of anything that arrives after.
    async fn execute(&self, command: &str) -> Result<(), CommandError>;
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Start (or restart) the chat session in the background.
    async fn login(&self) -> Result<(), ChatError>;

    async fn shutdown(&self);

    /// The relay's own identity, once logged in.
    fn bot_user(&self) -> Option<UserId>;

    async fn send(&self, channel: ChannelId, message: Outbound) -> Result<(), ChatError>;

    async fn send_direct(&self, user: UserId, text: &str) -> Result<(), ChatError>;

    async fn resolve_channel(&self, id: ChannelId) -> Option<ChannelInfo>;

    async fn set_presence(&self, presence: Presence);

    /// Leave every server the bot is a member of, returning their names.
    async fn leave_guilds(&self) -> Result<Vec<String>, ChatError>;
}

/// Durable storage for the bound channel.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn persist_channel(&self, channel: ChannelId) -> Result<(), PersistError>;
}

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Ready,
    /// One chunk of console output; may hold several `\n`-separated lines.
    Data(String),
    /// The chunk that answered a command, in stream order with [`TransportEvent::Data`].
    Response(String),
    Closed,
    Error(String),
    FailedLogin,
}

#[derive(Debug, Clone)]
pub enum ChatEvent {
    Ready { guild_count: usize },
    Message(InboundMessage),
    Disconnected { code: Option<u16>, reason: String },
    Error(String),
}

#[derive(Debug, Clone)]
pub enum RelayEvent {
    Transport(TransportEvent),
    Chat(ChatEvent),
    Heartbeat,
    ReconnectTransport,
    ReconnectChat,
    /// Operator request to remove the bot from all of its servers.
    LeaveGuilds,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_parse() {
        assert_eq!(ChannelId::parse("<#1234>"), Some(ChannelId(1234)));
        assert_eq!(ChannelId::parse(" 42 "), Some(ChannelId(42)));
        assert_eq!(ChannelId::parse("0"), None);
        assert_eq!(ChannelId::parse("general"), None);
    }
}
