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

//! In-memory stand-ins for the console, the chat platform and the config file.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use horde_relay::{
    Author, ChannelId, ChannelInfo, ChannelKind, ChatError, ChatPlatform, CommandError,
    ConfigStore, EventReceiver, EventSender, InboundMessage, Outbound, PersistError, Presence,
    Relay, RelayConfig, RelayEvent, RemoteShell, ScopeId, Supervisor, TransportEvent, UserId,
    event_channel,
};

pub const BOT: UserId = UserId(999);
pub const BOUND: ChannelId = ChannelId(100);
pub const OTHER: ChannelId = ChannelId(200);
pub const GUILD: ScopeId = ScopeId(1);

pub struct FakeShell {
    pub events: EventSender,
    pub responses: Mutex<HashMap<String, Result<String, CommandError>>>,
    pub executed: Mutex<Vec<String>>,
    pub connects: Mutex<usize>,
    pub terminations: Mutex<usize>,
}

impl FakeShell {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            responses: Mutex::default(),
            executed: Mutex::default(),
            connects: Mutex::default(),
            terminations: Mutex::default(),
        }
    }

    pub fn respond(&self, command: &str, response: Result<String, CommandError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), response);
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteShell for FakeShell {
    fn connect(&self) {
        *self.connects.lock().unwrap() += 1;
    }

    fn terminate(&self) {
        *self.terminations.lock().unwrap() += 1;
    }

    async fn execute(&self, command: &str) -> Result<(), CommandError> {
        self.executed.lock().unwrap().push(command.to_string());
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))?;
        self.events
            .send(RelayEvent::Transport(TransportEvent::Response(response)))
            .unwrap();
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeChat {
    pub channels: Mutex<HashMap<ChannelId, ChannelInfo>>,
    pub sent: Mutex<Vec<(ChannelId, Outbound)>>,
    pub direct: Mutex<Vec<(UserId, String)>>,
    pub presences: Mutex<Vec<Presence>>,
    pub guilds: Mutex<Vec<String>>,
    pub logins: Mutex<usize>,
    pub shutdowns: Mutex<usize>,
    /// Reject rich messages, as when the bot lacks embed permission.
    pub reject_rich: Mutex<bool>,
}

impl FakeChat {
    pub fn with_channels(channels: &[ChannelInfo]) -> Self {
        let chat = Self::default();
        {
            let mut known = chat.channels.lock().unwrap();
            for channel in channels {
                known.insert(channel.id, *channel);
            }
        }
        chat
    }

    pub fn sent(&self) -> Vec<(ChannelId, Outbound)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_text(&self) -> Vec<(ChannelId, String)> {
        self.sent()
            .into_iter()
            .map(|(channel, message)| match message {
                Outbound::Text(text) => (channel, text),
                Outbound::Rich { description, .. } => (channel, description),
            })
            .collect()
    }

    pub fn presences(&self) -> Vec<Presence> {
        self.presences.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakeChat {
    async fn login(&self) -> Result<(), ChatError> {
        *self.logins.lock().unwrap() += 1;
        Ok(())
    }

    async fn shutdown(&self) {
        *self.shutdowns.lock().unwrap() += 1;
    }

    fn bot_user(&self) -> Option<UserId> {
        Some(BOT)
    }

    async fn send(&self, channel: ChannelId, message: Outbound) -> Result<(), ChatError> {
        if matches!(message, Outbound::Rich { .. }) && *self.reject_rich.lock().unwrap() {
            return Err(ChatError::Request("Missing Permissions".to_string()));
        }
        self.sent.lock().unwrap().push((channel, message));
        Ok(())
    }

    async fn send_direct(&self, user: UserId, text: &str) -> Result<(), ChatError> {
        self.direct.lock().unwrap().push((user, text.to_string()));
        Ok(())
    }

    async fn resolve_channel(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.channels.lock().unwrap().get(&id).copied()
    }

    async fn set_presence(&self, presence: Presence) {
        self.presences.lock().unwrap().push(presence);
    }

    async fn leave_guilds(&self) -> Result<Vec<String>, ChatError> {
        Ok(std::mem::take(&mut *self.guilds.lock().unwrap()))
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub saved: Mutex<Vec<ChannelId>>,
    pub fail: Mutex<bool>,
}

#[async_trait]
impl ConfigStore for FakeStore {
    async fn persist_channel(&self, channel: ChannelId) -> Result<(), PersistError> {
        if *self.fail.lock().unwrap() {
            return Err(PersistError("EACCES: permission denied".to_string()));
        }
        self.saved.lock().unwrap().push(channel);
        Ok(())
    }
}

pub fn text_channel(id: ChannelId) -> ChannelInfo {
    ChannelInfo {
        id,
        kind: ChannelKind::Text { scope: GUILD },
    }
}

pub fn config() -> RelayConfig {
    RelayConfig {
        password: Some("hunter2".to_string()),
        token: Some("x".repeat(59)),
        channel: Some(BOUND.to_string()),
        ..Default::default()
    }
}

pub struct Harness {
    pub relay: Relay,
    pub shell: Arc<FakeShell>,
    pub chat: Arc<FakeChat>,
    pub store: Arc<FakeStore>,
    pub supervisor: Supervisor,
    pub sender: EventSender,
    pub events: EventReceiver,
}

impl Harness {
    pub fn new(config: RelayConfig) -> Self {
        let (tx, rx) = event_channel();
        let shell = Arc::new(FakeShell::new(tx.clone()));
        let chat = Arc::new(FakeChat::with_channels(&[
            text_channel(BOUND),
            text_channel(OTHER),
        ]));
        let store = Arc::new(FakeStore::default());
        let supervisor = Supervisor::new();
        let relay = Relay::new(
            config,
            shell.clone(),
            chat.clone(),
            store.clone(),
            supervisor.clone(),
            tx.clone(),
        );
        Self {
            relay,
            shell,
            chat,
            store,
            supervisor,
            sender: tx,
            events: rx,
        }
    }

    /// Handle the console output queued so far, in order. Timer events are dropped.
    pub async fn pump_console(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let RelayEvent::Transport(_) = event {
                self.relay.handle_event(event).await.unwrap();
            }
        }
    }

    pub fn message(&self, channel: ChannelId, content: &str, can_manage: bool) -> InboundMessage {
        InboundMessage {
            author: Author {
                id: UserId(7),
                name: "alice".to_string(),
                bot: false,
                can_manage,
            },
            channel: text_channel(channel),
            content: content.to_string(),
            clean_content: content.to_string(),
        }
    }
}
