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

//! The relay loop.
//!
//! A single task owns all relay state and handles [`RelayEvent`]s one at a time, in arrival
//! order. Console commands are awaited in place; their answers come back on the same channel as
//! the rest of the console output, so every line is seen in the order the console produced it.
//! Timers are separate tasks that post events back onto the channel.

use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::classify::{ClassifiedEvent, PasswordError, classify, password_prompt};
use crate::commands::{Command, Query, mentions_bot};
use crate::config::RelayConfig;
use crate::error::{ChatError, RelayError};
use crate::filter::relay_text;
use crate::pending::{Origin, PendingRequests};
use crate::platform::{
    ChannelId, ChannelInfo, ChatEvent, ChatPlatform, ConfigStore, InboundMessage, Outbound,
    Presence, RelayEvent, RemoteShell, TransportEvent,
};
use crate::reassembly::{Feed, Reassembler};
use crate::status::{ConnectionState, HEARTBEAT_INTERVAL, StatusTracker};
use crate::supervisor::{CHAT_RECONNECT_DELAY, Decision, Supervisor};

pub type EventSender = mpsc::UnboundedSender<RelayEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<RelayEvent>;

const FOOTER: &str = concat!("horde-relay v", env!("CARGO_PKG_VERSION"));
const SHUTDOWN_COLOUR: u32 = 14164000;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

fn invite_link(bot: &str) -> String {
    format!("https://discordapp.com/oauth2/authorize?client_id={bot}&scope=bot")
}

/// Everything the relay mutates while running.
pub struct RelayState {
    status: StatusTracker,
    binding: Option<ChannelInfo>,
    pending: PendingRequests,
    /// What each sent command's answer should be checked for, oldest first.
    awaiting_responses: VecDeque<Option<(Query, Origin)>>,
    reassembly: Reassembler,
    /// Set when the last attempt to persist the bound channel failed.
    persist_error: Option<String>,
    chat_logged_in: bool,
    transport_started: bool,
    heartbeat: Option<JoinHandle<()>>,
}

impl RelayState {
    pub fn status(&self) -> ConnectionState {
        self.status.current()
    }

    pub fn binding(&self) -> Option<ChannelInfo> {
        self.binding
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }
}

pub struct Relay {
    config: RelayConfig,
    shell: Arc<dyn RemoteShell>,
    chat: Arc<dyn ChatPlatform>,
    store: Arc<dyn ConfigStore>,
    supervisor: Supervisor,
    events: EventSender,
    state: RelayState,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        shell: Arc<dyn RemoteShell>,
        chat: Arc<dyn ChatPlatform>,
        store: Arc<dyn ConfigStore>,
        supervisor: Supervisor,
        events: EventSender,
    ) -> Self {
        let status = StatusTracker::new(!config.disable_status_updates, config.display_prefix());
        Self {
            config,
            shell,
            chat,
            store,
            supervisor,
            events,
            state: RelayState {
                status,
                binding: None,
                pending: PendingRequests::new(),
                awaiting_responses: VecDeque::new(),
                reassembly: Reassembler::new(),
                persist_error: None,
                chat_logged_in: false,
                transport_started: false,
                heartbeat: None,
            },
        }
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Log in and process events until shutdown or a fatal error.
    pub async fn run(mut self, mut events: EventReceiver) -> Result<(), RelayError> {
        self.start().await?;
        while let Some(event) = events.recv().await {
            if self.handle_event(event).await?.is_break() {
                return Ok(());
            }
        }
        Err(RelayError::ChannelClosed)
    }

    pub async fn start(&mut self) -> Result<(), RelayError> {
        if self.config.skip_discord_auth {
            // Nothing to wait for; connect to the game right away.
            self.connect_transport();
            return Ok(());
        }
        self.login_chat().await
    }

    pub async fn handle_event(&mut self, event: RelayEvent) -> Result<ControlFlow<()>, RelayError> {
        match event {
            RelayEvent::Transport(event) => self.handle_transport(event).await?,
            RelayEvent::Chat(event) => self.handle_chat(event).await?,
            RelayEvent::Heartbeat => {
                let presence = self.state.status.refresh(self.is_bound());
                self.publish(presence).await;
            }
            RelayEvent::ReconnectTransport => {
                if self.supervisor.should_reconnect() {
                    info!("Reconnecting to game...");
                    self.shell.connect();
                }
            }
            RelayEvent::ReconnectChat => {
                if self.supervisor.should_reconnect() {
                    self.login_chat().await?;
                }
            }
            RelayEvent::LeaveGuilds => self.leave_guilds().await,
            RelayEvent::Shutdown => {
                self.shutdown().await;
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn shutdown(&mut self) {
        info!("Shutting down relay");
        self.supervisor.stop();
        if let Some(heartbeat) = self.state.heartbeat.take() {
            heartbeat.abort();
        }
        if !self.config.skip_discord_auth {
            self.chat.shutdown().await;
        }
        self.shell.terminate();
    }

    async fn leave_guilds(&self) {
        if self.config.skip_discord_auth {
            warn!("Not logged in to Discord; there are no guilds to leave.");
            return;
        }
        match self.chat.leave_guilds().await {
            Ok(left) => {
                let bot = self.bot_id();
                info!(
                    count = left.len(),
                    "Left all guilds. Use this link to re-invite the bot: {}",
                    invite_link(&bot)
                );
            }
            Err(e) => warn!("Failed to leave guilds: {e}"),
        }
    }

    fn bot_id(&self) -> String {
        self.chat.bot_user().map(|u| u.to_string()).unwrap_or_default()
    }

    fn is_bound(&self) -> bool {
        self.state.binding.is_some()
    }

    fn connect_transport(&mut self) {
        if !self.state.transport_started {
            self.state.transport_started = true;
            self.shell.connect();
        }
    }

    async fn login_chat(&mut self) -> Result<(), RelayError> {
        match self.chat.login().await {
            Ok(()) => Ok(()),
            Err(ChatError::InvalidCredentials) => Err(RelayError::ChatAuth),
            Err(e) => {
                warn!("Unable to log in to Discord ({e}). Attempting to reconnect in 6s...");
                self.schedule(CHAT_RECONNECT_DELAY, RelayEvent::ReconnectChat);
                Ok(())
            }
        }
    }

    fn schedule(&self, delay: Duration, event: RelayEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The relay may be gone by now; that's fine.
            let _ = events.send(event);
        });
    }

    fn start_heartbeat(&mut self) {
        let events = self.events.clone();
        self.state.heartbeat = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                interval.tick().await;
                if events.send(RelayEvent::Heartbeat).is_err() {
                    break;
                }
            }
        }));
    }

    async fn publish(&self, presence: Option<Presence>) {
        if self.config.skip_discord_auth {
            return;
        }
        if let Some(presence) = presence {
            debug!(activity = %presence.activity, "Updating presence");
            self.chat.set_presence(presence).await;
        }
    }

    async fn handle_transport(&mut self, event: TransportEvent) -> Result<(), RelayError> {
        match event {
            TransportEvent::Ready => {
                info!("Connected to game.");
                if !self.config.skip_discord_auth {
                    let presence = self
                        .state
                        .status
                        .set(ConnectionState::Online, self.is_bound());
                    self.publish(presence).await;
                }
            }
            TransportEvent::Closed => {
                info!("Connection to game closed.");
                let presence = self.state.status.closed(self.is_bound());
                self.publish(presence).await;
                if let Decision::RetryAfter(delay) = self.supervisor.on_transport_closed() {
                    self.shell.terminate();
                    self.schedule(delay, RelayEvent::ReconnectTransport);
                }
            }
            TransportEvent::Error(message) => {
                warn!("An error occurred while connecting to the game: {message}");
                let presence = self
                    .state
                    .status
                    .set(ConnectionState::Error, self.is_bound());
                self.publish(presence).await;
            }
            TransportEvent::FailedLogin => {
                error!("Login to game failed!");
                self.supervisor.on_transport_failed_login()?;
            }
            TransportEvent::Data(chunk) => self.handle_data(&chunk).await?,
            TransportEvent::Response(chunk) => self.handle_response(&chunk).await,
        }
        Ok(())
    }

    async fn handle_data(&mut self, chunk: &str) -> Result<(), RelayError> {
        if self.config.debug_mode {
            debug!(length = chunk.len(), "Buffer dump: {chunk}");
        }
        if self.config.log_telnet {
            info!("[Telnet] {chunk}");
        }

        match password_prompt(chunk) {
            Some(PasswordError::Prompt) => {
                error!("Received password prompt!");
                return Err(RelayError::PasswordPrompt);
            }
            Some(PasswordError::Incorrect) => {
                error!("Received password prompt! (Telnet password is incorrect)");
                return Err(RelayError::PasswordIncorrect);
            }
            None => {}
        }

        // Empty fragments carry nothing and would cut a pending reassembly short.
        for line in chunk.split('\n').filter(|l| !l.is_empty()) {
            self.handle_line(line).await;
        }
        Ok(())
    }

    /// One line of console output, whether from the data stream or a command response.
    async fn handle_line(&mut self, line: &str) {
        let event = match self.state.reassembly.feed(line) {
            Feed::Buffering => return,
            Feed::Event(event) => event,
        };

        if event == ClassifiedEvent::ShutdownNotice {
            self.server_shut_down().await;
            return;
        }

        // A line that answers a pending command is never relayed.
        if let Some(request) = self.state.pending.resolve(&event) {
            if let Some(answer) = Query::for_shape(request.shape).format_answer(&event) {
                self.reply(request.origin.channel, answer).await;
            }
            return;
        }

        self.relay_to_chat(&event).await;
    }

    async fn relay_to_chat(&self, event: &ClassifiedEvent) {
        let Some(channel) = self.state.binding else {
            return;
        };
        let Some(text) = relay_text(event, &self.config) else {
            return;
        };
        if self.config.log_messages {
            info!("{text}");
        }
        if let Err(e) = self.chat.send(channel.id, Outbound::Text(text)).await {
            warn!("Failed to relay message: {e}");
        }
    }

    async fn server_shut_down(&mut self) {
        info!("The server has shut down. Closing connection...");
        // The session is unusable after this; dropping it lets the reconnect cycle take over.
        self.shell.terminate();

        let Some(channel) = self.state.binding else {
            return;
        };
        let notice = Outbound::Rich {
            description: "The server has shut down.".to_string(),
            colour: Some(SHUTDOWN_COLOUR),
        };
        if self.chat.send(channel.id, notice).await.is_err() {
            let plain = Outbound::Text("**The server has shut down.**".to_string());
            if let Err(e) = self.chat.send(channel.id, plain).await {
                warn!("Failed to send message with error: {e}");
            }
        }
    }

    /// Feed a command response through the line handler, pulling out the answer to `expecting`.
    ///
    /// Returns whether the answer was found.
    async fn process_response(
        &mut self,
        response: &str,
        expecting: Option<(Query, Origin)>,
    ) -> bool {
        let mut answered = false;
        for line in response.split('\n').filter(|l| !l.is_empty()) {
            if let Some((query, origin)) = expecting
                && !answered
                && let Some(answer) = query.format_answer(&classify(line))
            {
                answered = true;
                self.reply(origin.channel, answer).await;
                continue;
            }
            self.handle_line(line).await;
        }
        answered
    }

    async fn handle_response(&mut self, chunk: &str) {
        let expecting = self.state.awaiting_responses.pop_front().flatten();
        let answered = self.process_response(chunk, expecting).await;
        if let Some((query, origin)) = expecting
            && !answered
        {
            self.state.pending.register(query.shape(), origin);
        }
    }

    async fn reply(&self, channel: ChannelId, text: String) {
        if let Err(e) = self.chat.send(channel, Outbound::Text(text)).await {
            warn!(%channel, "Failed to send reply: {e}");
        }
    }

    async fn handle_chat(&mut self, event: ChatEvent) -> Result<(), RelayError> {
        match event {
            ChatEvent::Ready { guild_count } => self.chat_ready(guild_count).await,
            ChatEvent::Message(message) => self.handle_message(message).await,
            ChatEvent::Disconnected { code, reason } => {
                let decision = self.supervisor.on_chat_disconnected(code)?;
                if let Decision::RetryAfter(delay) = decision {
                    info!(?code, "Discord client disconnected with reason: {reason}");
                    info!("Attempting to reconnect in {}s...", delay.as_secs());
                    self.chat.shutdown().await;
                    self.schedule(delay, RelayEvent::ReconnectChat);
                }
            }
            ChatEvent::Error(message) => {
                if let Decision::RetryAfter(delay) = self.supervisor.on_chat_error() {
                    warn!(
                        "Discord client error ({message}). Attempting to reconnect in {}s...",
                        delay.as_secs()
                    );
                    self.chat.shutdown().await;
                    self.schedule(delay, RelayEvent::ReconnectChat);
                }
            }
        }
        Ok(())
    }

    async fn chat_ready(&mut self, guild_count: usize) {
        if !self.state.chat_logged_in {
            self.state.chat_logged_in = true;
            info!("Discord client connected successfully.");
            self.state.status.assume(ConnectionState::Connecting);
            self.start_heartbeat();
        } else {
            info!("Discord client re-connected successfully.");
            let presence = self.state.status.refresh(self.is_bound());
            self.publish(presence).await;
        }

        let bot = self.bot_id();
        match guild_count {
            0 => warn!(
                "The bot is currently not in a Discord server. You can invite it to a guild using this invite link: {}",
                invite_link(&bot)
            ),
            1 => {}
            _ => warn!(
                "The bot is currently in more than one guild. Please type 'leaveguilds' in the console to clear the bot from all guilds. It is highly recommended that you verify 'Public bot' is UNCHECKED on this page: https://discordapp.com/developers/applications/me/{bot}"
            ),
        }

        if let Some(id) = self.config.channel_id() {
            self.state.binding = self.chat.resolve_channel(id).await;
            if self.state.binding.is_none() {
                error!("Failed to identify channel with ID '{id}'");
            }
        }

        self.connect_transport();
    }

    async fn handle_message(&mut self, message: InboundMessage) {
        let bot = self.chat.bot_user();
        if message.author.bot || Some(message.author.id) == bot {
            return;
        }

        let mentioned = mentions_bot(&message.content, bot);
        let prefix = self.config.command_prefix();
        if message.content.to_uppercase().starts_with(&prefix) || mentioned {
            if let Some(command) = Command::parse(
                &message.content,
                &prefix,
                mentioned,
                self.config.allow_exec_command,
            ) {
                self.dispatch(command, &message).await;
            }
        } else if message.channel.is_text()
            && self
                .state
                .binding
                .is_some_and(|b| b.id == message.channel.id)
        {
            self.say(&message).await;
        }
    }

    async fn dispatch(&mut self, command: Command, message: &InboundMessage) {
        if command.needs_bound_channel() {
            let in_bound_channel = self
                .state
                .binding
                .is_some_and(|b| b.id == message.channel.id);
            if !in_bound_channel && !message.channel.is_direct() {
                return;
            }
        }

        match command {
            Command::SetChannel { target } => self.set_channel(target, message).await,
            Command::Exec { command } => self.exec(command, message).await,
            Command::Info => self.info(message).await,
            Command::Query(query) => {
                if !self.config.disable_commands {
                    self.query(query, message).await;
                }
            }
        }
    }

    async fn deny(&self, message: &InboundMessage, command: &str) {
        let text = format!("You do not have permission to do this. ({command})");
        if let Err(e) = self.chat.send_direct(message.author.id, &text).await {
            debug!("Unable to notify {} of denied command: {e}", message.author.name);
        }
    }

    async fn set_channel(&mut self, target: Option<String>, message: &InboundMessage) {
        let permitted = message.channel.is_text()
            && message.author.can_manage
            && self
                .state
                .binding
                .is_none_or(|b| b.scope() == message.channel.scope());
        if !permitted {
            self.deny(message, "setchannel").await;
            return;
        }
        info!(
            "User {} ({}) executed command: setchannel",
            message.author.name, message.author.id
        );

        let target = match target {
            None => Some(message.channel),
            Some(text) => match ChannelId::parse(&text) {
                Some(id) => self.chat.resolve_channel(id).await,
                None => None,
            },
        };
        let reply_to = message.channel.id;
        let Some(target) = target else {
            self.reply(
                reply_to,
                ":x: Failed to identify the channel you specified.".to_string(),
            )
            .await;
            return;
        };

        if self.state.binding.is_some_and(|b| b.id == target.id)
            && self.state.persist_error.is_none()
        {
            self.reply(
                reply_to,
                ":warning: This channel is already set as the bot's active channel!".to_string(),
            )
            .await;
            return;
        }

        self.state.binding = Some(target);
        self.config.channel = Some(target.id.to_string());

        let id = target.id;
        match self.store.persist_channel(id).await {
            Ok(()) => {
                self.state.persist_error = None;
                self.reply(
                    reply_to,
                    format!(":white_check_mark: The channel has been successfully set to <#{id}> ({id})"),
                )
                .await;
            }
            Err(e) => {
                error!(
                    "Failed to write to the config file with the following err: {e}. Make sure your config file is not read-only or missing"
                );
                self.state.persist_error = Some(e.to_string());
                self.reply(
                    reply_to,
                    format!(
                        ":warning: Channel set successfully to <#{id}> ({id}), however the configuration has failed to save. The configured channel will not save when the bot restarts. See the bot's console for more info."
                    ),
                )
                .await;
            }
        }

        let presence = self.state.status.refresh(self.is_bound());
        self.publish(presence).await;
    }

    async fn exec(&mut self, command: String, message: &InboundMessage) {
        let bound_scope = self.state.binding.and_then(|b| b.scope());
        let permitted = message.channel.is_text()
            && message.author.can_manage
            && bound_scope.is_some()
            && bound_scope == message.channel.scope();
        if !permitted {
            self.deny(message, "exec").await;
            return;
        }
        info!(
            "User {} ({}) executed command: exec {command}",
            message.author.name, message.author.id
        );
        match self.shell.execute(&command).await {
            Ok(()) => self.state.awaiting_responses.push_back(None),
            Err(e) => warn!("Raw command failed: {e}"),
        }
    }

    async fn info(&self, message: &InboundMessage) {
        let mut text = format!(
            "Server connection: {}",
            self.state.status.current().describe()
        );
        if !self.config.disable_commands {
            let pre = self.config.display_prefix();
            text.push_str(&format!(
                "\n**Commands:** {pre}info, {pre}time, {pre}version, {pre}players"
            ));
        }
        text.push_str(&format!("\n\n*{FOOTER}*"));

        let rich = Outbound::Rich {
            description: text.clone(),
            colour: None,
        };
        if self.chat.send(message.channel.id, rich).await.is_err() {
            self.reply(message.channel.id, text).await;
        }
    }

    async fn query(&mut self, query: Query, message: &InboundMessage) {
        let origin = Origin {
            channel: message.channel.id,
            requested_by: message.author.id,
        };
        match self.shell.execute(query.remote_command()).await {
            Ok(()) => self
                .state
                .awaiting_responses
                .push_back(Some((query, origin))),
            Err(e) => {
                let text = e.user_message(&self.config.display_prefix());
                self.reply(origin.channel, text).await;
            }
        }
    }

    async fn say(&mut self, message: &InboundMessage) {
        if self.config.disable_chatmsgs {
            return;
        }
        let line = format!("[{}] {}", message.author.name, message.clean_content);
        match self.shell.execute(&format!("say \"{line}\"")).await {
            Ok(()) => self.state.awaiting_responses.push_back(None),
            Err(e) => warn!("Error while attempting to send message: {e}"),
        }
    }
}
