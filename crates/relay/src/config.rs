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

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::platform::ChannelId;

/// Placeholder values shipped in the sample config file.
const PLACEHOLDER_TOKEN: &str = "your_token_here";
const PLACEHOLDER_CHANNEL: &str = "channelid";

/// Bot tokens are never shorter than this; anything shorter is likely a client secret.
const MIN_TOKEN_LEN: usize = 50;

pub const DEFAULT_PREFIX: &str = "7d!";

/// Everything the relay can be configured with. Keys match the JSON config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RelayConfig {
    /// Telnet password of the game server.
    pub password: Option<String>,
    pub ip: String,
    pub port: u16,

    /// Chat platform bot token.
    pub token: Option<String>,
    /// Id of the channel to relay to. Stored as a string; ids overflow JSON numbers.
    pub channel: Option<String>,
    pub prefix: String,

    pub allow_exec_command: bool,
    pub allow_multiple_instances: bool,
    pub disable_commands: bool,
    pub disable_chatmsgs: bool,
    pub disable_gmsgs: bool,
    pub disable_join_leave_gmsgs: bool,
    pub disable_misc_gmsgs: bool,
    pub show_private_chat: bool,
    pub disable_status_updates: bool,
    /// When unset, in-game messages that look like slash commands (`: /`) are not relayed.
    pub hide_prefix: bool,
    pub log_messages: bool,
    pub log_telnet: bool,
    pub debug_mode: bool,
    /// Answer console commands from canned data instead of a real server.
    pub demo_mode: bool,
    /// Run the console side only, without logging in to the chat platform.
    pub skip_discord_auth: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            password: None,
            ip: "localhost".to_string(),
            port: 8081,
            token: None,
            channel: None,
            prefix: DEFAULT_PREFIX.to_string(),
            allow_exec_command: false,
            allow_multiple_instances: false,
            disable_commands: false,
            disable_chatmsgs: false,
            disable_gmsgs: false,
            disable_join_leave_gmsgs: false,
            disable_misc_gmsgs: false,
            show_private_chat: false,
            disable_status_updates: false,
            hide_prefix: false,
            log_messages: false,
            log_telnet: false,
            debug_mode: false,
            demo_mode: false,
            skip_discord_auth: false,
        }
    }
}

impl RelayConfig {
    /// Reject configurations the relay cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.password.as_deref().is_none_or(str::is_empty) {
            return Err(ConfigError::MissingPassword);
        }
        match self.token.as_deref() {
            None | Some("") => Err(ConfigError::MissingToken),
            Some(PLACEHOLDER_TOKEN) => Err(ConfigError::PlaceholderToken),
            Some(token) if token.len() < MIN_TOKEN_LEN => Err(ConfigError::MalformedToken),
            Some(_) => Ok(()),
        }
    }

    /// Non-fatal problems worth telling the operator about at startup.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = vec![];
        if self.channel_id().is_none() {
            warnings.push(
                "No Discord channel specified! You will need to set one with 'setchannel #channelname'",
            );
        }
        if self.allow_exec_command {
            warnings.push(
                "Config option \"allow-exec-command\" is enabled. This may pose a security risk for your server.",
            );
        }
        warnings
    }

    pub fn channel_id(&self) -> Option<ChannelId> {
        match self.channel.as_deref() {
            None | Some(PLACEHOLDER_CHANNEL) => None,
            Some(id) => ChannelId::parse(id),
        }
    }

    /// The command prefix as matched against uppercased messages.
    pub fn command_prefix(&self) -> String {
        self.prefix.to_uppercase()
    }

    /// The command prefix as shown to users.
    pub fn display_prefix(&self) -> String {
        self.prefix.to_lowercase()
    }
}
