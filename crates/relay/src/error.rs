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

use thiserror::Error;

/// Failure of a single remote console command. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("response not received")]
    NotResponding,
    #[error("socket not writable")]
    NotConnected,
    #[error("{0}")]
    Other(String),
}

impl CommandError {
    /// The text shown to chat users when a command fails.
    pub fn user_message(&self, prefix: &str) -> String {
        match self {
            CommandError::NotResponding => {
                "Command failed because the server is not responding. It may be frozen or loading."
                    .to_string()
            }
            CommandError::NotConnected => format!(
                "Command failed because the bot is not connected to the server. Type {prefix}info to see the current status."
            ),
            CommandError::Other(message) => format!("Command failed with error \"{message}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("chat session is not ready")]
    NotReady,
    #[error("invalid chat platform credentials")]
    InvalidCredentials,
    #[error("chat platform request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
#[error("failed to persist configuration: {0}")]
pub struct PersistError(pub String);

/// Startup configuration problems. The messages are shown to the operator verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("No telnet password specified!")]
    MissingPassword,
    #[error("No Discord token specified!")]
    MissingToken,
    #[error(
        "It appears that you have not yet added a token. Please replace \"your_token_here\" with a valid token in the config file."
    )]
    PlaceholderToken,
    #[error(
        "It appears that you have entered a client secret or other invalid string. Please ensure that you have entered a bot token and try again."
    )]
    MalformedToken,
}

/// Conditions that end the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Login to game failed!")]
    TransportAuth,
    #[error("Received password prompt!")]
    PasswordPrompt,
    #[error("Received password prompt! (Telnet password is incorrect)")]
    PasswordIncorrect,
    #[error("Please double-check the configured token and try again.")]
    ChatAuth,
    #[error("relay event channel closed")]
    ChannelClosed,
}
