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

//! Chat commands understood by the relay.

use regex::RegexBuilder;

use crate::classify::{ClassifiedEvent, Shape};
use crate::platform::UserId;

/// Commands that ask the game server a question and relay its one-line answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Time,
    Version,
    Players,
}

impl Query {
    /// The console command to issue.
    pub fn remote_command(&self) -> &'static str {
        match self {
            Query::Time => "gettime",
            Query::Version => "version",
            Query::Players => "lp",
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Query::Time => Shape::DayInfo,
            Query::Version => Shape::VersionInfo,
            Query::Players => Shape::PlayerCount,
        }
    }

    pub fn for_shape(shape: Shape) -> Self {
        match shape {
            Shape::DayInfo => Query::Time,
            Shape::VersionInfo => Query::Version,
            Shape::PlayerCount => Query::Players,
        }
    }

    /// The reply for a line answering this query, or `None` if the line doesn't.
    pub fn format_answer(&self, event: &ClassifiedEvent) -> Option<String> {
        match (self, event) {
            (
                Query::Time,
                ClassifiedEvent::DayInfo {
                    line,
                    horde_countdown,
                    ..
                },
            ) => {
                let plural = if *horde_countdown == 1 { "" } else { "s" };
                Some(format!(
                    "{line}\n{horde_countdown} day{plural} to next horde."
                ))
            }
            (Query::Version, ClassifiedEvent::VersionInfo { text })
            | (Query::Players, ClassifiedEvent::PlayerCount { text }) => {
                Some(text.trim_end_matches('\r').to_string())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bind the relay to the sender's channel, or to the given `<#id>` target.
    SetChannel { target: Option<String> },
    /// Raw console command.
    Exec { command: String },
    Info,
    Query(Query),
}

impl Command {
    /// Parse a message already known to start with the prefix or to mention the bot.
    ///
    /// `prefix` is the uppercased command prefix.
    pub fn parse(content: &str, prefix: &str, mentioned: bool, allow_exec: bool) -> Option<Self> {
        let upper = content.to_uppercase();
        let cmd = upper.replacen(prefix, "", 1);
        let cmd = cmd.trim();

        if let Some(rest) = cmd.strip_prefix("SETCHANNEL") {
            let target = rest.trim();
            return Some(Command::SetChannel {
                target: (!target.is_empty()).then(|| target.to_string()),
            });
        }

        if allow_exec && cmd.starts_with("EXEC") {
            return Some(Command::Exec {
                command: strip_exec_keyword(content, prefix),
            });
        }

        if mentioned || matches!(cmd, "INFO" | "I" | "HELP" | "H") {
            return Some(Command::Info);
        }

        match cmd {
            "TIME" | "T" | "DAY" => Some(Command::Query(Query::Time)),
            "VERSION" | "V" => Some(Command::Query(Query::Version)),
            "PLAYERS" | "P" | "PL" | "LP" => Some(Command::Query(Query::Players)),
            _ => None,
        }
    }

    /// Whether the command is only honoured in the bound channel or a direct message.
    pub fn needs_bound_channel(&self) -> bool {
        !matches!(self, Command::SetChannel { .. } | Command::Exec { .. })
    }
}

/// Whether a message addresses the bot directly.
pub fn mentions_bot(content: &str, bot: Option<UserId>) -> bool {
    if content == "7d!info" || content == "7d!help" {
        return true;
    }
    bot.is_some_and(|id| {
        content.contains(&format!("<@{id}>")) || content.contains(&format!("<@!{id}>"))
    })
}

/// Everything after the exec keyword, in its original case.
fn strip_exec_keyword(content: &str, prefix: &str) -> String {
    let keyword = regex::escape(&format!("{prefix}EXEC"));
    match RegexBuilder::new(&keyword).case_insensitive(true).build() {
        Ok(re) => re.replace_all(content, "").trim_start().to_string(),
        Err(_) => content.to_string(),
    }
}
