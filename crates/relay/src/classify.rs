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

//! Classification of raw console lines into the handful of shapes the relay cares about.
//!
//! The game server's console output is an unversioned log format, so everything here is
//! token-position based. A typical chat line looks like:
//!
//! ```text
//! 2024-01-01T00:00:00 123.45 INF Chat (from 'Steam_1', entity id '1', to 'Global'): hello
//! ```
//!
//! Token 3 (with any trailing `:` removed) is the line "type".

use std::sync::LazyLock;

use regex::Regex;

/// Sent by the server when the session has lost its authentication.
pub const PASSWORD_PROMPT: &str = "Please enter password:\r\n\u{0}\u{0}";
/// Sent by the server after a wrong password.
pub const PASSWORD_INCORRECT: &str = "Password incorrect, please enter password:\r\n";

/// Token marking a chat line addressed to everyone.
const GLOBAL_TARGET: &str = "'Global'):";

/// Matches the `(from '...', entity id '...', to '...'):` source annotation of chat lines.
static SOURCE_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *\([^)]*\): *").expect("valid source annotation pattern"));

static SPEAKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(from '([^']*)'").expect("valid speaker pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordError {
    /// The server is asking for the password again; the session is unusable.
    Prompt,
    /// The configured password was rejected.
    Incorrect,
}

/// The response shapes a remote command can be waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    DayInfo,
    VersionInfo,
    PlayerCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    Chat {
        speaker: Option<String>,
        body: String,
        private: bool,
    },
    GlobalMessage {
        body: String,
    },
    DayInfo {
        day: u64,
        horde_countdown: u64,
        line: String,
    },
    VersionInfo {
        text: String,
    },
    PlayerCount {
        text: String,
    },
    ShutdownNotice,
    PasswordError(PasswordError),
    Unclassified {
        raw: String,
    },
}

impl ClassifiedEvent {
    /// The pending-response shape this event can answer, if any.
    pub fn shape(&self) -> Option<Shape> {
        match self {
            ClassifiedEvent::DayInfo { .. } => Some(Shape::DayInfo),
            ClassifiedEvent::VersionInfo { .. } => Some(Shape::VersionInfo),
            ClassifiedEvent::PlayerCount { .. } => Some(Shape::PlayerCount),
            _ => None,
        }
    }
}

/// Classify a single raw line.
pub fn classify(line: &str) -> ClassifiedEvent {
    if let Some(err) = password_prompt(line) {
        return ClassifiedEvent::PasswordError(err);
    }

    let tokens = tokenize(line);
    if is_shutdown(&tokens) {
        return ClassifiedEvent::ShutdownNotice;
    }

    if line.starts_with("Day") {
        return match day_info(line) {
            Some(event) => event,
            None => ClassifiedEvent::Unclassified {
                raw: line.to_string(),
            },
        };
    }
    if line.starts_with("Game version:") {
        return ClassifiedEvent::VersionInfo {
            text: line.to_string(),
        };
    }
    if line.starts_with("Total of ") {
        return ClassifiedEvent::PlayerCount {
            text: line.to_string(),
        };
    }

    match line_type(&tokens) {
        Some("Chat") => chat_from_tokens(&tokens),
        Some("GMSG") => ClassifiedEvent::GlobalMessage {
            body: body_of(&tokens),
        },
        _ => ClassifiedEvent::Unclassified {
            raw: line.to_string(),
        },
    }
}

/// Checks a whole data chunk (or line) against the two password re-prompt messages.
pub fn password_prompt(chunk: &str) -> Option<PasswordError> {
    match chunk {
        PASSWORD_PROMPT => Some(PasswordError::Prompt),
        PASSWORD_INCORRECT => Some(PasswordError::Incorrect),
        _ => None,
    }
}

pub fn tokenize(line: &str) -> Vec<&str> {
    line.split(' ').collect()
}

/// Token 3 with `:` removed, e.g. `Chat`, `GMSG`, `INF`.
pub fn line_type<'a>(tokens: &[&'a str]) -> Option<&'a str> {
    tokens.get(3).map(|t| t.trim_end_matches(':'))
}

/// Build a chat event from tokens, regardless of what the type token says.
///
/// Used directly by the reassembler for merged continuation lines.
pub fn chat_from_tokens<S: AsRef<str>>(tokens: &[S]) -> ClassifiedEvent {
    let joined = body_of(tokens);
    let speaker = SPEAKER
        .captures(&joined)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    let body = SOURCE_ANNOTATION.replace(&joined, "").into_owned();

    let is_global = [10, 11]
        .iter()
        .any(|&i| tokens.get(i).is_some_and(|t| t.as_ref() == GLOBAL_TARGET));

    ClassifiedEvent::Chat {
        speaker,
        body,
        private: !is_global,
    }
}

/// Days until the next horde night. Hordes fall on every seventh day.
pub fn horde_countdown(day: u64) -> u64 {
    (day.div_euclid(7) + 1) * 7 - day
}

fn day_info(line: &str) -> Option<ClassifiedEvent> {
    let head = line.split(',').next().unwrap_or_default();
    let day = head.replacen("Day ", "", 1).trim().parse::<u64>().ok()?;
    Some(ClassifiedEvent::DayInfo {
        day,
        horde_countdown: horde_countdown(day),
        line: line.trim_end_matches('\r').to_string(),
    })
}

fn body_of<S: AsRef<str>>(tokens: &[S]) -> String {
    let words: Vec<&str> = tokens.iter().skip(4).map(|t| t.as_ref()).collect();
    words.join(" ").trim_end_matches('\r').to_string()
}

fn is_shutdown(tokens: &[&str]) -> bool {
    matches!(
        tokens.get(2..5),
        Some([a, b, c]) if *a == "INF" && *b == "[NET]" && c.trim_end_matches('\r') == "ServerShutdown"
    )
}
