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

//! Re-joins chat lines the console transport cut in two.
//!
//! Some chat lines arrive cut off at exactly 64 characters with the rest on the following
//! line. This is a band-aid for that one transport quirk, not a general reassembly scheme:
//! a chat line of exactly that length is held back and glued to the next line that is not
//! the console's own log output.

use crate::classify::{ClassifiedEvent, chat_from_tokens, classify, line_type, tokenize};

/// Raw length, in UTF-16 code units, at which the transport truncates chat lines.
pub const TRUNCATED_LINE_LEN: usize = 64;

/// Whether the line carries the console's log header, so cannot be the tail of a cut line.
fn is_console_log(tokens: &[&str]) -> bool {
    matches!(line_type(tokens), Some("INF" | "NET"))
        || matches!(tokens.get(2), Some(&("INF" | "WRN" | "ERR" | "EXC")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    Event(ClassifiedEvent),
    /// The line was held back and will be merged with the next one.
    Buffering,
}

#[derive(Debug, Default)]
pub struct Reassembler {
    buffered: Option<Vec<String>>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_buffering(&self) -> bool {
        self.buffered.is_some()
    }

    pub fn feed(&mut self, line: &str) -> Feed {
        let tokens = tokenize(line);
        if !is_console_log(&tokens)
            && let Some(mut merged) = self.buffered.take()
        {
            merged.extend(tokens.into_iter().map(str::to_string));
            return Feed::Event(chat_from_tokens(&merged));
        }

        // Log lines seen while a fragment waits are classified on their own.
        if self.buffered.is_some() {
            return Feed::Event(classify(line));
        }

        if line_type(&tokens) == Some("Chat")
            && line.encode_utf16().count() == TRUNCATED_LINE_LEN
        {
            self.buffered = Some(tokens.into_iter().map(str::to_string).collect());
            return Feed::Buffering;
        }

        Feed::Event(classify(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "2024-01-01T00:00:00 1.4 INF Chat (from 'Steam_1', entity id '1', to 'Global'): hello there everyone";

    #[test]
    fn test_short_chat_passes_through() {
        let mut r = Reassembler::new();
        let line = "2024-01-01T00:00:00 1.0 INF Chat (from 'a', entity id '1', to 'Global'): hi";
        assert!(line.len() != TRUNCATED_LINE_LEN);
        assert_eq!(r.feed(line), Feed::Event(classify(line)));
        assert!(!r.is_buffering());
    }

    #[test]
    fn test_truncated_chat_is_merged_with_next_line() {
        // Cut just before a space; the transport drops the separator.
        let head = &FULL[..TRUNCATED_LINE_LEN];
        assert_eq!(&FULL[TRUNCATED_LINE_LEN..TRUNCATED_LINE_LEN + 1], " ");
        let tail = &FULL[TRUNCATED_LINE_LEN + 1..];

        let mut r = Reassembler::new();
        assert_eq!(r.feed(head), Feed::Buffering);
        assert!(r.is_buffering());
        assert_eq!(r.feed(tail), Feed::Event(classify(FULL)));
        assert!(!r.is_buffering());
    }

    #[test]
    fn test_non_chat_of_truncated_length_not_buffered() {
        let line = format!("{:<width$}", "Day 5, 12:00", width = TRUNCATED_LINE_LEN);
        let mut r = Reassembler::new();
        assert!(matches!(r.feed(&line), Feed::Event(_)));
    }

    #[test]
    fn test_continuation_always_forced_to_chat() {
        let head = &FULL[..TRUNCATED_LINE_LEN];
        let mut r = Reassembler::new();
        r.feed(head);
        match r.feed("Total of 3 in the game") {
            Feed::Event(ClassifiedEvent::Chat { .. }) => {}
            other => panic!("Expected merged chat, got {other:?}"),
        }
    }

    #[test]
    fn test_log_line_between_fragment_and_tail() {
        let head = &FULL[..TRUNCATED_LINE_LEN];
        let tail = &FULL[TRUNCATED_LINE_LEN + 1..];
        let log = "2024-01-01T00:00:01 1.5 INF Executing command 'lp' by Telnet from 127.0.0.1:5555";

        let mut r = Reassembler::new();
        assert_eq!(r.feed(head), Feed::Buffering);
        assert_eq!(r.feed(log), Feed::Event(classify(log)));
        assert!(r.is_buffering());
        assert_eq!(r.feed(tail), Feed::Event(classify(FULL)));
        assert!(!r.is_buffering());
    }

    #[test]
    fn test_length_counts_utf16_units() {
        // 62 ASCII characters plus one character outside the BMP: 63 chars, 64 units.
        let line = format!("{}\u{1F600}", &FULL[..62]);
        assert_eq!(line.chars().count(), TRUNCATED_LINE_LEN - 1);

        let mut r = Reassembler::new();
        assert_eq!(r.feed(&line), Feed::Buffering);

        let line = format!("{}\u{1F600}", &FULL[..63]);
        assert_eq!(line.chars().count(), TRUNCATED_LINE_LEN);
        let mut r = Reassembler::new();
        assert!(matches!(r.feed(&line), Feed::Event(_)));
    }
}
