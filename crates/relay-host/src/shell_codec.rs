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

//! Codec for the game server's remote console.
//!
//! The console is not a line protocol in any strict sense: the relay handles output a chunk at a
//! time, where a chunk is everything up to the last newline received so far. Password prompts are
//! followed by a pair of NUL bytes, which stay attached to the chunk they end.

use std::io;

use bytes::BytesMut;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Past this, a chunk with no newline is treated as a broken stream.
pub const MAX_CHUNK_LENGTH: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum ShellCodecError {
    #[error("maximum chunk length exceeded")]
    MaxChunkLengthExceeded,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default)]
pub struct ShellCodec {
    /// Where to resume scanning for a newline.
    next_index: usize,
}

impl ShellCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_chunk(&mut self, buf: &mut BytesMut, end: usize) -> String {
        self.next_index = 0;
        let chunk = buf.split_to(end);
        String::from_utf8_lossy(&chunk).into_owned()
    }
}

impl Decoder for ShellCodec {
    type Item = String;
    type Error = ShellCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(offset) = buf[self.next_index..].iter().rposition(|b| *b == b'\n') else {
            if buf.len() > MAX_CHUNK_LENGTH {
                return Err(ShellCodecError::MaxChunkLengthExceeded);
            }
            self.next_index = buf.len();
            return Ok(None);
        };

        let mut end = self.next_index + offset + 1;
        while buf.get(end) == Some(&0) {
            end += 1;
        }
        Ok(Some(self.take_chunk(buf, end)))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(chunk) = self.decode(buf)? {
            return Ok(Some(chunk));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let end = buf.len();
        Ok(Some(self.take_chunk(buf, end)))
    }
}

/// Commands and the password are sent as single lines.
impl Encoder<String> for ShellCodec {
    type Error = ShellCodecError;

    fn encode(&mut self, line: String, buf: &mut BytesMut) -> Result<(), Self::Error> {
        buf.reserve(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horde_relay::classify::PASSWORD_PROMPT;

    #[test]
    fn test_chunk_ends_at_last_newline() {
        let mut codec = ShellCodec::new();
        let mut buf = BytesMut::from("Day 3, 07:00\r\nTotal of 2 in the game\r\nDay");

        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("Day 3, 07:00\r\nTotal of 2 in the game\r\n")
        );
        assert_eq!(&buf[..], b"Day");
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b" 4, 07:00\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("Day 4, 07:00\r\n")
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_password_prompt_keeps_trailing_nuls() {
        let mut codec = ShellCodec::new();
        let mut buf = BytesMut::from(PASSWORD_PROMPT);
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some(PASSWORD_PROMPT)
        );
    }

    #[test]
    fn test_eof_flushes_partial_chunk() {
        let mut codec = ShellCodec::new();
        let mut buf = BytesMut::from("bye");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("bye"));
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_encoding_appends_crlf() {
        let mut codec = ShellCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("lp".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"lp\r\n");
    }
}
