//! IRC message codec for tokio.
//!
//! Inbound lines are split on `\n`, decoded as UTF-8 with a Windows-1252
//! fallback, and parsed into [`Message`]s. A line that is too long or does
//! not parse is logged and skipped; the stream stays usable. Outbound
//! messages are serialized with a CRLF terminator.

use std::borrow::Cow;

use bytes::BytesMut;
use encoding::{UTF_8, WINDOWS_1252};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::{self, ProtocolError};
use crate::message::Message;

/// Maximum line length (8191 bytes, tags included).
pub const MAX_IRC_LINE_LEN: usize = 8191;

/// Tokio codec for encoding/decoding IRC messages.
pub struct IrcCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
    /// Dropping the rest of an overlong line.
    discarding: bool,
}

impl IrcCodec {
    /// Create a codec accepting lines up to [`MAX_IRC_LINE_LEN`] bytes.
    pub fn new() -> Self {
        Self::with_max_len(MAX_IRC_LINE_LEN)
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    /// Turn one raw line into a message, or `None` if it must be skipped.
    fn parse_line(&self, raw: &[u8]) -> Option<Message> {
        if raw.len() > self.max_len {
            warn!(len = raw.len(), limit = self.max_len, "Skipping overlong line");
            return None;
        }

        let text = decode_text(raw);
        let line = text.trim_end_matches(['\r', '\n']);
        // Some servers pad bursts with blank lines.
        if line.trim().is_empty() {
            return None;
        }

        match line.parse::<Message>() {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(line = %line, error = %e, "Skipping unparseable line");
                None
            }
        }
    }
}

impl Default for IrcCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// UTF-8 when valid, otherwise the usual IRC fallback of Windows-1252.
fn decode_text(raw: &[u8]) -> Cow<'_, str> {
    match UTF_8.decode_without_bom_handling_and_without_replacement(raw) {
        Some(text) => text,
        None => WINDOWS_1252.decode_without_bom_handling(raw).0,
    }
}

impl Decoder for IrcCodec {
    type Item = Message;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                if src.len() > self.max_len {
                    if !self.discarding {
                        warn!(limit = self.max_len, "Skipping overlong line");
                    }
                    src.clear();
                    self.discarding = true;
                    self.next_index = 0;
                } else {
                    self.next_index = src.len();
                }
                return Ok(None);
            };

            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if let Some(message) = self.parse_line(&line) {
                return Ok(Some(message));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> error::Result<Option<Message>> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let line = src.split_to(src.len());
        self.next_index = 0;
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        Ok(self.parse_line(&line))
    }
}

impl Encoder<Message> for IrcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> error::Result<()> {
        let line = msg.to_string();
        if line.contains(['\r', '\n']) {
            return Err(ProtocolError::IllegalLineBreak);
        }
        if line.len() + 2 > self.max_len {
            return Err(ProtocolError::LineTooLong {
                limit: self.max_len,
            });
        }
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}
