//! `FromStr` for [`Message`].

use std::str::FromStr;

use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

use super::nom_parser::ParsedMessage;
use super::tags::parse_tags_string;
use super::types::Message;

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Message, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let parsed = ParsedMessage::parse(line).map_err(|(position, kind)| {
            let cause = if position >= line.len() || kind == nom::error::ErrorKind::AlphaNumeric {
                MessageParseError::InvalidCommand
            } else {
                MessageParseError::ParseContext {
                    position,
                    context: format!("{:?}", kind),
                }
            };
            ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause,
            }
        })?;

        Ok(Message {
            tags: parsed.tags.map(parse_tags_string),
            prefix: parsed.prefix.map(Prefix::parse),
            command: parsed.command.to_ascii_uppercase(),
            params: parsed.params.iter().map(|p| (*p).to_owned()).collect(),
        })
    }
}
