//! Nom-based IRC line parser.
//!
//! Produces borrowed slices into the input; [`super::parse`] turns them into
//! an owned [`super::Message`].

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

/// RFC 2812 parameter limit.
const MAX_PARAMS: usize = 15;

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command name (1*letter or 3digit).
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Split the remainder after the command into parameters.
///
/// Runs of spaces count as a single separator; a `:`-prefixed parameter
/// swallows the rest of the line.
fn parse_params(input: &str) -> (&str, SmallVec<[&str; MAX_PARAMS]>) {
    let mut params: SmallVec<[&str; MAX_PARAMS]> = SmallVec::new();
    let mut rest = input;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        if params.len() >= MAX_PARAMS {
            break;
        }

        while rest.as_bytes().first() == Some(&b' ') {
            rest = &rest[1..];
        }

        if rest.is_empty() || rest.starts_with('\r') || rest.starts_with('\n') {
            break;
        }

        if let Some(b':') = rest.as_bytes().first().copied() {
            let after_colon = &rest[1..];
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// A parsed IRC line with borrowed string slices.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: SmallVec<[&'a str; MAX_PARAMS]>,
}

impl<'a> ParsedMessage<'a> {
    /// Parse a line, reporting the byte offset where parsing stopped on failure.
    pub fn parse(input: &'a str) -> Result<Self, (usize, ErrorKind)> {
        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err((input.len() - e.input.len(), e.code))
            }
            Err(nom::Err::Incomplete(_)) => Err((input.len(), ErrorKind::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let parsed =
            ParsedMessage::parse("@time=2024-01-01T00:00:00Z :ChanServ!s@services. NOTICE bot :1 alice +AF")
                .unwrap();
        assert_eq!(parsed.tags, Some("time=2024-01-01T00:00:00Z"));
        assert_eq!(parsed.prefix, Some("ChanServ!s@services."));
        assert_eq!(parsed.command, "NOTICE");
        assert_eq!(parsed.params.as_slice(), &["bot", "1 alice +AF"]);
    }

    #[test]
    fn test_collapses_spaces() {
        let parsed = ParsedMessage::parse("PING   a   b").unwrap();
        assert_eq!(parsed.params.as_slice(), &["a", "b"]);
    }

    #[test]
    fn test_empty_trailing() {
        let parsed = ParsedMessage::parse("NOTICE bot :").unwrap();
        assert_eq!(parsed.params.as_slice(), &["bot", ""]);
    }

    #[test]
    fn test_rejects_mixed_command() {
        assert!(ParsedMessage::parse("PR1VMSG #a :b").is_err());
        assert!(ParsedMessage::parse("01 bot :x").is_err());
    }

    #[test]
    fn test_param_limit() {
        let line = format!("CMD {}", (0..20).map(|i| i.to_string()).collect::<Vec<_>>().join(" "));
        let parsed = ParsedMessage::parse(&line).unwrap();
        assert_eq!(parsed.params.len(), MAX_PARAMS);
    }
}
