//! Access-list audit: `ACCESS <channel> LIST`.
//!
//! Atheme answers with one numbered line per entry,
//! `1    alice    +AFRefiorstv (FOUNDER) [modified 2 days ago]`, followed by
//! `End of #channel FLAGS listing.`

use chanaudit_proto::{FormattedStringExt, Message};

use super::{not_registered, service_notice, unregistered_key};
use crate::error::ExtractError;
use crate::matching::ParamMatcher;
use crate::session::{Action, ProtocolConfig, RequestContext};

/// Joined between entry names.
pub const SEPARATOR: &str = ", ";

fn request(ctx: &RequestContext, key: &str) -> Message {
    ctx.command(&["ACCESS", key, "LIST"])
}

/// Build the access-list protocol.
///
/// Entries whose name is in `bypass` (network staff groups present on every
/// channel) are left out and do not count as data.
pub fn access_list(
    service: &str,
    bypass: Vec<String>,
    default_value: &str,
) -> Result<ProtocolConfig, regex::Error> {
    Ok(ProtocolConfig::new("access", request, default_value)
        .rule(
            service_notice("entry", service, ParamMatcher::regex(r"^[0-9]+\s+[^\s]+\s+")?),
            Action::Append {
                extract: access_entry_name,
                separator: SEPARATOR,
                skip: bypass,
            },
        )
        .rule(
            service_notice(
                "end",
                service,
                ParamMatcher::regex(r"End of .* FLAGS listing\.")?,
            ),
            Action::Finish {
                subject: Some(listing_key),
            },
        )
        .rule(
            not_registered(service)?,
            Action::Finish {
                subject: Some(unregistered_key),
            },
        )
        .rule(
            service_notice(
                "not_authorized",
                service,
                ParamMatcher::regex(r"You are not authorized to perform this operation\.")?,
            ),
            Action::Finish { subject: None },
        ))
}

/// Extract the entry name from a numbered access-list line.
///
/// The line must be `<digits><ws><name><ws>...`; anything else is rejected.
pub fn access_entry_name(text: &str) -> Result<String, ExtractError> {
    let not_entry = || ExtractError::NotAnEntry(text.to_string());

    let rest = text.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == text.len() || !rest.starts_with(char::is_whitespace) {
        return Err(not_entry());
    }

    let rest = rest.trim_start();
    let end = rest.find(char::is_whitespace).ok_or_else(not_entry)?;
    Ok(rest[..end].to_string())
}

/// Channel named by `End of #chan FLAGS listing.`
pub fn listing_key(text: &str) -> Result<String, ExtractError> {
    text.strip_formatting()
        .strip_prefix("End of ")
        .and_then(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .ok_or_else(|| ExtractError::NoSubject(text.to_string()))
}
