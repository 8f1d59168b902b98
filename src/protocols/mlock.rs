//! Mode-lock audit: `INFO <channel>`.
//!
//! The INFO block opens with `Information on #chan:` and ends with a
//! formatted `*** End of Info ***`. Of its lines only `Mode lock   : +ntc`
//! is kept.

use chanaudit_proto::{FormattedStringExt, Message};

use super::{not_registered, service_notice, unregistered_key};
use crate::error::ExtractError;
use crate::matching::ParamMatcher;
use crate::session::{Action, ProtocolConfig, RequestContext};

const SEPARATOR: &str = ": ";

fn request(ctx: &RequestContext, key: &str) -> Message {
    ctx.command(&["INFO", key])
}

/// Build the mode-lock protocol.
pub fn mode_lock(service: &str, default_value: &str) -> Result<ProtocolConfig, regex::Error> {
    Ok(ProtocolConfig::new("mlock", request, default_value)
        .rule(
            service_notice(
                "info",
                service,
                ParamMatcher::Prefix("Information on ".to_string()),
            ),
            Action::Begin { subject: info_key },
        )
        .rule(
            service_notice("mlock", service, ParamMatcher::regex(r"Mode lock")?),
            Action::Replace {
                extract: mode_lock_value,
            },
        )
        .rule(
            service_notice(
                "end",
                service,
                ParamMatcher::Formatless("*** End of Info ***".to_string()),
            ),
            Action::Finish { subject: None },
        )
        .rule(
            not_registered(service)?,
            Action::Finish {
                subject: Some(unregistered_key),
            },
        ))
}

/// Extract the value after the first `": "` of a mode-lock line.
pub fn mode_lock_value(text: &str) -> Result<String, ExtractError> {
    text.split_once(SEPARATOR)
        .map(|(_, value)| value.trim().to_string())
        .ok_or(ExtractError::MissingSeparator(SEPARATOR))
}

/// Channel named by `Information on #chan:`
pub fn info_key(text: &str) -> Result<String, ExtractError> {
    text.strip_formatting()
        .strip_prefix("Information on ")
        .map(|rest| rest.trim_end().trim_end_matches(':').trim())
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ExtractError::NoSubject(text.to_string()))
}
