//! Concrete ChanServ query protocols.
//!
//! Reply texts follow Atheme, the services package behind the networks
//! these audits run against.

pub mod access;
pub mod mlock;

use std::fmt;
use std::path::Path;

use chanaudit_proto::FormattedStringExt;

use crate::config::Config;
use crate::error::ExtractError;
use crate::matching::{ParamMatcher, Pattern, SenderMatcher};
use crate::session::ProtocolConfig;

pub use access::{access_entry_name, access_list, listing_key};
pub use mlock::{info_key, mode_lock, mode_lock_value};

/// Which audit to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Protocol {
    /// `ACCESS <channel> LIST`: who is on each channel's access list.
    Access,
    /// `INFO <channel>`: each channel's mode lock.
    Mlock,
}

impl Protocol {
    /// Instantiate the protocol from its config section.
    pub fn build(self, config: &Config) -> Result<ProtocolConfig, regex::Error> {
        let service = &config.query.service;
        match self {
            Protocol::Access => access_list(
                service,
                config.access.bypass.clone(),
                &config.access.default_value,
            ),
            Protocol::Mlock => mode_lock(service, &config.mlock.default_value),
        }
    }

    /// Configured result file.
    pub fn output(self, config: &Config) -> &Path {
        match self {
            Protocol::Access => &config.access.output,
            Protocol::Mlock => &config.mlock.output,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Access => write!(f, "access"),
            Protocol::Mlock => write!(f, "mlock"),
        }
    }
}

/// `NOTICE <any> <text>` from the service, with a matcher on the text.
pub(crate) fn service_notice(name: &str, service: &str, text: ParamMatcher) -> Pattern {
    Pattern::new(name, "NOTICE")
        .param(ParamMatcher::Any)
        .param(text)
        .source(SenderMatcher::Nick(service.to_string()))
}

/// Reply sent for any query about an unregistered channel.
pub(crate) fn not_registered(service: &str) -> Result<Pattern, regex::Error> {
    Ok(service_notice(
        "not_registered",
        service,
        ParamMatcher::regex(r"is not registered\.")?,
    ))
}

/// Channel named by `#chan is not registered.`
pub fn unregistered_key(text: &str) -> Result<String, ExtractError> {
    text.strip_formatting()
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| ExtractError::NoSubject(text.to_string()))
}
