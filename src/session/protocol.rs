//! Protocol description consumed by the query session.
//!
//! A protocol bundles how to phrase a request for a key, which replies are
//! relevant (a [`PatternSet`]), what to do with each (an [`Action`] per
//! pattern name), and the value recorded when a key yields no data.

use std::collections::HashMap;

use chanaudit_proto::Message;
use serde::Deserialize;

use crate::error::ExtractError;
use crate::matching::{Pattern, PatternSet};

/// Pure extraction from a reply's text parameter.
pub type Extractor = fn(&str) -> Result<String, ExtractError>;

/// Builds the request message for one key.
pub type RequestBuilder = fn(&RequestContext, &str) -> Message;

/// How requests reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStyle {
    /// Server-side alias command: `CHANSERV INFO #chan`.
    #[default]
    Alias,
    /// Private message: `PRIVMSG ChanServ :INFO #chan`.
    Privmsg,
}

/// Addressing details shared by every request of a session.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub service: String,
    pub style: RequestStyle,
}

impl RequestContext {
    pub fn new(service: impl Into<String>, style: RequestStyle) -> Self {
        Self {
            service: service.into(),
            style,
        }
    }

    /// Phrase a service command (`["ACCESS", "#chan", "LIST"]`) as a message.
    pub fn command(&self, words: &[&str]) -> Message {
        match self.style {
            RequestStyle::Alias => {
                Message::new(self.service.to_ascii_uppercase(), words.iter().copied())
            }
            RequestStyle::Privmsg => Message::privmsg(&self.service, words.join(" ")),
        }
    }
}

/// What a matched reply does to the key's aggregate.
#[derive(Debug, Clone)]
pub enum Action {
    /// Extract a token and append it, `separator`-joined. Tokens listed in
    /// `skip` are dropped and do not count as data.
    Append {
        extract: Extractor,
        separator: &'static str,
        skip: Vec<String>,
    },
    /// Extract a value and overwrite the aggregate with it.
    Replace { extract: Extractor },
    /// Opens the reply block of the key named by `subject`. In a protocol
    /// with a `Begin` rule, data replies count only inside the current
    /// key's block.
    Begin { subject: Extractor },
    /// No more replies will come for the key. A `subject` naming another
    /// key marks the reply as the late end of that key's block instead.
    Finish { subject: Option<Extractor> },
}

/// Effect of applying a data action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Stored,
    Skipped,
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Finish { .. })
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Action::Append { .. } | Action::Replace { .. })
    }

    /// Apply a data action to `aggregate`. Block markers are a no-op.
    pub fn apply(&self, aggregate: &mut Aggregate, text: &str) -> Result<Applied, ExtractError> {
        match self {
            Action::Append {
                extract,
                separator,
                skip,
            } => {
                let token = extract(text)?;
                if skip.iter().any(|s| *s == token) {
                    return Ok(Applied::Skipped);
                }
                aggregate.append(&token, separator);
                Ok(Applied::Stored)
            }
            Action::Replace { extract } => {
                aggregate.replace(extract(text)?);
                Ok(Applied::Stored)
            }
            Action::Begin { .. } | Action::Finish { .. } => Ok(Applied::Skipped),
        }
    }
}

/// Per-key accumulator. Empty until the first data reply arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    value: Option<String>,
}

impl Aggregate {
    pub fn append(&mut self, token: &str, separator: &str) {
        match &mut self.value {
            Some(value) => {
                value.push_str(separator);
                value.push_str(token);
            }
            None => self.value = Some(token.to_string()),
        }
    }

    pub fn replace(&mut self, value: String) {
        self.value = Some(value);
    }

    pub fn has_data(&self) -> bool {
        self.value.is_some()
    }

    /// Final value, or `default` if no data was ever stored.
    pub fn finish(self, default: &str) -> String {
        self.value.unwrap_or_else(|| default.to_string())
    }
}

/// A complete query protocol: request phrasing, reply patterns, handler
/// table and default value.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    name: &'static str,
    request: RequestBuilder,
    patterns: PatternSet,
    actions: HashMap<String, Action>,
    default_value: String,
}

impl ProtocolConfig {
    pub fn new(name: &'static str, request: RequestBuilder, default_value: impl Into<String>) -> Self {
        Self {
            name,
            request,
            patterns: PatternSet::new(),
            actions: HashMap::new(),
            default_value: default_value.into(),
        }
    }

    /// Add a reply pattern and its action. Patterns are tried in the order
    /// they were added.
    #[must_use]
    pub fn rule(mut self, pattern: Pattern, action: Action) -> Self {
        self.actions.insert(pattern.name().to_string(), action);
        self.patterns.push(pattern);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn default_value(&self) -> &str {
        &self.default_value
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn request(&self, ctx: &RequestContext, key: &str) -> Message {
        (self.request)(ctx, key)
    }

    /// Classify `message`, returning the matched pattern and its action.
    pub fn classify(&self, message: &Message) -> Option<(&Pattern, &Action)> {
        let pattern = self.patterns.classify(message)?;
        let action = self.actions.get(pattern.name())?;
        Some((pattern, action))
    }

    pub fn has_terminal(&self) -> bool {
        self.actions.values().any(Action::is_terminal)
    }

    /// Whether replies are grouped into per-key blocks opened by a `Begin` rule.
    pub fn has_begin(&self) -> bool {
        self.actions
            .values()
            .any(|action| matches!(action, Action::Begin { .. }))
    }
}
