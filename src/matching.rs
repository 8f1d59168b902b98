//! Reply classification.
//!
//! A [`Pattern`] is a pure predicate over an inbound [`Message`]: a required
//! command, one matcher per leading parameter, and an optional sender
//! constraint. A [`PatternSet`] evaluates its patterns in declaration order
//! and reports the first that holds.

use chanaudit_proto::{irc_eq, FormattedStringExt, Message};
use regex::Regex;

/// Matcher for a single message parameter.
#[derive(Debug, Clone)]
pub enum ParamMatcher {
    /// Always matches.
    Any,
    /// Exact equality.
    Literal(String),
    /// Regex search (not anchored unless the expression anchors itself).
    Regex(Regex),
    /// Exact equality after stripping IRC formatting codes.
    Formatless(String),
    /// Starts-with after stripping IRC formatting codes.
    Prefix(String),
}

impl ParamMatcher {
    /// Compile a regex matcher.
    pub fn regex(expr: &str) -> Result<Self, regex::Error> {
        Regex::new(expr).map(ParamMatcher::Regex)
    }

    pub fn matches(&self, param: &str) -> bool {
        match self {
            ParamMatcher::Any => true,
            ParamMatcher::Literal(text) => param == text,
            ParamMatcher::Regex(re) => re.is_match(param),
            ParamMatcher::Formatless(text) => param.strip_formatting() == text.as_str(),
            ParamMatcher::Prefix(text) => param.strip_formatting().starts_with(text.as_str()),
        }
    }
}

/// Constraint on who sent a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderMatcher {
    /// Sender nickname, compared with rfc1459 case mapping.
    Nick(String),
}

impl SenderMatcher {
    pub fn matches(&self, message: &Message) -> bool {
        match self {
            SenderMatcher::Nick(expected) => message
                .source_nickname()
                .is_some_and(|nick| irc_eq(nick, expected)),
        }
    }
}

/// A named predicate over inbound messages.
#[derive(Debug, Clone)]
pub struct Pattern {
    name: String,
    command: String,
    params: Vec<ParamMatcher>,
    source: Option<SenderMatcher>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            params: Vec::new(),
            source: None,
        }
    }

    /// Append a matcher for the next parameter position.
    #[must_use]
    pub fn param(mut self, matcher: ParamMatcher) -> Self {
        self.params.push(matcher);
        self
    }

    /// Require the message to come from `sender`.
    #[must_use]
    pub fn source(mut self, sender: SenderMatcher) -> Self {
        self.source = Some(sender);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter constrained by the last matcher, or the trailing
    /// parameter for a pattern without param matchers.
    pub fn text<'m>(&self, message: &'m Message) -> Option<&'m str> {
        match self.params.len() {
            0 => message.trailing(),
            n => message.param(n - 1),
        }
    }

    /// Check the message against this pattern.
    ///
    /// A message needs at least as many parameters as there are matchers;
    /// parameters past the last matcher are unconstrained.
    pub fn matches(&self, message: &Message) -> bool {
        if !message.command.eq_ignore_ascii_case(&self.command) {
            return false;
        }
        if message.params.len() < self.params.len() {
            return false;
        }
        if let Some(source) = &self.source
            && !source.matches(message)
        {
            return false;
        }
        self.params
            .iter()
            .zip(&message.params)
            .all(|(matcher, param)| matcher.matches(param))
    }
}

/// Ordered collection of patterns; earlier patterns win.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    /// Return the first pattern matching `message`, if any.
    pub fn classify(&self, message: &Message) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.matches(message))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl FromIterator<Pattern> for PatternSet {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}
