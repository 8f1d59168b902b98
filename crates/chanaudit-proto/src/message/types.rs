use crate::prefix::Prefix;

/// An owned IRC message.
///
/// The command is kept as its wire token (`NOTICE`, `001`, ...) rather than
/// a typed enum: callers of this crate match on replies by command name and
/// parameter text, so a structured command table would only be in the way.
///
/// # Example
///
/// ```
/// use chanaudit_proto::Message;
///
/// let msg: Message = ":ChanServ!ChanServ@services. NOTICE bot :End of Info"
///     .parse()
///     .unwrap();
/// assert_eq!(msg.command, "NOTICE");
/// assert_eq!(msg.source_nickname(), Some("ChanServ"));
/// assert_eq!(msg.trailing(), Some("End of Info"));
/// ```
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Message {
    /// IRCv3 message tags (e.g., `time`, `msgid`).
    pub tags: Option<Vec<Tag>>,
    /// Message prefix/source (e.g., `nick!user@host`).
    pub prefix: Option<Prefix>,
    /// Command name, uppercased, or a three-digit numeric.
    pub command: String,
    /// Command parameters, trailing parameter last.
    pub params: Vec<String>,
}

/// A single IRCv3 tag: key and optional value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Tag(pub String, pub Option<String>);

impl Message {
    /// Create a new message without tags or prefix.
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Message {
            tags: None,
            prefix: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    fn build(command: &str, params: Vec<String>) -> Self {
        Message {
            tags: None,
            prefix: None,
            command: command.to_string(),
            params,
        }
    }

    /// Attach a prefix to this message.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<Prefix>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Get the nickname from the message prefix, if present.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Get the parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Get the last parameter (usually the free-text part of the message).
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// If this message is a three-digit numeric reply, return its code.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Get the value of an IRCv3 tag by key.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .as_ref()?
            .iter()
            .find(|Tag(k, _)| k == key)
            .and_then(|Tag(_, v)| v.as_deref())
    }

    /// Create a PRIVMSG message to a target with text.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::build("PRIVMSG", vec![target.into(), text.into()])
    }

    /// Create a NOTICE message to a target with text.
    #[must_use]
    pub fn notice(target: impl Into<String>, text: impl Into<String>) -> Self {
        Message::build("NOTICE", vec![target.into(), text.into()])
    }

    /// Create a PASS message.
    #[must_use]
    pub fn pass(password: impl Into<String>) -> Self {
        Message::build("PASS", vec![password.into()])
    }

    /// Create a NICK message.
    #[must_use]
    pub fn nick(nickname: impl Into<String>) -> Self {
        Message::build("NICK", vec![nickname.into()])
    }

    /// Create a USER message (mode `0`, unused field `*`).
    #[must_use]
    pub fn user(username: impl Into<String>, realname: impl Into<String>) -> Self {
        Message::build(
            "USER",
            vec![username.into(), "0".to_string(), "*".to_string(), realname.into()],
        )
    }

    /// Create a PONG answering the given PING token.
    #[must_use]
    pub fn pong(token: impl Into<String>) -> Self {
        Message::build("PONG", vec![token.into()])
    }

    /// Create a QUIT message with an optional reason.
    #[must_use]
    pub fn quit(reason: Option<&str>) -> Self {
        Message::build("QUIT", reason.into_iter().map(str::to_string).collect())
    }
}
