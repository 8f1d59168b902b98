//! # chanaudit-proto
//!
//! The IRC wire layer used by `chanaudit`: an owned message model with a
//! nom-based line parser, RFC 1459 case mapping, formatting-code stripping,
//! and (with the default `tokio` feature) a line codec and a framed
//! TCP/TLS client transport.
//!
//! ```rust
//! use chanaudit_proto::{irc_eq, FormattedStringExt, Message};
//!
//! let msg: Message = ":chanserv!ChanServ@services. NOTICE bot :*** \x02End of Info\x02 ***"
//!     .parse()
//!     .unwrap();
//! assert!(irc_eq(msg.source_nickname().unwrap(), "ChanServ"));
//! assert_eq!(msg.trailing().unwrap().strip_formatting(), "*** End of Info ***");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod casemap;
pub mod colors;
pub mod error;
#[cfg(feature = "tokio")]
pub mod irc;
pub mod message;
pub mod prefix;
#[cfg(feature = "tokio")]
pub mod transport;

pub use self::casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use self::colors::FormattedStringExt;
pub use self::error::{MessageParseError, ProtocolError};
#[cfg(feature = "tokio")]
pub use self::irc::{IrcCodec, MAX_IRC_LINE_LEN};
pub use self::message::{Message, Tag};
pub use self::prefix::Prefix;
#[cfg(feature = "tokio")]
pub use self::transport::{Transport, TransportReadError};
