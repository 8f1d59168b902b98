//! Error types for the query bot.
//!
//! Per-key conditions reported by the service (not registered, not
//! authorized) are not errors: they resolve to the protocol's default value.
//! Only failures of the connection itself abort a session.

use chanaudit_proto::{ProtocolError, TransportReadError};
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the line transport underneath a session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read failed: {0}")]
    Read(#[from] TransportReadError),

    #[error("write failed: {0}")]
    Write(#[from] ProtocolError),
}

/// Errors that abort a whole query session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error while querying {key}: {source}")]
    Transport {
        key: String,
        #[source]
        source: TransportError,
    },

    #[error("connection closed while querying {key}")]
    ConnectionClosed { key: String },

    #[error("protocol {0} has no terminal pattern")]
    NoTerminalPattern(&'static str),
}

impl SessionError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::ConnectionClosed { .. } => "connection_closed",
            Self::NoTerminalPattern(_) => "no_terminal_pattern",
        }
    }
}

/// A data reply matched its pattern but lacked the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("missing {0:?} separator")]
    MissingSeparator(&'static str),

    #[error("expected a numbered entry, got {0:?}")]
    NotAnEntry(String),

    #[error("message has no text parameter")]
    NoText,

    #[error("no key named in {0:?}")]
    NoSubject(String),
}

/// Errors from establishing the live IRC connection.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TLS server name: {0}")]
    InvalidServerName(String),

    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("registration failed: {0}")]
    Registration(String),

    #[error("registration timed out after {0} seconds")]
    RegistrationTimeout(u64),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors reading the key list or writing the result file.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can stop a run after configuration is loaded.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("invalid reply pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AuditError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Pattern(_) => "pattern",
            Self::Client(_) => "client",
            Self::Session(e) => e.error_code(),
        }
    }
}
