//! Framed IRC client transport over TCP and TLS.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_util::codec::Framed;
use tracing::warn;

use crate::error::ProtocolError;
use crate::irc::IrcCodec;
use crate::Message;

/// Errors that can occur when reading from a transport.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportReadError {
    /// An I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A protocol error occurred.
    #[error("transport protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// IRC client transport.
#[allow(clippy::large_enum_variant)]
#[non_exhaustive]
pub enum Transport {
    /// Plain TCP transport.
    Tcp {
        /// The framed codec for TCP.
        framed: Framed<TcpStream, IrcCodec>,
    },
    /// Client-side TLS-encrypted transport.
    ClientTls {
        /// The framed codec for client-side TLS.
        framed: Framed<TlsStream<TcpStream>, IrcCodec>,
    },
}

impl Transport {
    /// Create a new TCP transport from a connected stream.
    pub fn tcp(stream: TcpStream) -> Self {
        if let Err(e) = Self::enable_keepalive(&stream) {
            warn!("failed to enable TCP keepalive: {}", e);
        }

        Self::Tcp {
            framed: Framed::new(stream, IrcCodec::new()),
        }
    }

    fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
        use socket2::{SockRef, TcpKeepalive};
        use std::time::Duration;

        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));

        sock.set_tcp_keepalive(&keepalive)
    }

    /// Create a new client-side TLS transport from an established TLS stream.
    ///
    /// ```ignore
    /// let tcp_stream = TcpStream::connect("irc.libera.chat:6697").await?;
    /// let tls_stream = connector.connect(server_name, tcp_stream).await?;
    /// let transport = Transport::client_tls(tls_stream);
    /// ```
    pub fn client_tls(stream: TlsStream<TcpStream>) -> Self {
        Self::ClientTls {
            framed: Framed::new(stream, IrcCodec::new()),
        }
    }

    /// Check if this transport uses TLS encryption.
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::ClientTls { .. })
    }

    /// Read the next IRC message from the transport.
    ///
    /// Returns `Ok(None)` when the connection is closed.
    pub async fn read_message(&mut self) -> Result<Option<Message>, TransportReadError> {
        macro_rules! read_framed {
            ($framed:expr) => {
                match $framed.next().await {
                    Some(Ok(msg)) => Ok(Some(msg)),
                    Some(Err(e)) => Err(TransportReadError::from(e)),
                    None => Ok(None),
                }
            };
        }

        match self {
            Transport::Tcp { framed } => read_framed!(framed),
            Transport::ClientTls { framed } => read_framed!(framed),
        }
    }

    /// Write an IRC message to the transport and flush it.
    pub async fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        match self {
            Transport::Tcp { framed } => framed.send(message.clone()).await,
            Transport::ClientTls { framed } => framed.send(message.clone()).await,
        }
    }
}
