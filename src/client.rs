//! Live connection to an IRC server.
//!
//! [`IrcConnection`] owns the framed transport, performs client
//! registration and implements [`LineTransport`] for the query session.
//! Server `PING`s are answered here and never reach the session.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chanaudit_proto::{Message, Transport};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, info, trace, warn};

use crate::config::{IdentityConfig, ServerConfig};
use crate::error::{ClientError, TransportError};
use crate::session::LineTransport;

/// Nickname retries on `ERR_NICKNAMEINUSE` before giving up.
const MAX_NICK_RETRIES: usize = 3;

const RPL_WELCOME: u16 = 1;
const ERR_NICKNAMEINUSE: u16 = 433;

/// A connected (and, after [`register`](Self::register), registered) client.
pub struct IrcConnection {
    transport: Transport,
    password: Option<String>,
    nickname: Option<String>,
}

impl IrcConnection {
    /// Open the TCP connection and, if configured, the TLS session.
    pub async fn connect(server: &ServerConfig) -> Result<Self, ClientError> {
        let addr = server.address();
        let tcp_stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.clone(),
                source,
            })?;

        let transport = if server.tls {
            let tls_stream = upgrade_to_tls(tcp_stream, &server.host, server.verify_cert).await?;
            Transport::client_tls(tls_stream)
        } else {
            Transport::tcp(tcp_stream)
        };
        info!(addr = %addr, tls = transport.is_tls(), "Connected");

        Ok(Self {
            transport,
            password: server.password.clone(),
            nickname: None,
        })
    }

    /// Register with the server and wait for `RPL_WELCOME`.
    pub async fn register(
        &mut self,
        identity: &IdentityConfig,
        limit: Duration,
    ) -> Result<(), ClientError> {
        match timeout(limit, self.handshake(identity)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::RegistrationTimeout(limit.as_secs())),
        }
    }

    /// Nickname the server welcomed us with, once registered.
    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    /// Send `QUIT`. Failures are logged, not returned.
    pub async fn quit(mut self, reason: &str) {
        if let Err(e) = self.send(Message::quit(Some(reason))).await {
            debug!(error = %e, "QUIT not delivered");
        }
    }

    async fn handshake(&mut self, identity: &IdentityConfig) -> Result<(), ClientError> {
        if let Some(password) = self.password.take() {
            self.send(Message::pass(password)).await?;
        }
        let mut nickname = identity.nickname.clone();
        self.send(Message::nick(nickname.clone())).await?;
        self.send(Message::user(identity.username(), identity.realname.clone()))
            .await?;

        let mut retries = 0;
        loop {
            let Some(message) = self.recv().await? else {
                return Err(ClientError::Registration(
                    "connection closed before welcome".to_string(),
                ));
            };

            match message.numeric() {
                Some(RPL_WELCOME) => {
                    let welcomed = message.param(0).unwrap_or(&nickname).to_string();
                    info!(nick = %welcomed, "Registered");
                    self.nickname = Some(welcomed);
                    return Ok(());
                }
                Some(ERR_NICKNAMEINUSE) => {
                    if retries == MAX_NICK_RETRIES {
                        return Err(ClientError::Registration(format!(
                            "nickname {} is in use",
                            nickname
                        )));
                    }
                    retries += 1;
                    nickname.push('_');
                    warn!(nick = %nickname, "Nickname in use, retrying");
                    self.send(Message::nick(nickname.clone())).await?;
                }
                _ if message.command == "ERROR" => {
                    let reason = message.trailing().unwrap_or("ERROR").to_string();
                    return Err(ClientError::Registration(reason));
                }
                _ => trace!(line = %message, "Pre-registration message"),
            }
        }
    }
}

#[async_trait]
impl LineTransport for IrcConnection {
    async fn send(&mut self, message: Message) -> Result<(), TransportError> {
        debug!("> {}", message);
        self.transport.write_message(&message).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Message>, TransportError> {
        loop {
            let Some(message) = self.transport.read_message().await? else {
                debug!("Connection closed by peer");
                return Ok(None);
            };
            debug!("< {}", message);

            if message.command == "PING" {
                let token = message.trailing().unwrap_or_default().to_string();
                self.send(Message::pong(token)).await?;
                continue;
            }
            return Ok(Some(message));
        }
    }
}

/// Upgrades a TCP stream to TLS for the outbound connection.
async fn upgrade_to_tls(
    tcp_stream: TcpStream,
    hostname: &str,
    verify_cert: bool,
) -> Result<tokio_rustls::client::TlsStream<TcpStream>, ClientError> {
    let config = if verify_cert {
        let mut roots = RootCertStore::empty();
        let certs = rustls_native_certs::load_native_certs();
        for cert in certs.certs {
            if let Err(e) = roots.add(cert) {
                warn!("Failed to add root cert: {}", e);
            }
        }
        for e in &certs.errors {
            warn!("Error loading native certs: {}", e);
        }
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    } else {
        warn!(host = %hostname, "TLS certificate verification disabled");
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier))
            .with_no_client_auth()
    };

    let connector = TlsConnector::from(Arc::new(config));
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| ClientError::InvalidServerName(hostname.to_string()))?;

    connector
        .connect(server_name, tcp_stream)
        .await
        .map_err(|source| ClientError::Tls {
            host: hostname.to_string(),
            source,
        })
}

/// Accepts any server certificate. Test networks only.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
        ]
    }
}
