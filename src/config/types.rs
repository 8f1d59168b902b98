//! Core configuration types and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::session::RequestStyle;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// IRC server to connect to.
    pub server: ServerConfig,
    /// Who the bot registers as.
    pub identity: IdentityConfig,
    /// Settings shared by every query protocol.
    #[serde(default)]
    pub query: QueryConfig,
    /// Access-list audit.
    #[serde(default)]
    pub access: AccessConfig,
    /// Mode-lock audit.
    #[serde(default)]
    pub mlock: MlockConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Hostname; also the TLS server name.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub tls: bool,
    /// Disable only for test networks with self-signed certificates.
    #[serde(default = "default_true")]
    pub verify_cert: bool,
    /// Connection password sent as PASS (optional).
    pub password: Option<String>,
}

impl ServerConfig {
    /// `host:port` for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Client identity.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub nickname: String,
    /// Defaults to the nickname.
    pub username: Option<String>,
    #[serde(default = "default_realname")]
    pub realname: String,
}

impl IdentityConfig {
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.nickname)
    }
}

/// Query session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    /// Nickname of the services bot that answers queries.
    #[serde(default = "default_service")]
    pub service: String,
    /// Key list, one key per line.
    #[serde(default = "default_input")]
    pub input: PathBuf,
    /// Seconds to wait for each relevant reply.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout_secs: u64,
    /// Value recorded for a key whose query timed out.
    #[serde(default = "default_timeout_value")]
    pub timeout_value: String,
    #[serde(default)]
    pub request_style: RequestStyle,
}

impl QueryConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            input: default_input(),
            wait_timeout_secs: default_wait_timeout(),
            registration_timeout_secs: default_registration_timeout(),
            timeout_value: default_timeout_value(),
            request_style: RequestStyle::default(),
        }
    }
}

/// Access-list audit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_access_output")]
    pub output: PathBuf,
    /// Entry names never reported (services staff templates and the like).
    #[serde(default = "default_bypass")]
    pub bypass: Vec<String>,
    #[serde(default = "default_access_value")]
    pub default_value: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            output: default_access_output(),
            bypass: default_bypass(),
            default_value: default_access_value(),
        }
    }
}

/// Mode-lock audit settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MlockConfig {
    #[serde(default = "default_mlock_output")]
    pub output: PathBuf,
    #[serde(default = "default_mlock_value")]
    pub default_value: String,
}

impl Default for MlockConfig {
    fn default() -> Self {
        Self {
            output: default_mlock_output(),
            default_value: default_mlock_value(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    6697
}

fn default_realname() -> String {
    "Test Robot".to_string()
}

fn default_service() -> String {
    "ChanServ".to_string()
}

fn default_input() -> PathBuf {
    PathBuf::from("channels-in")
}

fn default_wait_timeout() -> u64 {
    30
}

fn default_registration_timeout() -> u64 {
    60
}

fn default_timeout_value() -> String {
    "timeout".to_string()
}

fn default_access_output() -> PathBuf {
    PathBuf::from("channels-out-acls")
}

fn default_bypass() -> Vec<String> {
    vec!["freenode-staff".to_string()]
}

fn default_access_value() -> String {
    "N/A".to_string()
}

fn default_mlock_output() -> PathBuf {
    PathBuf::from("channels-out-mlock")
}

fn default_mlock_value() -> String {
    "unset".to_string()
}
