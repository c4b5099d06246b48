//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::external::RetryPolicy;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Who we are on every network.
    pub identity: IdentityConfig,
    /// Local listener for clients.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Defaults for upstream links.
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Upstream networks, in order. The first one is the default for
    /// clients that never send `/connect`.
    #[serde(default, rename = "network")]
    pub networks: Vec<NetworkConfig>,
    /// External side commands.
    #[serde(default)]
    pub commands: CommandsConfig,
    /// Log output.
    #[serde(default)]
    pub log: LogConfig,
}

/// Identity sent during registration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Nickname.
    pub nick: String,
    /// Username for `USER`; defaults to the nick.
    pub user: Option<String>,
    /// Real name for `USER`.
    #[serde(default = "default_realname")]
    pub realname: String,
}

impl IdentityConfig {
    /// Username sent in `USER`.
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.nick)
    }
}

fn default_realname() -> String {
    "hatcog".to_string()
}

/// Client listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "127.0.0.1:8790").
    pub address: SocketAddr,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 8790)),
        }
    }
}

/// How an upstream link secures its socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// TLS first, plaintext if the handshake fails.
    #[default]
    Auto,
    /// TLS only.
    Always,
    /// Plaintext only.
    Never,
}

/// Connection behaviour shared by all upstream links.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub tls: TlsMode,
    pub connect_attempts: u32,
    pub retry_backoff_secs: u64,
    pub read_timeout_ms: u64,
    pub tls_handshake_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::Auto,
            connect_attempts: 5,
            retry_backoff_secs: 1,
            read_timeout_ms: 1000,
            tls_handshake_timeout_secs: 5,
        }
    }
}

impl UpstreamConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.connect_attempts,
            Duration::from_secs(self.retry_backoff_secs),
        )
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.tls_handshake_timeout_secs)
    }
}

/// One upstream IRC network.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// `host:port`, also the routing key for the network.
    pub address: String,
    /// Server password sent as `PASS`.
    pub password: Option<String>,
    /// Sent to NickServ once the server welcomes us.
    pub nickserv_password: Option<String>,
    /// Overrides `[upstream] tls`.
    pub tls: Option<TlsMode>,
    /// Connect at startup.
    #[serde(default = "default_true")]
    pub autoconnect: bool,
}

fn default_true() -> bool {
    true
}

/// External commands run on chat events. Each is split on whitespace into
/// a program and its arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandsConfig {
    /// Desktop notification; receives title and body as two extra arguments.
    pub notify: Option<String>,
    /// Alert sound.
    pub beep: Option<String>,
    /// Opens a private chat window; `{nick}` is replaced by the sender.
    pub private_chat: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Reject configurations the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nick = self.identity.nick.trim();
        if nick.is_empty() {
            return Err(ConfigError::Invalid("identity.nick is empty".into()));
        }
        if nick.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid(format!(
                "identity.nick contains whitespace: {nick:?}"
            )));
        }
        if self.upstream.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "upstream.connect_attempts must be at least 1".into(),
            ));
        }
        if self.upstream.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "upstream.read_timeout_ms must be at least 1".into(),
            ));
        }
        for network in &self.networks {
            if !has_port(&network.address) {
                return Err(ConfigError::Invalid(format!(
                    "network address {:?} has no port",
                    network.address
                )));
            }
        }
        Ok(())
    }

    /// Network scoped to clients that never send `/connect`.
    pub fn default_network(&self) -> Option<&str> {
        self.networks.first().map(|n| n.address.as_str())
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

/// `host:port` with a numeric port.
pub fn has_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
