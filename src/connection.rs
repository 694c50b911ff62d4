//! Client-side connection settings.

use std::time::Duration;

use thiserror::Error;

/// Host used when the config names none.
pub const DEFAULT_HOST: &str = "localhost";
/// User used when the config names none.
pub const DEFAULT_USER: &str = "default";
/// Plain TCP port.
pub const DEFAULT_TCP_PORT: u16 = 9000;
/// TLS port.
pub const DEFAULT_TCP_PORT_SECURE: u16 = 9440;

/// Whether the connection uses TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Secure {
    /// Plain TCP.
    #[default]
    Disable,
    /// TLS.
    Enable,
}

/// Whether blocks on the wire are compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Send blocks uncompressed.
    Disable,
    /// Compress blocks with the default codec.
    #[default]
    Enable,
}

/// Socket timeouts of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    /// Time allowed to establish the connection.
    pub connection: Duration,
    /// Time allowed for one send.
    pub send: Duration,
    /// Time allowed for one receive.
    pub receive: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self {
            connection: Duration::from_secs(10),
            send: Duration::from_secs(300),
            receive: Duration::from_secs(300),
        }
    }
}

/// Error returned when the client config is contradictory.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionConfigError {
    /// Both a password and a password prompt were requested.
    #[error("password and ask-password are mutually exclusive")]
    ConflictingPassword,
}

/// Client configuration as read from a config file or command line.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub(crate) host: Option<String>,
    pub(crate) port: Option<u16>,
    pub(crate) tcp_port: Option<u16>,
    pub(crate) tcp_port_secure: Option<u16>,
    pub(crate) secure: bool,
    pub(crate) user: Option<String>,
    pub(crate) password: Option<String>,
    pub(crate) ask_password: bool,
    pub(crate) quota_key: Option<String>,
    pub(crate) compression: Option<bool>,
    pub(crate) timeouts: ConnectionTimeouts,
}

impl ClientConfig {
    /// Server host.
    pub fn host(self, host: impl Into<String>) -> Self {
        ClientConfig {
            host: Some(host.into()),
            ..self
        }
    }

    /// Explicit port; overrides both `tcp_port` settings.
    pub fn port(self, port: u16) -> Self {
        ClientConfig {
            port: Some(port),
            ..self
        }
    }

    /// Port for plain connections.
    pub fn tcp_port(self, tcp_port: u16) -> Self {
        ClientConfig {
            tcp_port: Some(tcp_port),
            ..self
        }
    }

    /// Port for TLS connections.
    pub fn tcp_port_secure(self, tcp_port_secure: u16) -> Self {
        ClientConfig {
            tcp_port_secure: Some(tcp_port_secure),
            ..self
        }
    }

    /// Connect over TLS.
    pub fn secure(self, secure: bool) -> Self {
        ClientConfig { secure, ..self }
    }

    /// User to authenticate as.
    pub fn user(self, user: impl Into<String>) -> Self {
        ClientConfig {
            user: Some(user.into()),
            ..self
        }
    }

    /// Password for [`ClientConfig::user`].
    pub fn password(self, password: impl Into<String>) -> Self {
        ClientConfig {
            password: Some(password.into()),
            ..self
        }
    }

    /// Prompt for the password instead of taking it from config.
    pub fn ask_password(self, ask_password: bool) -> Self {
        ClientConfig {
            ask_password,
            ..self
        }
    }

    /// Key under which the server accounts quotas.
    pub fn quota_key(self, quota_key: impl Into<String>) -> Self {
        ClientConfig {
            quota_key: Some(quota_key.into()),
            ..self
        }
    }

    /// Compress blocks on the wire. On unless set to `false`.
    pub fn compression(self, compression: bool) -> Self {
        ClientConfig {
            compression: Some(compression),
            ..self
        }
    }

    /// Socket timeouts.
    pub fn timeouts(self, timeouts: ConnectionTimeouts) -> Self {
        ClientConfig { timeouts, ..self }
    }
}

/// Resolved settings for one client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database queries run in unless they name another.
    pub default_database: String,
    /// User to authenticate as.
    pub user: String,
    /// Password, or [`ConnectionParameters::ASK_PASSWORD`].
    pub password: String,
    /// Quota key, empty when unset.
    pub quota_key: String,
    /// Transport security.
    pub security: Secure,
    /// Wire compression.
    pub compression: Compression,
    /// Socket timeouts.
    pub timeouts: ConnectionTimeouts,
}

impl ConnectionParameters {
    /// Password placeholder meaning "ask the user". A newline is not a
    /// password anyone types.
    pub const ASK_PASSWORD: &'static str = "\n";

    /// Build parameters from `config`. The database is passed separately since
    /// it can change after a query runs.
    pub fn from_config(
        config: &ClientConfig,
        database: &str,
    ) -> Result<Self, ConnectionConfigError> {
        let host = config.host.as_deref().unwrap_or(DEFAULT_HOST);
        Self::with_host_port(config, database, host, None)
    }

    /// Like [`ConnectionParameters::from_config`] with an explicit host, and
    /// an explicit port when `port` is set.
    pub fn with_host_port(
        config: &ClientConfig,
        database: &str,
        host: &str,
        port: Option<u16>,
    ) -> Result<Self, ConnectionConfigError> {
        let password = match (&config.password, config.ask_password) {
            (Some(_), true) => return Err(ConnectionConfigError::ConflictingPassword),
            (Some(password), false) => password.clone(),
            (None, true) => Self::ASK_PASSWORD.to_string(),
            (None, false) => String::new(),
        };

        Ok(Self {
            host: host.to_string(),
            port: port.unwrap_or_else(|| Self::port_from_config(config)),
            default_database: database.to_string(),
            user: config
                .user
                .clone()
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            password,
            quota_key: config.quota_key.clone().unwrap_or_default(),
            security: if config.secure {
                Secure::Enable
            } else {
                Secure::Disable
            },
            compression: match config.compression {
                Some(false) => Compression::Disable,
                _ => Compression::Enable,
            },
            timeouts: config.timeouts,
        })
    }

    /// The explicit port if set, else the TLS or plain port depending on
    /// `secure`, each with its default.
    pub fn port_from_config(config: &ClientConfig) -> u16 {
        if let Some(port) = config.port {
            return port;
        }
        if config.secure {
            config.tcp_port_secure.unwrap_or(DEFAULT_TCP_PORT_SECURE)
        } else {
            config.tcp_port.unwrap_or(DEFAULT_TCP_PORT)
        }
    }

    /// Parameters for an in-process server: no network, no compression.
    pub fn create_for_embedded(user: &str, database: &str) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: 0,
            default_database: database.to_string(),
            user: user.to_string(),
            password: String::new(),
            quota_key: String::new(),
            security: Secure::Disable,
            compression: Compression::Disable,
            timeouts: ConnectionTimeouts::default(),
        }
    }
}
