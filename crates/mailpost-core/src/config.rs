//! SMTP service configuration.
//!
//! The types deserialize with `serde`, so applications can load them from
//! whatever source they use. Loading is not done here.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default client domain announced in `EHLO`.
pub const DEFAULT_CLIENT_DOMAIN: &str = "localhost";
/// Default connection timeout, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Default per-command I/O timeout, in seconds.
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 300;

/// Transport security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// No encryption (not recommended).
    None,
    /// STARTTLS upgrade after plaintext connect.
    #[default]
    StartTls,
    /// Implicit TLS (connect directly with TLS).
    Tls,
}

impl Security {
    /// Default port for the security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }

    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::StartTls => "STARTTLS",
            Self::Tls => "SSL/TLS",
        }
    }
}

/// How to authenticate.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mechanism", rename_all = "lowercase")]
pub enum Credentials {
    /// No authentication.
    #[default]
    None,
    /// `AUTH LOGIN`.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// `AUTH PLAIN`.
    Plain {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// `AUTH XOAUTH2`.
    #[serde(rename = "xoauth2")]
    XOAuth2 {
        /// User (usually the mailbox address).
        user: String,
        /// `OAuth2` access token.
        token: String,
    },
    /// `AUTH OAUTHBEARER`.
    #[serde(rename = "oauthbearer")]
    OAuthBearer {
        /// User (usually the mailbox address).
        user: String,
        /// `OAuth2` access token.
        token: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Plain { username, .. } => f
                .debug_struct("Plain")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::XOAuth2 { user, .. } => {
                f.debug_struct("XOAuth2").field("user", user).finish_non_exhaustive()
            }
            Self::OAuthBearer { user, .. } => {
                f.debug_struct("OAuthBearer").field("user", user).finish_non_exhaustive()
            }
        }
    }
}

/// Configuration error for an [`SmtpConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// SMTP host is empty.
    #[error("SMTP server is required")]
    EmptyHost,
    /// SMTP port is zero.
    #[error("SMTP port must be 1-65535")]
    InvalidPort,
    /// Client domain is empty.
    #[error("Client domain is required")]
    EmptyClientDomain,
    /// Client domain contains whitespace or control characters.
    #[error("Invalid client domain: {0:?}")]
    InvalidClientDomain(String),
    /// Username or user is empty.
    #[error("Username is required")]
    EmptyUsername,
    /// Password or token is empty.
    #[error("Password or token is required")]
    EmptySecret,
    /// Host cannot be used to verify a TLS certificate.
    #[error("Invalid TLS server name: {0}")]
    InvalidServerName(String),
}

impl ConfigError {
    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHost | Self::InvalidServerName(_) => "host",
            Self::InvalidPort => "port",
            Self::EmptyClientDomain | Self::InvalidClientDomain(_) => "client_domain",
            Self::EmptyUsername => "credentials.username",
            Self::EmptySecret => "credentials.password",
        }
    }
}

/// Settings for an SMTP-backed mail service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Server hostname.
    pub host: String,
    /// Server port; defaults from the security mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Security mode.
    #[serde(default)]
    pub security: Security,
    /// Authentication.
    #[serde(default)]
    pub credentials: Credentials,
    /// Domain announced in `EHLO`.
    #[serde(default = "default_client_domain")]
    pub client_domain: String,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Per-command I/O timeout in seconds; `None` waits forever.
    #[serde(default = "default_io_timeout")]
    pub io_timeout_secs: Option<u64>,
    /// Reject multi-line replies whose lines carry different codes.
    #[serde(default)]
    pub strict_replies: bool,
}

fn default_client_domain() -> String {
    DEFAULT_CLIENT_DOMAIN.to_string()
}

const fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

#[allow(clippy::unnecessary_wraps)]
const fn default_io_timeout() -> Option<u64> {
    Some(DEFAULT_IO_TIMEOUT_SECS)
}

impl SmtpConfig {
    /// Starts building a configuration for `host`.
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }

    /// Effective port: the configured one or the security mode's default.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.security.default_port())
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-command I/O timeout.
    #[must_use]
    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_secs.map(Duration::from_secs)
    }

    /// Checks the configuration for missing values.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == Some(0) {
            return Err(ConfigError::InvalidPort);
        }
        if self.client_domain.trim().is_empty() {
            return Err(ConfigError::EmptyClientDomain);
        }
        // Sent verbatim as the EHLO argument
        if self
            .client_domain
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ConfigError::InvalidClientDomain(self.client_domain.clone()));
        }

        let (user, secret) = match &self.credentials {
            Credentials::None => return Ok(()),
            Credentials::Login { username, password }
            | Credentials::Plain { username, password } => (username, password),
            Credentials::XOAuth2 { user, token } | Credentials::OAuthBearer { user, token } => {
                (user, token)
            }
        };
        if user.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        Ok(())
    }
}

/// Builder for [`SmtpConfig`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: SmtpConfig,
}

impl ConfigBuilder {
    /// Creates a builder with defaults for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            config: SmtpConfig {
                host: host.into(),
                port: None,
                security: Security::default(),
                credentials: Credentials::None,
                client_domain: default_client_domain(),
                connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
                io_timeout_secs: Some(DEFAULT_IO_TIMEOUT_SECS),
                strict_replies: false,
            },
        }
    }

    /// Sets an explicit port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Sets the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.config.security = security;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = credentials;
        self
    }

    /// Uses `AUTH LOGIN`.
    #[must_use]
    pub fn login(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials(Credentials::Login {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Sets the domain announced in `EHLO`.
    #[must_use]
    pub fn client_domain(mut self, domain: impl Into<String>) -> Self {
        self.config.client_domain = domain.into();
        self
    }

    /// Sets the connection timeout (whole seconds).
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the I/O timeout (whole seconds); `None` waits forever.
    #[must_use]
    pub fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.io_timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    /// Enables strict multi-line reply validation.
    #[must_use]
    pub const fn strict_replies(mut self, strict: bool) -> Self {
        self.config.strict_replies = strict;
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required value is missing.
    pub fn build(self) -> Result<SmtpConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
