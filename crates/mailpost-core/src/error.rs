//! Error types for the mail services.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while sending a message.
#[derive(Debug, Error)]
pub enum Error {
    /// SMTP delivery failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] mailpost_smtp::Error),

    /// The message could not be used.
    #[error("Message error: {0}")]
    Mime(#[from] mailpost_mime::Error),

    /// The message has no To, Cc or Bcc address.
    #[error("Message has no recipients")]
    NoRecipients,

    /// Invalid service configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
