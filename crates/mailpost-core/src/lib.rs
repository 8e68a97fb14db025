//! # mailpost-core
//!
//! Mail services built on `mailpost-mime` and `mailpost-smtp`.
//!
//! This crate provides:
//! - The [`MailService`] abstraction
//! - SMTP delivery ([`SmtpMailService`]) with pluggable connection and
//!   authentication strategies
//! - An audit-logging decorator ([`MailServiceLogger`])
//! - A service that discards everything ([`PassiveMailService`])
//! - Typed, `serde`-friendly configuration ([`SmtpConfig`])
//!
//! ```no_run
//! use mailpost_core::{MailService, SmtpConfig, SmtpMailService};
//! use mailpost_mime::{Address, Message};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SmtpConfig::builder("smtp.example.com")
//!     .login("me@example.com", "app-password")
//!     .build()?;
//! let service = SmtpMailService::from_config(&config)?;
//!
//! let mut message = Message::new(
//!     Address::new("friend@example.com")?,
//!     Address::new("me@example.com")?,
//!     "Hello",
//! )?;
//! message.set_text(Some("Hi there!".to_string()));
//!
//! service.send(&message).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod envelope;
mod error;
pub mod service;

pub use config::{ConfigBuilder, ConfigError, Credentials, Security, SmtpConfig};
pub use envelope::Envelope;
pub use error::{Error, Result};
pub use service::{
    ConfiguredAuthenticator, ConfiguredConnector, DEFAULT_TEMPLATE, MailService, MailServiceLogger,
    PassiveMailService, SmtpMailService,
};
