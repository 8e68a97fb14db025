//! # mailpost-smtp
//!
//! An SMTP submission client (RFC 5321).
//!
//! ## Features
//!
//! - **Sequential protocol engine**: one command, one reply; every operation
//!   takes `&mut self`
//! - **TLS**: implicit TLS (port 465) and STARTTLS via `rustls`
//! - **Authentication**: LOGIN, PLAIN, XOAUTH2, OAUTHBEARER
//! - **Streaming bodies**: the message is rendered straight into the
//!   dot-stuffed `DATA` stream
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailpost_smtp::auth::{Authenticator, LoginAuthenticator};
//! use mailpost_smtp::connector::{Connector, StartTlsConnector};
//! use mailpost_smtp::TlsParameters;
//!
//! # async fn run() -> mailpost_smtp::Result<()> {
//! let tls = TlsParameters::new("smtp.example.com")?;
//! let connector = StartTlsConnector::new("smtp.example.com", 587, tls);
//! let mut client = connector.connect("client.example.com").await?;
//!
//! let body: &[u8] = b"Subject: Test\r\n\r\nHello, World!\r\n";
//! client
//!     .session(async |c| {
//!         LoginAuthenticator::new("user@example.com", "password").authenticate(c).await?;
//!         c.send_mail("user@example.com", &["friend@example.com"], body).await
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`auth`]: authentication strategies
//! - [`command`]: SMTP commands
//! - [`connection`]: protocol engine and transports
//! - [`connector`]: connection strategies
//! - [`dot_stuffing`]: transparent `DATA` encoding
//! - [`parser`]: reply reader
//! - [`types`]: reply codes and extensions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
mod body;
pub mod command;
pub mod connection;
pub mod connector;
pub mod dot_stuffing;
mod error;
pub mod parser;
pub mod types;

pub use body::BodyWriter;
pub use connection::{
    ClientOptions, ServerInfo, SessionState, SmtpClient, SmtpStream, StartTls, TlsParameters,
};
pub use error::{Error, Result};
pub use types::{AuthMechanism, Extension, Reply, ReplyCode};
