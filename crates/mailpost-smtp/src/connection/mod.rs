//! SMTP connection management.

mod client;
mod stream;

pub use client::SmtpClient;
pub use stream::{SmtpStream, StartTls, TlsParameters};

use crate::types::{AuthMechanism, Extension};
use std::collections::HashSet;
use std::time::Duration;

/// Default bound on each command write and reply read.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(300);

/// Server capabilities from the greeting and EHLO reply.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Server hostname from greeting.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl ServerInfo {
    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Returns the maximum message size, if advertised.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Where a mail transaction currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// `MAIL FROM` accepted.
    MailFrom,
    /// At least one `RCPT TO` accepted.
    RcptTo,
    /// `DATA` accepted; the body is being transmitted.
    Data,
}

/// Protocol state of an [`SmtpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, greeting not read yet.
    AwaitingGreeting,
    /// Greeting accepted, ready for commands.
    Ready,
    /// Authentication succeeded.
    Authenticated,
    /// Inside a mail transaction.
    Transacting(TransactionPhase),
    /// The transport has been released.
    Closed,
}

/// Protocol options for an [`SmtpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bound on each command write and reply read; `None` waits forever.
    pub io_timeout: Option<Duration>,
    /// Require continuation lines of multi-line replies to carry the final code.
    pub strict_replies: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            strict_replies: false,
        }
    }
}

impl ClientOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Enables or disables strict multi-line reply validation.
    #[must_use]
    pub const fn strict_replies(mut self, strict: bool) -> Self {
        self.strict_replies = strict;
        self
    }
}
