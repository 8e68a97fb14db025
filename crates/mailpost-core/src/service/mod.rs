//! Mail services: ways of sending a [`Message`].
//!
//! - [`SmtpMailService`] delivers to an SMTP server
//! - [`MailServiceLogger`] writes an audit line for every send through another service
//! - [`PassiveMailService`] discards everything

mod logger;
mod passive;
mod smtp;

pub use logger::{DEFAULT_TEMPLATE, MailServiceLogger};
pub use passive::PassiveMailService;
pub use smtp::{ConfiguredAuthenticator, ConfiguredConnector, SmtpMailService};

use mailpost_mime::Message;

use crate::error::Result;

/// Sends messages.
pub trait MailService {
    /// Sends `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message could not be sent; nothing is retried.
    fn send(&self, message: &Message) -> impl Future<Output = Result<()>>;
}
