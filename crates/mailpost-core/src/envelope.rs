//! SMTP envelope derived from a message.

use std::collections::HashSet;

use mailpost_mime::Message;

use crate::error::{Error, Result};

/// Who a message is sent by and delivered to, as told to the SMTP server.
///
/// Bcc recipients appear here and nowhere in the rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: String,
    recipients: Vec<String>,
}

impl Envelope {
    /// Derives the envelope of `message`.
    ///
    /// The sender is the `Sender` address if set, else the first `From`
    /// address. Recipients are To, Cc and Bcc in that order; repeated
    /// addresses (compared case-insensitively) are sent once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] if there is nobody to deliver to.
    pub fn from_message(message: &Message) -> Result<Self> {
        let sender = message
            .sender()
            .or_else(|| message.from().first())
            .map(|address| address.email().to_string())
            .unwrap_or_default();

        let mut seen = HashSet::new();
        let recipients: Vec<String> = message
            .to()
            .iter()
            .chain(message.cc())
            .chain(message.bcc())
            .map(|address| address.email())
            .filter(|email| seen.insert(email.to_ascii_lowercase()))
            .map(str::to_string)
            .collect();

        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        Ok(Self { sender, recipients })
    }

    /// Reverse path for `MAIL FROM`.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Forward paths for `RCPT TO`, in order.
    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }
}
