//! A mail service that sends nothing.

use mailpost_mime::Message;

use super::MailService;
use crate::error::Result;

/// Accepts and discards every message.
///
/// Useful in tests and development, or wrapped in a
/// [`MailServiceLogger`](super::MailServiceLogger) for logging-only delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassiveMailService;

impl MailService for PassiveMailService {
    async fn send(&self, _message: &Message) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailpost_mime::Address;

    #[tokio::test]
    async fn test_accepts_everything() {
        let message = Message::new(
            Address::new("to@example.com").unwrap(),
            Address::new("from@example.com").unwrap(),
            "Nothing happens",
        )
        .unwrap();

        PassiveMailService.send(&message).await.unwrap();
    }
}
