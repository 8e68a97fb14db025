//! Message bodies transmitted during `DATA`.

use mailpost_mime::{Message, MimeWriter};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// Writes a message body into the (already dot-stuffed) `DATA` stream.
///
/// Implementations write the raw message; the caller owns the stream and
/// sends the terminating `CRLF . CRLF`.
pub trait BodyWriter {
    /// Writes the body to `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or the sink rejects a write.
    fn write_body<W: AsyncWrite + Unpin>(&self, sink: &mut W) -> impl Future<Output = Result<()>>;
}

impl BodyWriter for Message {
    async fn write_body<W: AsyncWrite + Unpin>(&self, sink: &mut W) -> Result<()> {
        MimeWriter::new(sink).write_message(self).await?;
        Ok(())
    }
}

/// Pre-rendered message bytes.
impl BodyWriter for [u8] {
    async fn write_body<W: AsyncWrite + Unpin>(&self, sink: &mut W) -> Result<()> {
        sink.write_all(self).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailpost_mime::Address;

    #[tokio::test]
    async fn test_bytes_body() {
        let mut out = Vec::new();
        b"raw body".as_slice().write_body(&mut out).await.unwrap();
        assert_eq!(out, b"raw body");
    }

    #[tokio::test]
    async fn test_message_body_renders_mime() {
        let mut message = Message::new(
            Address::new("to@example.com").unwrap(),
            Address::new("from@example.com").unwrap(),
            "Hello",
        )
        .unwrap();
        message.set_text(Some("Hi there".to_string()));

        let mut out = Vec::new();
        message.write_body(&mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("To: to@example.com\r\n"));
        assert!(text.contains("Subject: Hello\r\n"));
        assert!(text.contains("Hi there"));
    }
}
