//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

use crate::types::ReplyCode;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
///
/// Every error is fatal to the send in progress. Transport errors also close
/// the connection; after a protocol error the connection is still usable for
/// `QUIT`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server replied with an unexpected code.
    #[error("Unexpected reply {received} (expected {expected}) to {command:?}: {response}")]
    Protocol {
        /// Code the command required.
        expected: ReplyCode,
        /// Code the server sent.
        received: ReplyCode,
        /// Command that was sent (empty for the greeting, redacted for AUTH payloads).
        command: String,
        /// Last raw reply line.
        response: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Host name that cannot be used for TLS server verification.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(String),

    /// The server closed the connection before sending a complete reply.
    #[error("Connection closed by server")]
    NoResponse,

    /// A write or read did not complete in time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The connection has already been closed.
    #[error("Connection closed")]
    Closed,

    /// A reply line that cannot be interpreted.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// Envelope address that cannot be sent.
    #[error("Invalid envelope address: {0:?}")]
    InvalidAddress(String),

    /// Rendering the message body failed.
    #[error("Message error: {0}")]
    Message(#[source] mailpost_mime::Error),
}

/// Sink failures while writing the body are transport errors; everything else
/// the writer raises, such as an unreadable attachment file, is a message error.
impl From<mailpost_mime::Error> for Error {
    fn from(error: mailpost_mime::Error) -> Self {
        match error {
            mailpost_mime::Error::Io(e) => Self::Io(e),
            other => Self::Message(other),
        }
    }
}

impl Error {
    /// Returns true if the server rejected a command.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns true if the connection itself failed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::InvalidDnsName(_)
                | Self::NoResponse
                | Self::Timeout(_)
                | Self::Closed
                | Self::MalformedReply(_)
        )
    }

    /// Returns true if this is a permanent rejection (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Protocol { received, .. } if received.is_permanent())
    }

    /// Returns true if this is a transient rejection (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Protocol { received, .. } if received.is_transient())
    }

    /// Returns the reply code the server sent, for protocol errors.
    #[must_use]
    pub const fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            Self::Protocol { received, .. } => Some(*received),
            _ => None,
        }
    }

    /// Converts a TLS handshake failure, unwrapping the rustls error if present.
    pub(crate) fn from_handshake(error: io::Error) -> Self {
        match error.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()) {
            Some(tls) => Self::Tls(tls.clone()),
            None => Self::Io(error),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rejected(code: u16) -> Error {
        Error::Protocol {
            expected: ReplyCode::OK,
            received: ReplyCode::new(code),
            command: "RCPT TO:<b@example.com>".into(),
            response: format!("{code} nope"),
        }
    }

    #[test]
    fn test_classification() {
        assert!(rejected(550).is_protocol());
        assert!(rejected(550).is_permanent());
        assert!(!rejected(550).is_transient());
        assert!(rejected(451).is_transient());
        assert!(!rejected(451).is_transport());

        assert!(Error::NoResponse.is_transport());
        assert!(Error::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!Error::NoResponse.is_permanent());
    }

    #[test]
    fn test_reply_code() {
        assert_eq!(rejected(550).reply_code(), Some(ReplyCode::new(550)));
        assert_eq!(Error::Closed.reply_code(), None);
    }

    #[test]
    fn test_display_names_command_and_response() {
        let text = rejected(550).to_string();
        assert!(text.contains("550"));
        assert!(text.contains("250"));
        assert!(text.contains("RCPT TO"));
    }

    #[test]
    fn test_mime_errors_split_sink_and_content_failures() {
        let err: Error = mailpost_mime::Error::Io(io::Error::other("broken pipe")).into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transport());

        let missing = io::Error::other("no such file");
        let err: Error = mailpost_mime::Error::AttachmentRead(missing).into();
        assert!(matches!(err, Error::Message(_)));
        assert!(!err.is_transport());

        let err: Error = mailpost_mime::Error::InvalidDate("x".into()).into();
        assert!(matches!(err, Error::Message(_)));
    }

    #[test]
    fn test_handshake_error_unwraps_rustls() {
        let io = io::Error::new(io::ErrorKind::InvalidData, rustls::Error::DecryptError);
        assert!(matches!(Error::from_handshake(io), Error::Tls(_)));

        let io = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(Error::from_handshake(io), Error::Io(_)));
    }
}
