//! Error types for message construction and rendering.

use std::io;
use std::string::FromUtf8Error;

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
///
/// [`Error::Io`] and [`Error::AttachmentRead`] are raised while a message is
/// being written; everything else is a validation failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed e-mail address.
    #[error("Invalid e-mail address: {0}")]
    InvalidAddress(String),

    /// CR or LF found in a value that ends up in a header line.
    #[error("CR/LF injection detected in {0}")]
    HeaderInjection(String),

    /// An address list that requires at least one entry was left empty.
    #[error("At least one {0} address is required")]
    MissingAddress(&'static str),

    /// Header name that cannot appear in a header line.
    #[error("Invalid header name: {0:?}")]
    InvalidHeaderName(String),

    /// Body bytes are not valid UTF-8.
    #[error("Body is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// Date string could not be parsed.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Writing to the output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attachment content could not be read while writing the message.
    #[error("Cannot read attachment: {0}")]
    AttachmentRead(#[source] io::Error),
}

impl Error {
    /// Returns true if this error was raised by input validation.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::AttachmentRead(_))
    }
}
