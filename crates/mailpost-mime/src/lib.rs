//! # mailpost-mime
//!
//! E-mail data model and streaming MIME message writer.
//!
//! ## Features
//!
//! - **Data model**: validated addresses, messages, attachments and custom headers
//! - **Streaming output**: messages render straight into any `AsyncWrite`
//! - **Encodings**: Base64, Quoted-Printable, RFC 2047 header encoding
//! - **Multipart**: related, mixed and alternative bodies picked from the content
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailpost_mime::{Address, Attachment, ContentIdGenerator, Message, MimeWriter};
//!
//! let mut message = Message::new(
//!     Address::with_name("blip@test.org", "Rasmus Schultz")?,
//!     Address::new("blub@test.org")?,
//!     "Hey, Rasmus!",
//! )?;
//! message.set_text(Some("Hello!".into()));
//!
//! let ids = ContentIdGenerator::new();
//! let uri = message.add_inline_attachment(Attachment::from_file("kitten.jpg")?, &ids);
//! message.set_html(Some(format!("<img src=\"{uri}\">")));
//!
//! let mut writer = MimeWriter::new(tokio::io::stdout());
//! writer.write_message(&message).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod attachment;
mod error;
mod header;
mod message;
mod mime_writer;
mod writer;

pub mod encoding;

pub use address::Address;
pub use attachment::{
    Attachment, AttachmentContent, ContentIdGenerator, DEFAULT_MIME_TYPE, InlineAttachment,
};
pub use error::{Error, Result};
pub use header::{Header, Headers};
pub use message::Message;
pub use mime_writer::{BoundaryGenerator, MULTIPART_PREAMBLE, MimeWriter, render_message};
pub use writer::EncodingWriter;
