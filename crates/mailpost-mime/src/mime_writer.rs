//! MIME message serializer.
//!
//! [`MimeWriter`] renders a [`Message`] as an RFC 5322 message with MIME
//! multipart bodies, streaming straight into any [`AsyncWrite`] sink:
//!
//! ```text
//! multipart/related        (only with inline attachments)
//! ├── multipart/mixed      (only with attachments)
//! │   ├── multipart/alternative   (only with text and HTML)
//! │   │   ├── text/plain
//! │   │   └── text/html
//! │   └── attachments...
//! └── inline attachments...
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tokio::io::AsyncWrite;

use crate::address::Address;
use crate::attachment::{Attachment, AttachmentContent, hex_prefix};
use crate::encoding::{encode_header_value, normalize_line_breaks};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::writer::EncodingWriter;

/// Preamble written before the first part of a `multipart/mixed` body.
pub const MULTIPART_PREAMBLE: &str = "This is a multipart message in MIME format.";

/// Generates multipart boundary strings.
///
/// Boundaries look like `++++mixed-<40 hex digits>++++`. The digest covers a
/// per-generator counter, so two boundaries from one generator never repeat
/// even when generated within the same clock tick.
#[derive(Debug, Clone, Default)]
pub struct BoundaryGenerator {
    counter: u64,
    seed: Option<u64>,
}

impl BoundaryGenerator {
    /// Creates a generator mixing the current time into each boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deterministic generator that uses `seed` instead of the clock.
    #[must_use]
    pub const fn with_seed(seed: u64) -> Self {
        Self {
            counter: 0,
            seed: Some(seed),
        }
    }

    /// Returns the next boundary for the given multipart subtype.
    pub fn next_boundary(&mut self, prefix: &str) -> String {
        self.counter += 1;

        let salt = self.seed.map_or_else(
            || {
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_or(0, |elapsed| elapsed.as_nanos())
            },
            u128::from,
        );

        let mut hasher = Sha256::new();
        hasher.update(self.counter.to_be_bytes());
        hasher.update(salt.to_be_bytes());
        hasher.update(prefix.as_bytes());
        let digest = hasher.finalize();

        format!("++++{prefix}-{}++++", hex_prefix(&digest, 20))
    }
}

/// Streams messages as MIME to an async sink.
#[derive(Debug)]
pub struct MimeWriter<W> {
    out: EncodingWriter<W>,
    boundaries: BoundaryGenerator,
}

impl<W: AsyncWrite + Unpin> MimeWriter<W> {
    /// Creates a writer with a time-based boundary generator.
    pub fn new(sink: W) -> Self {
        Self::with_boundaries(sink, BoundaryGenerator::new())
    }

    /// Creates a writer with the given boundary generator.
    pub const fn with_boundaries(sink: W, boundaries: BoundaryGenerator) -> Self {
        Self {
            out: EncodingWriter::new(sink),
            boundaries,
        }
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    /// Writes the complete message: header block, then body.
    ///
    /// A message with neither text nor HTML ends after its headers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderInjection`] before anything is written if an
    /// attachment filename or MIME type contains CR or LF, and an I/O error if
    /// the sink fails or an attachment file cannot be read.
    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        check_attachment_headers(message)?;
        self.write_headers(message).await?;

        if message.inline_attachments().is_empty() {
            self.write_mixed(message).await?;
        } else {
            self.write_related(message).await?;
        }

        self.out.flush().await
    }

    async fn write_headers(&mut self, message: &Message) -> Result<()> {
        self.write_header("Date", &message.date().to_rfc2822()).await?;

        self.write_address_header("To", message.to()).await?;
        self.write_address_header("From", message.from()).await?;
        self.write_address_header("Cc", message.cc()).await?;
        self.write_address_header("Reply-To", message.reply_to()).await?;

        // Sender is redundant with a single From and is left out then
        if let Some(sender) = message.sender() {
            self.write_address_header("Sender", std::slice::from_ref(sender)).await?;
        } else if let [first, _, ..] = message.from() {
            self.write_address_header("Sender", std::slice::from_ref(first)).await?;
        }

        self.write_header("Subject", message.subject()).await?;
        self.write_header("MIME-Version", "1.0").await?;

        for header in message.headers().iter() {
            self.write_header(header.name(), header.value()).await?;
        }

        Ok(())
    }

    async fn write_related(&mut self, message: &Message) -> Result<()> {
        let boundary = self.boundaries.next_boundary("related");

        self.write_multipart_header("related", &boundary).await?;
        self.out.write_line("").await?;

        self.write_boundary(&boundary).await?;
        self.write_mixed(message).await?;

        for inline in message.inline_attachments() {
            self.write_boundary(&boundary).await?;
            self.write_attachment_part(inline.attachment(), Some(inline.content_id()))
                .await?;
        }

        self.write_boundary_end(&boundary).await
    }

    async fn write_mixed(&mut self, message: &Message) -> Result<()> {
        if message.attachments().is_empty() {
            return self.write_alternative(message).await;
        }

        let boundary = self.boundaries.next_boundary("mixed");

        self.write_multipart_header("mixed", &boundary).await?;
        self.out.write_line("").await?;
        self.out.write_line(MULTIPART_PREAMBLE).await?;
        self.out.write_line("").await?;

        self.write_boundary(&boundary).await?;
        self.write_alternative(message).await?;

        for attachment in message.attachments() {
            self.write_boundary(&boundary).await?;
            self.write_attachment_part(attachment, None).await?;
        }

        self.write_boundary_end(&boundary).await
    }

    async fn write_alternative(&mut self, message: &Message) -> Result<()> {
        match (message.text(), message.html()) {
            (Some(text), Some(html)) => {
                let boundary = self.boundaries.next_boundary("alternative");

                self.write_multipart_header("alternative", &boundary).await?;
                self.out.write_line("").await?;

                self.write_boundary(&boundary).await?;
                self.write_text_part("text/plain", text).await?;

                self.write_boundary(&boundary).await?;
                self.write_text_part("text/html", html).await?;

                self.write_boundary_end(&boundary).await
            }
            (Some(text), None) => self.write_text_part("text/plain", text).await,
            (None, Some(html)) => self.write_text_part("text/html", html).await,
            (None, None) => Ok(()),
        }
    }

    async fn write_text_part(&mut self, media_type: &str, content: &str) -> Result<()> {
        self.write_header("Content-Type", &format!("{media_type}; charset=UTF-8"))
            .await?;
        self.write_header("Content-Transfer-Encoding", "quoted-printable")
            .await?;
        self.out.write_line("").await?;
        self.out
            .write_quoted_printable(&normalize_line_breaks(content))
            .await?;
        self.out.write_line("").await
    }

    async fn write_attachment_part(
        &mut self,
        attachment: &Attachment,
        content_id: Option<&str>,
    ) -> Result<()> {
        let filename = quote_filename(attachment.filename());
        let disposition = if content_id.is_some() { "inline" } else { "attachment" };

        self.write_header("Content-Type", attachment.mime_type()).await?;
        self.write_header("Content-Transfer-Encoding", "base64").await?;
        self.out
            .write_line(&format!("Content-Disposition: {disposition}; filename=\"{filename}\""))
            .await?;
        if let Some(id) = content_id {
            self.out.write_line(&format!("Content-ID: <{id}>")).await?;
        }
        self.out.write_line("").await?;

        match attachment.content() {
            AttachmentContent::Bytes(bytes) => self.out.write_base64(bytes).await?,
            AttachmentContent::File(path) => {
                let mut file = tokio::fs::File::open(path).await.map_err(Error::AttachmentRead)?;
                self.out.write_base64_from(&mut file).await?;
            }
        }

        self.out.write_line("").await
    }

    async fn write_multipart_header(&mut self, subtype: &str, boundary: &str) -> Result<()> {
        self.out
            .write_line(&format!("Content-Type: multipart/{subtype}; boundary=\"{boundary}\""))
            .await
    }

    async fn write_boundary(&mut self, boundary: &str) -> Result<()> {
        self.out.write_line(&format!("--{boundary}")).await
    }

    async fn write_boundary_end(&mut self, boundary: &str) -> Result<()> {
        self.out.write_line(&format!("--{boundary}--")).await
    }

    async fn write_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.out
            .write_line(&format!("{name}: {}", encode_header_value(value)))
            .await
    }

    async fn write_address_header(&mut self, name: &str, addresses: &[Address]) -> Result<()> {
        if addresses.is_empty() {
            return Ok(());
        }

        let value = addresses
            .iter()
            .map(|address| match address.name() {
                Some(display) => format!("{} <{}>", encode_header_value(display), address.email()),
                None => address.email().to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ");

        self.out.write_line(&format!("{name}: {value}")).await
    }
}

/// Renders a message into memory.
///
/// # Errors
///
/// Returns an error if an attachment file cannot be read.
pub async fn render_message(message: &Message) -> Result<Vec<u8>> {
    let mut writer = MimeWriter::new(Vec::new());
    writer.write_message(message).await?;
    Ok(writer.into_inner())
}

/// Filenames and MIME types go into part headers verbatim.
fn check_attachment_headers(message: &Message) -> Result<()> {
    let attachments = message
        .attachments()
        .iter()
        .chain(message.inline_attachments().iter().map(|inline| inline.attachment()));

    for attachment in attachments {
        if attachment.filename().contains(['\r', '\n']) {
            return Err(Error::HeaderInjection("attachment filename".into()));
        }
        if attachment.mime_type().contains(['\r', '\n']) {
            return Err(Error::HeaderInjection("attachment MIME type".into()));
        }
    }
    Ok(())
}

fn quote_filename(filename: &str) -> String {
    let quoted = filename.replace('\\', "\\\\").replace('"', "\\\"");
    encode_header_value(&quoted).into_owned()
}
