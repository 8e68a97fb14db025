//! File attachments.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// MIME type used when none is given.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Where the attachment bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentContent {
    /// Content held in memory.
    Bytes(Vec<u8>),
    /// File read (streamed) when the message is written.
    File(PathBuf),
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    content: AttachmentContent,
    filename: String,
    mime_type: String,
}

impl Attachment {
    /// Creates an attachment from in-memory content.
    #[must_use]
    pub fn new(content: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            content: AttachmentContent::Bytes(content.into()),
            filename: filename.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }

    /// Creates an attachment that streams a file when the message is written.
    ///
    /// The filename defaults to the last component of `path`. The file is not
    /// opened here; a missing file surfaces as an I/O error at write time.
    ///
    /// # Errors
    ///
    /// Returns an error if the path has no file name.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                let message = format!("no file name in {}", path.display());
                Error::Io(std::io::Error::other(message))
            })?;

        Ok(Self {
            content: AttachmentContent::File(path.to_path_buf()),
            filename,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        })
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Overrides the filename.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Returns the content source.
    #[must_use]
    pub const fn content(&self) -> &AttachmentContent {
        &self.content
    }

    /// Returns the filename.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Returns the MIME type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// An attachment referenced from the HTML body through a `cid:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAttachment {
    attachment: Attachment,
    content_id: String,
}

impl InlineAttachment {
    /// Wraps an attachment with a freshly generated Content-ID.
    #[must_use]
    pub fn new(attachment: Attachment, ids: &ContentIdGenerator) -> Self {
        Self {
            attachment,
            content_id: ids.next_id(),
        }
    }

    /// Returns the wrapped attachment.
    #[must_use]
    pub const fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    /// Returns the Content-ID (without angle brackets).
    #[must_use]
    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Returns the `cid:` URI to use in the HTML body.
    #[must_use]
    pub fn uri(&self) -> String {
        format!("cid:{}", self.content_id)
    }
}

/// Generates Content-IDs for inline attachments.
///
/// Each generator has a random seed and an atomic counter, so IDs stay unique
/// across threads and across generators. Create one per sending context and
/// share it by reference.
#[derive(Debug)]
pub struct ContentIdGenerator {
    seed: u64,
    counter: AtomicU64,
    domain: String,
}

impl ContentIdGenerator {
    /// Default right-hand side of generated IDs.
    pub const DEFAULT_DOMAIN: &'static str = "mailpost.local";

    /// Creates a generator with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().r#gen::<u64>())
    }

    /// Creates a deterministic generator (useful in tests).
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            counter: AtomicU64::new(0),
            domain: Self::DEFAULT_DOMAIN.to_string(),
        }
    }

    /// Sets the domain used after the `@`.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Generates the next ID, e.g. `3f1c...@mailpost.local`.
    #[must_use]
    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_be_bytes());
        hasher.update(n.to_be_bytes());
        let digest = hasher.finalize();

        format!("{}@{}", hex_prefix(&digest, 20), self.domain)
    }
}

impl Default for ContentIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase hex of the first `len` bytes.
pub(crate) fn hex_prefix(bytes: &[u8], len: usize) -> String {
    use std::fmt::Write as _;

    bytes.iter().take(len).fold(String::with_capacity(len * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_default_mime_type() {
        let attachment = Attachment::new(b"hello".to_vec(), "hello.txt");
        assert_eq!(attachment.mime_type(), DEFAULT_MIME_TYPE);
        assert_eq!(attachment.filename(), "hello.txt");
        assert_eq!(attachment.content(), &AttachmentContent::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn test_with_mime_type() {
        let attachment = Attachment::new(vec![1, 2, 3], "kitten.jpg").with_mime_type("image/jpeg");
        assert_eq!(attachment.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_from_file_uses_file_name() {
        let attachment = Attachment::from_file("/tmp/some/dir/report.pdf").unwrap();
        assert_eq!(attachment.filename(), "report.pdf");
        assert!(matches!(attachment.content(), AttachmentContent::File(_)));
    }

    #[test]
    fn test_from_file_without_name() {
        assert!(Attachment::from_file("/").is_err());
    }

    #[test]
    fn test_content_id_format() {
        let ids = ContentIdGenerator::with_seed(42);
        let id = ids.next_id();
        let (token, domain) = id.split_once('@').unwrap();

        assert_eq!(token.len(), 40);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(domain, ContentIdGenerator::DEFAULT_DOMAIN);
    }

    #[test]
    fn test_content_id_deterministic_with_seed() {
        let a = ContentIdGenerator::with_seed(7);
        let b = ContentIdGenerator::with_seed(7);
        assert_eq!(a.next_id(), b.next_id());
        assert_ne!(a.next_id(), ContentIdGenerator::with_seed(8).next_id());
    }

    #[test]
    fn test_content_id_custom_domain() {
        let ids = ContentIdGenerator::with_seed(1).with_domain("example.com");
        assert!(ids.next_id().ends_with("@example.com"));
    }

    #[test]
    fn test_content_ids_unique_across_threads() {
        let ids = Arc::new(ContentIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..500).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate content id generated");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn test_inline_uri() {
        let ids = ContentIdGenerator::with_seed(3);
        let inline = InlineAttachment::new(Attachment::new(vec![0], "a.png"), &ids);
        assert_eq!(inline.uri(), format!("cid:{}", inline.content_id()));
    }
}
