//! Low-level output writer with transfer encodings.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::encoding::{BASE64_LINE_BYTES, CRLF, encode_base64_wrapped, encode_quoted_printable};
use crate::error::{Error, Result};

/// Base64 lines encoded per read when streaming from a reader.
const STREAM_LINES: usize = 64;

/// Writes raw, quoted-printable and Base64 data to an async sink.
///
/// The writer keeps no state between calls apart from the sink itself.
#[derive(Debug)]
pub struct EncodingWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> EncodingWriter<W> {
    /// Wraps a sink.
    pub const fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes bytes unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes).await?;
        Ok(())
    }

    /// Writes `text` followed by CRLF.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub async fn write_line(&mut self, text: &str) -> Result<()> {
        self.inner.write_all(text.as_bytes()).await?;
        self.inner.write_all(CRLF.as_bytes()).await?;
        Ok(())
    }

    /// Writes `text` quoted-printable encoded.
    ///
    /// CRLF in `text` is kept as a hard line break.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub async fn write_quoted_printable(&mut self, text: &str) -> Result<()> {
        self.write_raw(encode_quoted_printable(text).as_bytes()).await
    }

    /// Writes `data` Base64 encoded in 76-column lines, without a trailing
    /// line break.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub async fn write_base64(&mut self, data: &[u8]) -> Result<()> {
        self.write_raw(encode_base64_wrapped(data).as_bytes()).await
    }

    /// Streams `reader` to the sink Base64 encoded; output is identical to
    /// [`write_base64`](Self::write_base64) over the whole content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttachmentRead`] if reading fails and [`Error::Io`] if
    /// the sink fails.
    pub async fn write_base64_from<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<()> {
        let mut buf = vec![0u8; BASE64_LINE_BYTES * STREAM_LINES];
        let mut first = true;

        loop {
            // Only the final chunk may end in a partial line
            let filled = fill(reader, &mut buf).await.map_err(Error::AttachmentRead)?;
            if filled == 0 {
                break;
            }
            if !first {
                self.inner.write_all(CRLF.as_bytes()).await?;
            }
            self.write_base64(&buf[..filled]).await?;
            first = false;

            if filled < buf.len() {
                break;
            }
        }

        Ok(())
    }

    /// Flushes the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads until `buf` is full or the reader is exhausted.
async fn fill<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_truncation)]
    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 256) as u8).collect()
    }

    #[tokio::test]
    async fn test_write_line() {
        let mut writer = EncodingWriter::new(Vec::new());
        writer.write_line("Subject: hi").await.unwrap();
        writer.write_line("").await.unwrap();
        assert_eq!(writer.into_inner(), b"Subject: hi\r\n\r\n");
    }

    #[tokio::test]
    async fn test_write_quoted_printable() {
        let mut writer = EncodingWriter::new(Vec::new());
        writer.write_quoted_printable("æ=1\r\nok").await.unwrap();
        assert_eq!(writer.into_inner(), b"=C3=A6=3D1\r\nok");
    }

    #[tokio::test]
    async fn test_write_base64() {
        let mut writer = EncodingWriter::new(Vec::new());
        writer.write_base64(b"Hello").await.unwrap();
        assert_eq!(writer.into_inner(), b"SGVsbG8=");
    }

    #[tokio::test]
    async fn test_base64_from_reader_matches_in_memory() {
        for len in [0, 1, 56, 57, 58, 3648, 3649, 10_000] {
            let data = sample(len);

            let mut expected = EncodingWriter::new(Vec::new());
            expected.write_base64(&data).await.unwrap();

            let mut streamed = EncodingWriter::new(Vec::new());
            streamed.write_base64_from(&mut data.as_slice()).await.unwrap();

            assert_eq!(streamed.into_inner(), expected.into_inner(), "length {len}");
        }
    }

    #[tokio::test]
    async fn test_base64_from_short_reads() {
        let data = sample(5000);
        let mut builder = tokio_test::io::Builder::new();
        for chunk in data.chunks(100) {
            builder.read(chunk);
        }
        let mut reader = builder.build();

        let mut streamed = EncodingWriter::new(Vec::new());
        streamed.write_base64_from(&mut reader).await.unwrap();

        assert_eq!(streamed.into_inner(), encode_base64_wrapped(&data).into_bytes());
    }

    #[tokio::test]
    async fn test_base64_from_read_failure_is_attachment_error() {
        let mut reader = tokio_test::io::Builder::new()
            .read(b"abc")
            .read_error(std::io::Error::other("disk gone"))
            .build();

        let mut streamed = EncodingWriter::new(Vec::new());
        let err = streamed.write_base64_from(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::AttachmentRead(_)));
    }
}
