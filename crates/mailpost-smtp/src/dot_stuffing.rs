//! Transparent dot-stuffing for the DATA phase (RFC 5321 section 4.5.2).
//!
//! Every `CRLF "."` in the message body is sent as `CRLF ".."`, so a line
//! holding a single dot can never end the transmission early. The transform
//! is streaming: a sequence spanning two writes is still detected.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::AsyncWrite;

/// Chunk-boundary-aware dot-stuffer.
///
/// Output is independent of how the input is split into chunks.
#[derive(Debug, Clone, Default)]
pub struct DotStuffer {
    /// Last two raw bytes seen; zero means "nothing seen".
    carry: [u8; 2],
}

impl DotStuffer {
    /// Creates a stuffer at the start of a stream.
    #[must_use]
    pub const fn new() -> Self {
        Self { carry: [0; 2] }
    }

    /// Creates a stuffer that treats the stream as starting a new line, so a
    /// leading dot is stuffed too. This is the state right after `DATA`.
    #[must_use]
    pub const fn at_line_start() -> Self {
        Self { carry: *b"\r\n" }
    }

    /// Stuffs `chunk`, appending the result to `out`.
    pub fn stuff_into(&mut self, chunk: &[u8], out: &mut BytesMut) {
        out.reserve(chunk.len() + 1);
        let mut start = 0;

        for (i, &byte) in chunk.iter().enumerate() {
            if byte == b'.' && self.carry == *b"\r\n" {
                out.extend_from_slice(&chunk[start..=i]);
                out.put_u8(b'.');
                start = i + 1;
            }
            self.carry = [self.carry[1], byte];
        }

        out.extend_from_slice(&chunk[start..]);
    }

    /// Stuffs `chunk` into a fresh buffer.
    #[must_use]
    pub fn stuff(&mut self, chunk: &[u8]) -> BytesMut {
        let mut out = BytesMut::with_capacity(chunk.len() + 1);
        self.stuff_into(chunk, &mut out);
        out
    }
}

/// An [`AsyncWrite`] adapter that dot-stuffs everything written through it.
///
/// Stuffed output is staged in an internal buffer. A write is only accepted
/// once earlier output has been handed to the inner writer, and
/// `flush`/`shutdown` drain the buffer first, so flushing before dropping the
/// adapter guarantees nothing is lost.
#[derive(Debug)]
pub struct DotStuffingWriter<W> {
    inner: W,
    stuffer: DotStuffer,
    pending: BytesMut,
}

impl<W: AsyncWrite + Unpin> DotStuffingWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self::with_stuffer(inner, DotStuffer::new())
    }

    /// Wraps a writer positioned at the start of a line, as the DATA payload is.
    pub fn at_line_start(inner: W) -> Self {
        Self::with_stuffer(inner, DotStuffer::at_line_start())
    }

    fn with_stuffer(inner: W, stuffer: DotStuffer) -> Self {
        Self {
            inner,
            stuffer,
            pending: BytesMut::new(),
        }
    }

    /// Returns the inner writer. Call `flush` first, or staged bytes are lost.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.pending.is_empty() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.pending))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.pending.advance(n);
        }
        Poll::Ready(Ok(()))
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for DotStuffingWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;

        this.stuffer.stuff_into(buf, &mut this.pending);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
