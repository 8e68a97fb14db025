//! SMTP reply reader.
//!
//! Replies are single-line or multi-line:
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! A reply ends at the first line made of three digits followed by a space
//! (or by nothing).

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Longest accepted reply line, in bytes.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Reads one complete reply.
///
/// In `strict` mode every continuation line must be `<code>-...` with the
/// same code as the terminal line; otherwise any line that is not terminal
/// counts as a continuation line.
///
/// # Errors
///
/// Returns [`Error::NoResponse`] if the stream ends before the terminal line,
/// and [`Error::MalformedReply`] for overlong or (in strict mode) malformed
/// lines.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R, strict: bool) -> Result<Reply> {
    let mut continuation = Vec::new();

    loop {
        let line = read_line(reader).await?;

        if let Some(code) = terminal_code(&line) {
            tracing::debug!("S: {line}");

            if strict {
                check_continuation(&continuation, code)?;
            }

            let mut message: Vec<String> = continuation.iter().map(|l| text_of(l)).collect();
            message.push(text_of(&line));
            return Ok(Reply::new(code, message, line));
        }

        tracing::trace!("S: {line}");
        continuation.push(line);
    }
}

/// Returns the reply code if `line` ends a reply.
#[must_use]
pub fn terminal_code(line: &str) -> Option<ReplyCode> {
    let bytes = line.as_bytes();
    let code = bytes.get(..3)?;
    if !code.iter().all(u8::is_ascii_digit) {
        return None;
    }
    match bytes.get(3) {
        None | Some(b' ') => line[..3].parse().ok().map(ReplyCode::new),
        Some(_) => None,
    }
}

/// Checks if a line is the last line of a multi-line reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    terminal_code(line).is_some()
}

fn check_continuation(lines: &[String], code: ReplyCode) -> Result<()> {
    let prefix = format!("{code}-");
    match lines.iter().find(|line| !line.starts_with(&prefix)) {
        Some(line) => Err(Error::MalformedReply(format!(
            "continuation line {line:?} does not match reply code {code}"
        ))),
        None => Ok(()),
    }
}

fn text_of(line: &str) -> String {
    line.get(4..).unwrap_or_default().to_string()
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    let limit = u64::try_from(MAX_LINE_LENGTH).unwrap_or(u64::MAX) + 1;
    let n = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;

    if n == 0 {
        return Err(Error::NoResponse);
    }
    if buf.len() > MAX_LINE_LENGTH {
        return Err(Error::MalformedReply(format!(
            "reply line exceeds {MAX_LINE_LENGTH} bytes"
        )));
    }

    let line = String::from_utf8_lossy(&buf);
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn read(input: &[u8], strict: bool) -> Result<Reply> {
        let mut reader = BufReader::new(input);
        read_reply(&mut reader, strict).await
    }

    #[tokio::test]
    async fn test_single_line_reply() {
        let reply = read(b"250 OK\r\n", false).await.unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, vec!["OK"]);
        assert_eq!(reply.last_line, "250 OK");
    }

    #[tokio::test]
    async fn test_multi_line_reply() {
        let reply = read(
            b"250-smtp.example.com\r\n250-PIPELINING\r\n250 8BITMIME\r\n",
            false,
        )
        .await
        .unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.message, vec!["smtp.example.com", "PIPELINING", "8BITMIME"]);
        assert_eq!(reply.last_line, "250 8BITMIME");
    }

    #[tokio::test]
    async fn test_bare_code_is_terminal() {
        let reply = read(b"354\r\n", false).await.unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.message, vec![""]);
    }

    #[tokio::test]
    async fn test_lenient_mode_skips_junk_lines() {
        let reply = read(b"hello there\r\n220 ready\r\n", false).await.unwrap();
        assert_eq!(reply.code, ReplyCode::SERVICE_READY);
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_mismatched_continuation() {
        let err = read(b"250-first\r\n251 last\r\n", true).await.unwrap_err();
        assert!(matches!(err, Error::MalformedReply(_)));

        let err = read(b"junk\r\n250 ok\r\n", true).await.unwrap_err();
        assert!(matches!(err, Error::MalformedReply(_)));

        let reply = read(b"250-first\r\n250 last\r\n", true).await.unwrap();
        assert_eq!(reply.message, vec!["first", "last"]);
    }

    #[tokio::test]
    async fn test_eof_without_terminal_line() {
        assert!(matches!(read(b"", false).await, Err(Error::NoResponse)));
        assert!(matches!(read(b"250-more coming\r\n", false).await, Err(Error::NoResponse)));
    }

    #[tokio::test]
    async fn test_overlong_line() {
        let mut input = vec![b'a'; MAX_LINE_LENGTH + 10];
        input.extend_from_slice(b"\r\n250 OK\r\n");
        assert!(matches!(read(&input, false).await, Err(Error::MalformedReply(_))));
    }

    #[tokio::test]
    async fn test_reads_one_reply_at_a_time() {
        let mut reader = BufReader::new(&b"220 hi\r\n250 OK\r\n"[..]);
        assert_eq!(read_reply(&mut reader, false).await.unwrap().code, ReplyCode::SERVICE_READY);
        assert_eq!(read_reply(&mut reader, false).await.unwrap().code, ReplyCode::OK);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(!is_last_reply_line("25"));
        assert!(!is_last_reply_line("ABC OK"));
    }
}
