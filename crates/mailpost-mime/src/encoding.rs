//! MIME transfer encodings.
//!
//! Supports Base64, Quoted-Printable (RFC 2045) and RFC 2047 header encoding.
//! All line breaks produced here are CRLF and no output line exceeds
//! [`MAX_LINE_LENGTH`] characters.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::borrow::Cow;
use std::fmt::Write as _;

/// Maximum encoded line length (RFC 2045 section 6.7 / 6.8).
pub const MAX_LINE_LENGTH: usize = 76;

/// Line break sequence used by every encoder.
pub const CRLF: &str = "\r\n";

/// Number of input bytes that encode to exactly one full Base64 line.
pub const BASE64_LINE_BYTES: usize = MAX_LINE_LENGTH / 4 * 3;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, wrapped into lines of 76 characters.
///
/// Lines are separated by CRLF; there is no trailing line break.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 4 / 3 + data.len() / 28 + 4);

    for (index, chunk) in data.chunks(BASE64_LINE_BYTES).enumerate() {
        if index > 0 {
            result.push_str(CRLF);
        }
        STANDARD.encode_string(chunk, &mut result);
    }

    result
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// CRLF pairs in the input are kept as hard line breaks, so callers should run
/// the text through [`normalize_line_breaks`] first. Long lines are wrapped
/// with `=` CRLF soft breaks.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    encode_qp(text.as_bytes(), Some(MAX_LINE_LENGTH), false)
}

/// Escapes a header value for use in a header line.
///
/// 7-bit values are returned unchanged. Anything else becomes a single RFC
/// 2047 encoded-word, `=?UTF-8?Q?...?=`, that never contains a line break.
#[must_use]
pub fn encode_header_value(value: &str) -> Cow<'_, str> {
    if value.is_ascii() {
        return Cow::Borrowed(value);
    }

    let encoded = encode_qp(value.as_bytes(), None, true);
    // Unwrapped output has no soft breaks; the trim guards the invariant.
    let encoded = encoded.trim_end_matches("=\r\n");

    Cow::Owned(format!("=?UTF-8?Q?{encoded}?="))
}

/// Converts bare CR, bare LF and CRLF line breaks into CRLF.
#[must_use]
pub fn normalize_line_breaks(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let canonical = bytes.iter().enumerate().all(|(i, &b)| match b {
        b'\r' => bytes.get(i + 1) == Some(&b'\n'),
        b'\n' => i > 0 && bytes[i - 1] == b'\r',
        _ => true,
    });
    if canonical {
        return Cow::Borrowed(text);
    }

    let mut result = String::with_capacity(text.len() + text.len() / 16);
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                result.push_str(CRLF);
            }
            '\n' => result.push_str(CRLF),
            _ => result.push(ch),
        }
    }

    Cow::Owned(result)
}

/// Quoted-Printable core.
///
/// `line_limit` of `None` disables soft line breaks. In `header` mode `?` and
/// `_` are encoded as well, since both are significant inside an
/// encoded-word.
fn encode_qp(input: &[u8], line_limit: Option<usize>, header: bool) -> String {
    let mut result = String::with_capacity(input.len() + input.len() / 4);
    let mut line_length = 0;
    let mut i = 0;

    while i < input.len() {
        let byte = input[i];

        if byte == b'\r' && input.get(i + 1) == Some(&b'\n') && !header {
            result.push_str(CRLF);
            line_length = 0;
            i += 2;
            continue;
        }

        let rest = &input[i + 1..];
        let before_break = rest.is_empty() || rest.starts_with(b"\r\n");

        let literal = match byte {
            b'?' | b'_' if header => false,
            b'!'..=b'<' | b'>'..=b'~' => true,
            // Trailing whitespace would be stripped in transit
            b' ' | b'\t' => !before_break,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // One column is reserved for the soft-break '='
        if let Some(limit) = line_limit
            && line_length + width > limit - 1
        {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            result.push(char::from(byte));
        } else {
            let _ = write!(result, "={byte:02X}");
        }
        line_length += width;
        i += 1;
    }

    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode() {
        assert_eq!(encode_base64(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_base64_wrapped_short() {
        assert_eq!(encode_base64_wrapped(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(encode_base64_wrapped(b""), "");
    }

    #[test]
    fn test_base64_wrapped_lines() {
        let data = vec![0xA5u8; 200];
        let encoded = encode_base64_wrapped(&data);
        let lines: Vec<&str> = encoded.split("\r\n").collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 76);
        assert_eq!(lines[1].len(), 76);
        assert!(!encoded.ends_with("\r\n"));
        assert_eq!(
            STANDARD.decode(lines.concat()).unwrap(),
            data,
            "wrapped output must decode to the input"
        );
    }

    #[test]
    fn test_quoted_printable_ascii_passthrough() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_utf8() {
        assert_eq!(
            encode_quoted_printable("look: æøåÆØÅ! whoa!"),
            "look: =C3=A6=C3=B8=C3=A5=C3=86=C3=98=C3=85! whoa!"
        );
    }

    #[test]
    fn test_quoted_printable_equals_sign() {
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_keeps_hard_breaks() {
        assert_eq!(
            encode_quoted_printable("It's me!\r\n\r\nTake care."),
            "It's me!\r\n\r\nTake care."
        );
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        assert_eq!(encode_quoted_printable("end \r\nnext\t"), "end=20\r\nnext=09");
    }

    #[test]
    fn test_quoted_printable_soft_break_position() {
        let html = concat!(
            "<strong>It's me! Rasmus!</strong><br>I love kittens, look:<br>",
            "<img src=\"cid:b4d9305ff3748b154ca751b562342c527c23d3bf@example.io\"><br>",
            "Take care, friend.",
        );
        let encoded = encode_quoted_printable(html);

        assert_eq!(
            encoded,
            "<strong>It's me! Rasmus!</strong><br>I love kittens, look:<br><img src=3D\"c=\r\n\
             id:b4d9305ff3748b154ca751b562342c527c23d3bf@example.io\"><br>Take care, frie=\r\n\
             nd."
        );
    }

    #[test]
    fn test_quoted_printable_never_splits_escape() {
        let text = "a".repeat(74) + "é";
        let encoded = encode_quoted_printable(&text);
        let first = encoded.split("\r\n").next().unwrap();

        assert_eq!(first, format!("{}=", "a".repeat(74)));
        assert!(encoded.ends_with("=C3=A9"));
    }

    #[test]
    fn test_header_value_ascii_unchanged() {
        assert!(matches!(encode_header_value("Hey, Rasmus!"), Cow::Borrowed(_)));
        assert_eq!(encode_header_value("Hey, Rasmus!"), "Hey, Rasmus!");
    }

    #[test]
    fn test_header_value_encoded_word() {
        assert_eq!(
            encode_header_value("Rasmus åh Schultz"),
            "=?UTF-8?Q?Rasmus =C3=A5h Schultz?="
        );
    }

    #[test]
    fn test_header_value_escapes_question_mark_and_underscore() {
        assert_eq!(encode_header_value("ø?_"), "=?UTF-8?Q?=C3=B8=3F=5F?=");
    }

    #[test]
    fn test_header_value_long_stays_on_one_line() {
        let subject = concat!(
            "We need a special character - Ø - so that the value is escaped, ",
            "and more than 75 characters in total",
        );
        let encoded = encode_header_value(subject);

        assert!(encoded.starts_with("=?UTF-8?Q?"));
        assert!(encoded.ends_with("?="));
        assert!(!encoded.contains('\r'));
        assert!(!encoded.contains('\n'));
    }

    #[test]
    fn test_normalize_line_breaks() {
        assert_eq!(normalize_line_breaks("a\nb\rc\r\nd"), "a\r\nb\r\nc\r\nd");
        assert_eq!(normalize_line_breaks("\n\n"), "\r\n\r\n");
        assert!(matches!(normalize_line_breaks("a\r\nb"), Cow::Borrowed(_)));
    }

    proptest! {
        #[test]
        fn quoted_printable_lines_fit(text in "\\PC{0,400}") {
            let normalized = normalize_line_breaks(&text);
            let encoded = encode_quoted_printable(&normalized);
            for line in encoded.split("\r\n") {
                prop_assert!(line.len() <= MAX_LINE_LENGTH, "line too long: {line:?}");
                prop_assert!(line.is_ascii());
            }
        }

        #[test]
        fn header_values_are_single_line(value in "\\PC{0,200}") {
            let encoded = encode_header_value(&value);
            prop_assert!(!encoded.contains('\n'));
            if !value.is_ascii() {
                prop_assert!(encoded.starts_with("=?UTF-8?Q?"));
                prop_assert!(encoded.is_ascii());
            }
        }
    }
}
