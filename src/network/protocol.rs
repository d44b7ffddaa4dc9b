//! RESP protocol implementation
//!
//! Three pieces: a framer that slices complete requests out of an incoming
//! byte buffer, a parser that turns one frame into its tokens, and the reply
//! encoder. The framer is the subtle one: TCP can hand us half a frame or
//! ten frames at once, so it must treat "not enough bytes yet" as a normal
//! outcome and only ever consume whole frames.

use crate::commands::ResponseValue;
use crate::error::{Result, RustyRadishError};
use bytes::{Bytes, BytesMut};

/// Hard cap on `*<N>` element counts.
pub const MAX_ARRAY_ELEMENTS: i64 = 1_000_000;
/// Hard cap on `$<L>` bulk payload lengths (512 MiB).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Extract every complete frame currently in `buffer`, consuming exactly
/// those bytes and leaving any trailing partial frame in place.
///
/// A frame is either a multi-bulk array (`*<N>\r\n` followed by N bulk
/// strings) or an inline command (anything else, up to `\r\n`). Partial
/// input is never an error; malformed or limit-breaking input is, and the
/// caller is expected to drop the connection.
pub fn split_frames(buffer: &mut BytesMut) -> Result<Vec<Bytes>> {
    let mut lengths = Vec::new();
    let mut cursor = 0usize;

    loop {
        match frame_end(&buffer[..], cursor)? {
            Some(end) => {
                lengths.push(end - cursor);
                cursor = end;
            }
            None => break,
        }
    }

    let mut frames = Vec::with_capacity(lengths.len());
    for len in lengths {
        frames.push(buffer.split_to(len).freeze());
    }
    Ok(frames)
}

/// Find the end offset of the frame starting at `start`, or `None` when the
/// frame is not yet complete.
fn frame_end(buf: &[u8], start: usize) -> Result<Option<usize>> {
    if start >= buf.len() {
        return Ok(None);
    }

    if buf[start] != b'*' {
        // Inline command: everything up to and including the next CRLF.
        return Ok(find_crlf(buf, start).map(|i| i + 2));
    }

    let Some(header_end) = find_crlf(buf, start + 1) else {
        return Ok(None);
    };
    let elements = parse_decimal(&buf[start + 1..header_end]).ok_or_else(|| {
        RustyRadishError::ProtocolError {
            message: "invalid multibulk length".to_string(),
        }
    })?;
    if !(0..=MAX_ARRAY_ELEMENTS).contains(&elements) {
        return Err(RustyRadishError::ProtocolError {
            message: format!("multibulk length {elements} out of range"),
        });
    }

    let mut pos = header_end + 2;
    for _ in 0..elements {
        if pos >= buf.len() {
            return Ok(None);
        }
        if buf[pos] != b'$' {
            return Err(RustyRadishError::ProtocolError {
                message: format!("expected '$', got '{}'", buf[pos] as char),
            });
        }
        let Some(len_end) = find_crlf(buf, pos + 1) else {
            return Ok(None);
        };
        let len = parse_decimal(&buf[pos + 1..len_end]).ok_or_else(|| {
            RustyRadishError::ProtocolError {
                message: "invalid bulk length".to_string(),
            }
        })?;
        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Err(RustyRadishError::ProtocolError {
                message: format!("bulk length {len} out of range"),
            });
        }

        let payload_start = len_end + 2;
        let payload_end = payload_start + len as usize;
        if payload_end + 2 > buf.len() {
            return Ok(None);
        }
        if &buf[payload_end..payload_end + 2] != b"\r\n" {
            return Err(RustyRadishError::ProtocolError {
                message: "bulk payload missing CRLF terminator".to_string(),
            });
        }
        pos = payload_end + 2;
    }

    Ok(Some(pos))
}

/// Tokenize one complete frame. Malformed frames yield an empty token list;
/// the dispatcher turns that into a protocol error reply.
pub fn parse_frame(frame: &[u8]) -> Vec<String> {
    if frame.is_empty() {
        return Vec::new();
    }

    if frame[0] != b'*' {
        // Inline command: whitespace-separated words.
        let Ok(text) = std::str::from_utf8(frame) else {
            return Vec::new();
        };
        return text.split_whitespace().map(str::to_string).collect();
    }

    let Some(header_end) = find_crlf(frame, 1) else {
        return Vec::new();
    };
    let Some(elements) = parse_decimal(&frame[1..header_end]) else {
        return Vec::new();
    };
    if !(0..=MAX_ARRAY_ELEMENTS).contains(&elements) {
        return Vec::new();
    }

    let mut tokens = Vec::with_capacity(elements as usize);
    let mut pos = header_end + 2;
    for _ in 0..elements {
        if pos >= frame.len() || frame[pos] != b'$' {
            return Vec::new();
        }
        let Some(len_end) = find_crlf(frame, pos + 1) else {
            return Vec::new();
        };
        let Some(len) = parse_decimal(&frame[pos + 1..len_end]) else {
            return Vec::new();
        };
        if !(0..=MAX_BULK_LEN).contains(&len) {
            return Vec::new();
        }

        let payload_start = len_end + 2;
        let payload_end = payload_start + len as usize;
        if payload_end + 2 > frame.len() {
            return Vec::new();
        }
        let Ok(token) = std::str::from_utf8(&frame[payload_start..payload_end]) else {
            return Vec::new();
        };
        tokens.push(token.to_string());
        pos = payload_end + 2;
    }

    tokens
}

/// Encode one reply value into its RESP wire form.
pub fn encode(value: &ResponseValue) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    encode_into(value, &mut buf);
    buf.freeze()
}

fn encode_into(value: &ResponseValue, buf: &mut BytesMut) {
    match value {
        ResponseValue::SimpleString(s) => {
            buf.extend_from_slice(b"+");
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ResponseValue::Error(message) => {
            buf.extend_from_slice(b"-");
            buf.extend_from_slice(message.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ResponseValue::Integer(n) => {
            buf.extend_from_slice(b":");
            buf.extend_from_slice(n.to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ResponseValue::BulkString(Some(s)) => {
            buf.extend_from_slice(b"$");
            buf.extend_from_slice(s.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            buf.extend_from_slice(s.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        ResponseValue::BulkString(None) | ResponseValue::Nil => {
            buf.extend_from_slice(b"$-1\r\n");
        }
        ResponseValue::Array(items) => {
            buf.extend_from_slice(b"*");
            buf.extend_from_slice(items.len().to_string().as_bytes());
            buf.extend_from_slice(b"\r\n");
            for item in items {
                encode_into(item, buf);
            }
        }
    }
}

/// Encode a bare `-<message>\r\n` error reply.
pub fn encode_error(message: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(message.len() + 3);
    buf.extend_from_slice(b"-");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.freeze()
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    if buf.len() < 2 || from >= buf.len() {
        return None;
    }
    (from..buf.len() - 1).find(|&i| buf[i] == b'\r' && buf[i + 1] == b'\n')
}

/// Parse an optionally-signed decimal integer; `None` on empty or junk.
fn parse_decimal(digits: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(digits).ok()?;
    if text.is_empty() {
        return None;
    }
    text.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_of(data: &[u8]) -> Vec<Bytes> {
        let mut buffer = BytesMut::from(data);
        split_frames(&mut buffer).unwrap()
    }

    #[test]
    fn splits_a_single_multibulk_frame() {
        let mut buffer = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n"[..]);
        let frames = split_frames(&mut buffer).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], b"*1\r\n$4\r\nPING\r\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn partial_frame_stays_in_the_buffer() {
        let mut buffer = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nfo"[..]);
        let frames = split_frames(&mut buffer).unwrap();
        assert!(frames.is_empty());
        assert_eq!(&buffer[..], b"*2\r\n$3\r\nGET\r\n$3\r\nfo");
    }

    #[test]
    fn partial_bulk_header_is_not_an_error() {
        let mut buffer = BytesMut::from(&b"*1\r\n$1"[..]);
        assert!(split_frames(&mut buffer).unwrap().is_empty());

        let mut buffer = BytesMut::from(&b"*2\r"[..]);
        assert!(split_frames(&mut buffer).unwrap().is_empty());
    }

    #[test]
    fn splits_pipelined_frames_in_order() {
        let data = b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n";
        let frames = frames_of(data);
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(&frame[..], b"*1\r\n$4\r\nPING\r\n");
        }
    }

    #[test]
    fn complete_frame_plus_partial_leaves_the_partial() {
        let mut buffer = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET"[..]);
        let frames = split_frames(&mut buffer).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&buffer[..], b"*2\r\n$3\r\nGET");
    }

    #[test]
    fn inline_commands_frame_on_crlf() {
        let frames = frames_of(b"PING\r\nECHO hello\r\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], b"PING\r\n");
        assert_eq!(&frames[1][..], b"ECHO hello\r\n");
    }

    #[test]
    fn inline_without_crlf_waits_for_more() {
        let mut buffer = BytesMut::from(&b"PING"[..]);
        assert!(split_frames(&mut buffer).unwrap().is_empty());
        assert_eq!(&buffer[..], b"PING");
    }

    #[test]
    fn oversized_element_count_is_a_protocol_error() {
        let mut buffer = BytesMut::from(&b"*1000001\r\n"[..]);
        assert!(split_frames(&mut buffer).is_err());
    }

    #[test]
    fn negative_element_count_is_a_protocol_error() {
        let mut buffer = BytesMut::from(&b"*-1\r\n"[..]);
        assert!(split_frames(&mut buffer).is_err());
    }

    #[test]
    fn oversized_bulk_length_is_a_protocol_error() {
        let mut buffer = BytesMut::from(&b"*1\r\n$536870913\r\n"[..]);
        assert!(split_frames(&mut buffer).is_err());
    }

    #[test]
    fn junk_multibulk_header_is_a_protocol_error() {
        let mut buffer = BytesMut::from(&b"*abc\r\n"[..]);
        assert!(split_frames(&mut buffer).is_err());
    }

    #[test]
    fn missing_dollar_is_a_protocol_error() {
        let mut buffer = BytesMut::from(&b"*1\r\n:42\r\n"[..]);
        assert!(split_frames(&mut buffer).is_err());
    }

    #[test]
    fn every_chunking_yields_the_same_frames() {
        // Framer property: feeding the stream in arbitrary chunks must
        // produce the frame sequence of the whole stream at once.
        let stream: &[u8] =
            b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\nPING\r\n";
        let expected = frames_of(stream);
        assert_eq!(expected.len(), 3);

        for chunk_size in 1..stream.len() {
            let mut buffer = BytesMut::new();
            let mut collected = Vec::new();
            for chunk in stream.chunks(chunk_size) {
                buffer.extend_from_slice(chunk);
                collected.extend(split_frames(&mut buffer).unwrap());
            }
            assert_eq!(collected, expected, "chunk size {chunk_size}");
            assert!(buffer.is_empty());
        }
    }

    #[test]
    fn parses_multibulk_tokens() {
        let tokens = parse_frame(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
        assert_eq!(tokens, vec!["SET", "foo", "bar"]);
    }

    #[test]
    fn parses_empty_bulk_token() {
        let tokens = parse_frame(b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$0\r\n\r\n");
        assert_eq!(tokens, vec!["SET", "key", ""]);
    }

    #[test]
    fn parses_inline_tokens() {
        assert_eq!(parse_frame(b"ECHO hello world\r\n"), vec!["ECHO", "hello", "world"]);
        assert_eq!(parse_frame(b"  PING  \r\n"), vec!["PING"]);
    }

    #[test]
    fn malformed_frames_parse_to_no_tokens() {
        assert!(parse_frame(b"").is_empty());
        assert!(parse_frame(b"*2\r\n$3\r\nGET\r\n").is_empty());
        assert!(parse_frame(b"*1\r\n$xyz\r\n").is_empty());
        assert!(parse_frame(b"*0\r\n").is_empty());
    }

    #[test]
    fn token_count_matches_the_header() {
        let tokens = parse_frame(b"*2\r\n$4\r\nLPOP\r\n$6\r\nmylist\r\n");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn encodes_simple_string() {
        let out = encode(&ResponseValue::SimpleString("OK".to_string()));
        assert_eq!(&out[..], b"+OK\r\n");
    }

    #[test]
    fn encodes_error() {
        let out = encode(&ResponseValue::Error("ERR boom".to_string()));
        assert_eq!(&out[..], b"-ERR boom\r\n");
        assert_eq!(&encode_error("ERR boom")[..], b"-ERR boom\r\n");
    }

    #[test]
    fn encodes_integer() {
        assert_eq!(&encode(&ResponseValue::Integer(42))[..], b":42\r\n");
        assert_eq!(&encode(&ResponseValue::Integer(-7))[..], b":-7\r\n");
    }

    #[test]
    fn encodes_bulk_and_nil() {
        let out = encode(&ResponseValue::BulkString(Some("bar".to_string())));
        assert_eq!(&out[..], b"$3\r\nbar\r\n");
        assert_eq!(&encode(&ResponseValue::BulkString(None))[..], b"$-1\r\n");
        assert_eq!(&encode(&ResponseValue::Nil)[..], b"$-1\r\n");
    }

    #[test]
    fn encodes_arrays_recursively() {
        let out = encode(&ResponseValue::Array(vec![
            ResponseValue::BulkString(Some("b".to_string())),
            ResponseValue::BulkString(Some("a".to_string())),
            ResponseValue::Integer(3),
        ]));
        assert_eq!(&out[..], b"*3\r\n$1\r\nb\r\n$1\r\na\r\n:3\r\n");
        assert_eq!(&encode(&ResponseValue::Array(vec![]))[..], b"*0\r\n");
    }
}
