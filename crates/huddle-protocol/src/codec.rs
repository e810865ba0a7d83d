//! Codec for encoding and decoding STOMP frames.
//!
//! The wire format is:
//! - `COMMAND` line
//! - zero or more `name:value` header lines
//! - a blank line
//! - the body, terminated by a NUL byte
//!
//! Bare end-of-line sequences between frames are heart-beats and are skipped.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::frames::{headers, Command, Frame};

/// Maximum frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum")]
    FrameTooLarge(usize),

    /// Not enough data to decode a frame.
    #[error("Incomplete frame")]
    Incomplete,

    /// Command line is not a STOMP command.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Header line could not be parsed or unescaped.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// `content-length` header is not a valid length.
    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    /// Body was not followed by a NUL byte.
    #[error("Frame body is not NUL terminated")]
    MissingTerminator,

    /// JSON payload error.
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Invalid frame data.
    #[error("Invalid frame: {0}")]
    Invalid(String),
}

/// Encode a frame to bytes.
///
/// A `content-length` header is added for non-empty bodies that lack one.
///
/// # Errors
///
/// Returns an error if the encoded frame is too large.
pub fn encode(frame: &Frame) -> Result<Bytes, ProtocolError> {
    let mut buf = BytesMut::with_capacity(64 + frame.body.len());
    encode_into(frame, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a frame into an existing buffer.
///
/// On error the buffer is left as it was.
///
/// # Errors
///
/// Returns an error if the encoded frame is too large.
pub fn encode_into(frame: &Frame, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let start = buf.len();
    let escape = frame.command.escapes_headers();

    buf.put_slice(frame.command.as_str().as_bytes());
    buf.put_u8(b'\n');

    for (name, value) in &frame.headers {
        if escape {
            escape_into(name, buf);
            buf.put_u8(b':');
            escape_into(value, buf);
        } else {
            buf.put_slice(name.as_bytes());
            buf.put_u8(b':');
            buf.put_slice(value.as_bytes());
        }
        buf.put_u8(b'\n');
    }

    if !frame.body.is_empty() && frame.header(headers::CONTENT_LENGTH).is_none() {
        buf.put_slice(format!("{}:{}\n", headers::CONTENT_LENGTH, frame.body.len()).as_bytes());
    }

    buf.put_u8(b'\n');
    buf.put_slice(&frame.body);
    buf.put_u8(0);

    let size = buf.len() - start;
    if size > MAX_FRAME_SIZE {
        buf.truncate(start);
        return Err(ProtocolError::FrameTooLarge(size));
    }

    Ok(())
}

/// Decode a single frame from bytes.
///
/// # Errors
///
/// Returns an error if the data is incomplete, too large, or invalid.
pub fn decode(data: &[u8]) -> Result<Frame, ProtocolError> {
    let mut buf = BytesMut::from(data);
    decode_from(&mut buf)?.ok_or(ProtocolError::Incomplete)
}

/// Try to decode a frame from a buffer, advancing it if successful.
///
/// Returns `Ok(Some(frame))` if a complete frame was decoded,
/// `Ok(None)` if more data is needed, or `Err` on protocol error.
///
/// # Errors
///
/// Returns an error if the frame is too large or invalid.
pub fn decode_from(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    decode_with_limit(buf, MAX_FRAME_SIZE)
}

fn decode_with_limit(buf: &mut BytesMut, limit: usize) -> Result<Option<Frame>, ProtocolError> {
    let heart_beats = buf
        .iter()
        .take_while(|b| **b == b'\n' || **b == b'\r')
        .count();
    buf.advance(heart_beats);

    if buf.is_empty() {
        return Ok(None);
    }

    let Some((head_len, body_start)) = find_header_end(buf) else {
        if buf.len() > limit {
            return Err(ProtocolError::FrameTooLarge(buf.len()));
        }
        return Ok(None);
    };

    let (command, frame_headers) = parse_head(&buf[..head_len])?;

    let content_length = frame_headers
        .iter()
        .find(|(k, _)| k == headers::CONTENT_LENGTH)
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| ProtocolError::InvalidContentLength(v.clone()))
        })
        .transpose()?;

    let body_end = match content_length {
        Some(len) => {
            let end = body_start
                .checked_add(len)
                .filter(|end| *end <= limit)
                .ok_or(ProtocolError::FrameTooLarge(len))?;
            // Terminator sits at `end`; avoid `end + 1`, which can overflow.
            if buf.len() <= end {
                return Ok(None);
            }
            if buf[end] != 0 {
                return Err(ProtocolError::MissingTerminator);
            }
            end
        }
        None => match buf[body_start..].iter().position(|b| *b == 0) {
            Some(offset) => body_start + offset,
            None => {
                if buf.len() > limit {
                    return Err(ProtocolError::FrameTooLarge(buf.len()));
                }
                return Ok(None);
            }
        },
    };

    let mut raw = buf.split_to(body_end + 1);
    raw.truncate(body_end);
    let body = raw.split_off(body_start).freeze();

    Ok(Some(Frame {
        command,
        headers: frame_headers,
        body,
    }))
}

/// Locate the blank line ending the header block.
///
/// Returns the length of the head (command plus header lines, without the
/// final EOL) and the offset where the body starts.
fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some((i, i + 2)),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i, i + 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn parse_head(head: &[u8]) -> Result<(Command, Vec<(String, String)>), ProtocolError> {
    let head = std::str::from_utf8(head)
        .map_err(|_| ProtocolError::Invalid("header block is not UTF-8".into()))?;

    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
    let command: Command = lines.next().unwrap_or_default().parse()?;
    let escaped = command.escapes_headers();

    let mut frame_headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::InvalidHeader(line.to_string()))?;
        if escaped {
            frame_headers.push((unescape(name)?, unescape(value)?));
        } else {
            frame_headers.push((name.to_string(), value.to_string()));
        }
    }

    Ok((command, frame_headers))
}

fn escape_into(value: &str, buf: &mut BytesMut) {
    for c in value.chars() {
        match c {
            '\\' => buf.put_slice(b"\\\\"),
            '\n' => buf.put_slice(b"\\n"),
            '\r' => buf.put_slice(b"\\r"),
            ':' => buf.put_slice(b"\\c"),
            _ => {
                let mut tmp = [0u8; 4];
                buf.put_slice(c.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
}

fn unescape(value: &str) -> Result<String, ProtocolError> {
    if !value.contains('\\') {
        return Ok(value.to_string());
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(ProtocolError::InvalidHeader(value.to_string())),
        }
    }
    Ok(out)
}

/// Streaming decoder for one connection's inbound byte stream.
#[derive(Debug)]
pub struct FrameCodec {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Create a new codec instance with the default frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Create a codec that rejects frames larger than `max_frame_size`.
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame_size,
        }
    }

    /// Append received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next buffered frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffered frame is invalid. The offending bytes
    /// are discarded so the stream can resynchronise on the next frame.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        match decode_with_limit(&mut self.buffer, self.max_frame_size) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }

    /// Encode a frame to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self, frame: &Frame) -> Result<Bytes, ProtocolError> {
        let data = encode(frame)?;
        if data.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge(data.len()));
        }
        Ok(data)
    }

    /// Number of buffered bytes not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
