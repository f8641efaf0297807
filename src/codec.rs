use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::frame::Frame;
use crate::headers::Headers;

/// The heartbeat "frame": a single LF with no command and no NUL terminator.
pub const HEARTBEAT: &[u8] = b"\n";

/// Build the wire text for `command` followed by pre-formatted `key:value`
/// header lines, the blank separator line and the optional body.
///
/// Lines are emitted verbatim and in order. The returned text carries no NUL
/// terminator; see [`to_payload`].
pub fn encode_lines<S: AsRef<str>>(command: &str, lines: &[S], body: Option<&str>) -> String {
    encode_lines_with_headers(command, None, lines, body)
}

/// Like [`encode_lines`], but emits every entry of `extra` immediately after
/// the command line and before the positional `lines`.
pub fn encode_lines_with_headers<S: AsRef<str>>(
    command: &str,
    extra: Option<&Headers>,
    lines: &[S],
    body: Option<&str>,
) -> String {
    let mut text = String::with_capacity(command.len() + 64 + body.map_or(0, str::len));
    text.push_str(command);
    text.push('\n');
    if let Some(extra) = extra {
        for (k, v) in extra {
            text.push_str(k);
            text.push(':');
            text.push_str(v);
            text.push('\n');
        }
    }
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    text.push('\n');
    if let Some(body) = body {
        text.push_str(body);
    }
    text
}

/// Serialise a structured frame into wire text (without NUL terminator).
pub fn encode_frame(frame: &Frame) -> String {
    let lines: Vec<String> = frame
        .headers
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect();
    let body = if frame.body.is_empty() {
        None
    } else {
        Some(frame.body.as_str())
    };
    encode_lines(&frame.command, lines.as_slice(), body)
}

/// Turn frame text into the byte payload handed to the transport: the text
/// followed by one NUL octet, so the payload is one byte longer than the
/// text.
pub fn to_payload(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(0);
    buf.freeze()
}

/// Decode a received text buffer into a [`Frame`].
///
/// Decoding is tolerant and never fails:
/// - trailing NUL terminators and leading heartbeat newlines are ignored;
/// - the first line is the command, passed through unchanged (an empty
///   buffer yields an empty command);
/// - header lines run until the first empty line and are split at the first
///   colon; lines without a colon are dropped;
/// - everything after the blank line is the body, kept as-is.
///
/// Header values are not unescaped: `\n`, `\c` and `\\` sequences arrive
/// exactly as the server wrote them.
pub fn decode(text: &str) -> Frame {
    let text = text
        .trim_end_matches('\0')
        .trim_start_matches(['\r', '\n']);

    let (command, mut rest) = match text.split_once('\n') {
        Some((command, rest)) => (command, rest),
        None => (text, ""),
    };
    let mut frame = Frame::new(command.trim_end_matches('\r'));

    loop {
        let (line, remainder, terminated) = match rest.split_once('\n') {
            Some((line, remainder)) => (line, remainder, true),
            None => (rest, "", false),
        };
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if terminated {
                frame.body = remainder.to_string();
            }
            break;
        }
        match line.split_once(':') {
            Some((key, value)) => frame.headers.append(key, value),
            None => trace!(line, "dropping header line without colon"),
        }
        if !terminated {
            break;
        }
        rest = remainder;
    }

    frame
}

/// Split the body of a SockJS `a` frame into the STOMP frames it carries.
///
/// `payload` is everything after the leading `a`, normally a JSON array of
/// strings (`["CONNECTED\n...\n\n\u0000"]`). When it is not, the raw payload
/// is returned as a single frame so the decoder can still have a go at it.
pub fn unwrap_sockjs(payload: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(payload) {
        Ok(frames) => frames,
        Err(e) => {
            trace!(error = %e, "SockJS array frame is not a JSON string array");
            vec![payload.to_string()]
        }
    }
}

/// Items produced by [`StompCodec`] when framing a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StompItem {
    /// The text of one NUL-terminated frame, terminator removed.
    Text(String),
    /// A single heartbeat pulse (LF).
    Heartbeat,
}

/// Largest frame [`StompCodec`] buffers by default while waiting for its NUL.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for
/// stream transports (plain TCP or TLS) carrying STOMP text frames.
///
/// Decoding only finds frame boundaries; the text of each frame is parsed
/// later by [`decode`]. Frames that are not valid UTF-8 are dropped and the
/// next frame is tried. A frame longer than the configured maximum is an
/// `InvalidData` error. Encoding writes payloads built by [`to_payload`] (or
/// [`HEARTBEAT`]) verbatim.
#[derive(Debug)]
pub struct StompCodec {
    max_frame_len: usize,
}

impl StompCodec {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    /// Codec that gives up on frames longer than `max_frame_len` bytes
    /// (terminator excluded).
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn too_long(&self, len: usize) -> io::Error {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "frame of {} bytes exceeds limit of {} bytes",
                len, self.max_frame_len
            ),
        )
    }
}

impl Default for StompCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StompCodec {
    type Item = StompItem;
    type Error = io::Error;

    /// Returns `Ok(None)` and leaves `src` untouched until a whole frame
    /// (up to and including its NUL) has arrived.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let head = (src.first().copied(), src.get(1).copied());
            match head {
                (None, _) => return Ok(None),
                (Some(b'\n'), _) => {
                    src.advance(1);
                    return Ok(Some(StompItem::Heartbeat));
                }
                (Some(b'\r'), Some(b'\n')) => {
                    src.advance(2);
                    return Ok(Some(StompItem::Heartbeat));
                }
                _ => {}
            }

            let Some(nul) = src.iter().position(|&b| b == 0) else {
                if src.len() > self.max_frame_len {
                    return Err(self.too_long(src.len()));
                }
                return Ok(None);
            };
            if nul > self.max_frame_len {
                return Err(self.too_long(nul));
            }

            let raw = src.split_to(nul);
            src.advance(1);
            // optional EOL after the terminator
            if src.first() == Some(&b'\n') {
                src.advance(1);
            }

            match String::from_utf8(raw.to_vec()) {
                Ok(text) => return Ok(Some(StompItem::Text(text))),
                Err(e) => trace!(len = nul, error = %e, "discarding frame with invalid utf8"),
            }
        }
    }
}

impl Encoder<Bytes> for StompCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}
