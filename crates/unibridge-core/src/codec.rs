//! Wire codec for the editor bridge
//!
//! Requests are single JSON objects of the form `{"type": <command>, "params": {...}}`
//! written without a delimiter; the bridge reads until it has a complete value.
//! Replies use the same framing and wrap the command result in an envelope:
//!
//! ```text
//! {"status": "success", "result": {"success": true, "message": "...", "data": {...}}}
//! {"status": "error", "error": "Unknown command type: foo"}
//! ```
//!
//! The health probe is the bare frame `ping`, answered with a `pong` message.

use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

use crate::command::{Command, Response};
use crate::error::ProtocolError;

/// The handshake/health probe frame
pub const PING_FRAME: &[u8] = b"ping";

/// Encode a command as a request frame
pub fn encode(command: &Command) -> Result<Vec<u8>, ProtocolError> {
    #[derive(serde::Serialize)]
    struct Request<'a> {
        #[serde(rename = "type")]
        kind: &'a str,
        params: &'a crate::command::Params,
    }

    serde_json::to_vec(&Request {
        kind: &command.name,
        params: &command.params,
    })
    .map_err(ProtocolError::Encode)
}

/// Length of the first complete frame in `buffer`, if one has fully arrived.
///
/// Returns `Ok(None)` while the frame is still incomplete (or the buffer holds
/// only whitespace) and an error as soon as the bytes can no longer become valid
/// JSON. The returned length includes any leading whitespace.
pub fn frame_len(buffer: &[u8]) -> Result<Option<usize>, ProtocolError> {
    let mut stream = serde_json::Deserializer::from_slice(buffer).into_iter::<IgnoredAny>();
    match stream.next() {
        None => Ok(None),
        Some(Ok(_)) => Ok(Some(stream.byte_offset())),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(ProtocolError::Malformed(e)),
    }
}

/// Incremental version of [`frame_len`] for a buffer that only grows.
///
/// Tracks nesting and string state across calls so each byte is looked at once;
/// the full parser runs only on a candidate frame. Top-level scalars have no
/// closing delimiter and fall back to [`frame_len`] on the whole buffer.
#[derive(Debug, Default)]
pub struct FrameScanner {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    started: bool,
    scalar: bool,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all progress; call whenever bytes are removed from the buffer
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Same contract as [`frame_len`]. `buffer` must extend the one seen on the
    /// previous call unless [`FrameScanner::reset`] was called in between.
    pub fn frame_len(&mut self, buffer: &[u8]) -> Result<Option<usize>, ProtocolError> {
        if self.scalar {
            return self.settle(frame_len(buffer));
        }

        while self.scanned < buffer.len() {
            let byte = buffer[self.scanned];
            self.scanned += 1;

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if byte == b'\\' {
                    self.escaped = true;
                } else if byte == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return self.confirm(buffer);
                    }
                }
                continue;
            }

            match byte {
                b'"' => {
                    self.in_string = true;
                    self.started = true;
                }
                b'{' | b'[' => {
                    self.depth += 1;
                    self.started = true;
                }
                b'}' | b']' if self.depth == 0 => {
                    // Stray closer; let the parser describe it
                    return self.settle(frame_len(buffer));
                }
                b'}' | b']' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return self.confirm(buffer);
                    }
                }
                b if b.is_ascii_whitespace() => {}
                _ if !self.started => {
                    self.scalar = true;
                    return self.settle(frame_len(buffer));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn confirm(&mut self, buffer: &[u8]) -> Result<Option<usize>, ProtocolError> {
        let end = self.scanned;
        self.reset();
        match frame_len(&buffer[..end])? {
            Some(len) => Ok(Some(len)),
            None => Err(ProtocolError::Truncated),
        }
    }

    fn settle(
        &mut self,
        result: Result<Option<usize>, ProtocolError>,
    ) -> Result<Option<usize>, ProtocolError> {
        if !matches!(result, Ok(None)) {
            self.reset();
        }
        result
    }
}

#[derive(Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum Envelope {
    Success {
        #[serde(default)]
        result: Value,
    },
    Error {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Decode one reply frame into a [`Response`].
///
/// A remote rejection decodes successfully into `success == false`; only bytes
/// that are not a reply envelope produce a [`ProtocolError`].
pub fn decode(frame: &[u8]) -> Result<Response, ProtocolError> {
    let value: Value = serde_json::from_slice(frame).map_err(|e| {
        if e.is_eof() {
            ProtocolError::Truncated
        } else {
            ProtocolError::Malformed(e)
        }
    })?;

    let envelope: Envelope = serde_json::from_value(value)
        .map_err(|e| ProtocolError::UnexpectedShape(e.to_string()))?;

    match envelope {
        Envelope::Success { result } => response_from_result(result),
        Envelope::Error { error, message } => {
            let error = error
                .or_else(|| message.clone())
                .unwrap_or_else(|| "Unknown error".to_string());
            Ok(Response {
                success: false,
                data: None,
                error: Some(error),
                message: None,
            })
        }
    }
}

/// A result carrying its own `success` flag is the tool's response; anything
/// else is plain data from a command that always succeeds.
fn response_from_result(result: Value) -> Result<Response, ProtocolError> {
    let has_flag = result
        .as_object()
        .is_some_and(|object| object.get("success").is_some_and(Value::is_boolean));

    if has_flag {
        serde_json::from_value(result).map_err(|e| ProtocolError::UnexpectedShape(e.to_string()))
    } else {
        Ok(Response::ok(result))
    }
}

/// Whether a decoded reply answers the `ping` probe
pub fn is_pong(response: &Response) -> bool {
    let says_pong = |value: Option<&Value>| value.and_then(Value::as_str) == Some("pong");
    response.success
        && (response.message.as_deref() == Some("pong")
            || says_pong(response.data_field("message"))
            || says_pong(response.data.as_ref()))
}
