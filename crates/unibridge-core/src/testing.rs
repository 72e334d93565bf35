//! A scripted in-memory editor for tests
//!
//! [`FakeEditor`] is a [`Connector`] whose streams are `tokio::io::duplex` pipes
//! served by a task that speaks the bridge protocol. Replies are scripted per
//! request with [`Behavior`]; unscripted requests get an echo of their params.
//! Every connection, frame, and framing violation is recorded for assertions.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use crate::codec;
use crate::connection::Connector;

const PIPE_CAPACITY: usize = 64 * 1024;

/// How the fake editor answers one request
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Reply with this envelope
    Respond(Value),
    /// Reply with these exact bytes
    Raw(Vec<u8>),
    /// Wait, then reply with this envelope
    Delay(Duration, Value),
    /// Never reply
    Hang,
    /// Close the stream without replying
    Disconnect,
}

impl Behavior {
    /// A command result the bridge reports as successful
    pub fn success(data: Value) -> Self {
        Self::Respond(json!({
            "status": "success",
            "result": {"success": true, "message": "ok", "data": data},
        }))
    }

    /// A command the bridge received and rejected
    pub fn rejection(error: &str) -> Self {
        Self::Respond(json!({
            "status": "success",
            "result": {"success": false, "error": error},
        }))
    }
}

#[derive(Default)]
struct Inner {
    script: VecDeque<Behavior>,
    ping_behavior: Option<Behavior>,
    refuse: usize,
    connects: usize,
    pings: usize,
    requests: Vec<Value>,
    // Connection id of each command request, in arrival order
    request_connections: Vec<usize>,
    violations: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Scripted stand-in for the editor bridge
#[derive(Clone, Default)]
pub struct FakeEditor {
    inner: Arc<Mutex<Inner>>,
}

impl FakeEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the behavior for the next unanswered command request
    pub fn push(&self, behavior: Behavior) {
        self.inner.lock().script.push_back(behavior);
    }

    /// Fail the next `count` connection attempts with `ConnectionRefused`
    pub fn refuse_connects(&self, count: usize) {
        self.inner.lock().refuse = count;
    }

    /// Override the reply to `ping` (default: pong)
    pub fn answer_ping_with(&self, behavior: Behavior) {
        self.inner.lock().ping_behavior = Some(behavior);
    }

    /// Successful connections accepted so far
    pub fn connects(&self) -> usize {
        self.inner.lock().connects
    }

    pub fn pings(&self) -> usize {
        self.inner.lock().pings
    }

    /// Command frames received, in order
    pub fn requests(&self) -> Vec<Value> {
        self.inner.lock().requests.clone()
    }

    /// Which connection (numbered from 1) carried each command
    pub fn request_connections(&self) -> Vec<usize> {
        self.inner.lock().request_connections.clone()
    }

    /// Framing violations observed, such as a frame written before the previous reply
    pub fn violations(&self) -> Vec<String> {
        self.inner.lock().violations.clone()
    }

    /// Highest number of requests the editor was handling at once
    pub fn max_in_flight(&self) -> usize {
        self.inner.lock().max_in_flight
    }

    async fn serve(self, id: usize, mut stream: DuplexStream) {
        let mut buffer = Vec::new();
        loop {
            let frame = match read_frame(&mut stream, &mut buffer).await {
                Ok(Some(frame)) => frame,
                Ok(None) => return,
                Err(reason) => {
                    self.inner.lock().violations.push(reason);
                    return;
                }
            };

            // Anything already waiting means the client wrote ahead of our reply
            if buffer.iter().any(|b| !b.is_ascii_whitespace()) {
                self.inner
                    .lock()
                    .violations
                    .push(format!("connection {id}: frame arrived before reply was sent"));
            }

            let behavior = self.behavior_for(id, &frame);
            if !self.reply(&mut stream, &mut buffer, behavior).await {
                return;
            }
        }
    }

    fn behavior_for(&self, id: usize, frame: &[u8]) -> Behavior {
        let mut inner = self.inner.lock();

        if frame.trim_ascii() == codec::PING_FRAME {
            inner.pings += 1;
            return inner.ping_behavior.clone().unwrap_or_else(|| {
                Behavior::Respond(json!({"status": "success", "result": {"message": "pong"}}))
            });
        }

        let request: Value = match serde_json::from_slice(frame) {
            Ok(request) => request,
            Err(e) => {
                inner.violations.push(format!("connection {id}: unparseable frame: {e}"));
                return Behavior::Disconnect;
            }
        };
        let name = request["type"].as_str().unwrap_or_default().to_string();
        inner.requests.push(request.clone());
        inner.request_connections.push(id);

        inner.script.pop_front().unwrap_or_else(|| {
            Behavior::success(json!({"command": name, "params": request["params"]}))
        })
    }

    /// Returns false once the stream should be closed
    async fn reply(&self, stream: &mut DuplexStream, buffer: &mut Vec<u8>, behavior: Behavior) -> bool {
        {
            let mut inner = self.inner.lock();
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
        }

        let bytes = match behavior {
            Behavior::Respond(envelope) => Some(envelope.to_string().into_bytes()),
            Behavior::Raw(bytes) => Some(bytes),
            Behavior::Delay(delay, envelope) => {
                // Watch for early writes while the "editor" is busy
                let mut chunk = [0u8; 256];
                if let Ok(Ok(read)) = tokio::time::timeout(delay, stream.read(&mut chunk)).await {
                    if read > 0 {
                        buffer.extend_from_slice(&chunk[..read]);
                        self.inner
                            .lock()
                            .violations
                            .push("frame arrived while a request was in flight".to_string());
                    }
                }
                Some(envelope.to_string().into_bytes())
            }
            Behavior::Hang => {
                // Drain until the client gives up
                let mut sink = [0u8; 256];
                while matches!(stream.read(&mut sink).await, Ok(n) if n > 0) {}
                None
            }
            Behavior::Disconnect => None,
        };

        self.inner.lock().in_flight -= 1;

        match bytes {
            Some(bytes) => stream.write_all(&bytes).await.is_ok() && stream.flush().await.is_ok(),
            None => false,
        }
    }
}

impl Connector for FakeEditor {
    type Stream = DuplexStream;

    async fn connect(&self) -> io::Result<DuplexStream> {
        let id = {
            let mut inner = self.inner.lock();
            if inner.refuse > 0 {
                inner.refuse -= 1;
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            inner.connects += 1;
            inner.connects
        };

        let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
        tokio::spawn(self.clone().serve(id, server));
        Ok(client)
    }

    fn endpoint(&self) -> String {
        "fake-editor".to_string()
    }
}

/// Read one frame; `Ok(None)` when the client hung up
async fn read_frame(stream: &mut DuplexStream, buffer: &mut Vec<u8>) -> Result<Option<Vec<u8>>, String> {
    loop {
        if buffer.trim_ascii() == codec::PING_FRAME {
            let frame = std::mem::take(buffer);
            return Ok(Some(frame));
        }
        match codec::frame_len(buffer) {
            Ok(Some(len)) => return Ok(Some(buffer.drain(..len).collect())),
            Ok(None) => {}
            // A bare `ping` still accumulating looks like an invalid literal to the JSON reader
            Err(_) if codec::PING_FRAME.starts_with(buffer.trim_ascii()) => {}
            Err(e) => return Err(format!("interleaved or corrupt frame: {e}")),
        }

        let mut chunk = [0u8; 4096];
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return Ok(None),
            Ok(read) => buffer.extend_from_slice(&chunk[..read]),
        }
    }
}
