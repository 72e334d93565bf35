//! A single channel to the editor bridge
//!
//! [`Connection`] drives one framed request/reply exchange at a time over any
//! byte stream produced by a [`Connector`]. Correlation is positional, so a
//! connection that saw a timeout, a broken pipe, garbage bytes, or an abandoned
//! request is marked [`ConnectionState::Faulted`] and must be replaced.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::codec;
use crate::error::{Error, ProtocolError, Result};

const READ_CHUNK: usize = 64 * 1024;

/// Lifecycle of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Faulted,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Faulted => "faulted",
        };
        write!(f, "{name}")
    }
}

/// Something that can open a byte stream to the editor
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a new stream
    fn connect(&self) -> impl Future<Output = io::Result<Self::Stream>> + Send;

    /// Human-readable endpoint for logs and error messages
    fn endpoint(&self) -> String;
}

/// Connects to the bridge's TCP listener
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        // Frames are small and latency-bound
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings that govern a connection's exchanges
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Bound on establishing the stream plus the handshake
    pub connect_timeout: Duration,
    /// Send `ping` and require `pong` before the connection is ready
    pub handshake: bool,
    /// Largest reply accepted before the stream is considered corrupt
    pub max_frame_bytes: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            handshake: true,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

/// An open channel to the editor
pub struct Connection<S> {
    stream: Option<S>,
    state: ConnectionState,
    buffer: Vec<u8>,
    scanner: codec::FrameScanner,
    max_frame_bytes: usize,
    // Set while an exchange is running; still set afterwards means it was abandoned
    in_flight: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Open a stream and complete the handshake within `connect_timeout`
    pub async fn open<C>(connector: &C, options: &ConnectionOptions) -> Result<Self>
    where
        C: Connector<Stream = S>,
    {
        let endpoint = connector.endpoint();
        tracing::debug!(%endpoint, "opening editor connection");

        let establish = async {
            let stream = connector
                .connect()
                .await
                .map_err(|e| Error::connect(&endpoint, e))?;

            let mut connection = Self {
                stream: Some(stream),
                state: ConnectionState::Connecting,
                buffer: Vec::new(),
                scanner: codec::FrameScanner::new(),
                max_frame_bytes: options.max_frame_bytes,
                in_flight: false,
            };

            if options.handshake {
                connection.handshake().await.map_err(|e| {
                    Error::connect(&endpoint, format!("handshake failed: {e}"))
                })?;
            }

            connection.state = ConnectionState::Ready;
            Ok::<_, Error>(connection)
        };

        let outcome = tokio::time::timeout(options.connect_timeout, establish).await;
        match outcome {
            Ok(result) => {
                if result.is_ok() {
                    tracing::info!(%endpoint, "connected to editor");
                }
                result
            }
            Err(_) => Err(Error::connect(
                endpoint,
                format!(
                    "no answer within {}ms",
                    options.connect_timeout.as_millis()
                ),
            )),
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        let reply = self.exchange(codec::PING_FRAME).await?;
        let response = codec::decode(&reply)?;
        if codec::is_pong(&response) {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedShape("expected pong".to_string()).into())
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.in_flight {
            ConnectionState::Faulted
        } else {
            self.state
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Bytes the editor sent beyond the last reply.
    ///
    /// They cannot be matched to any request, so the channel is no longer
    /// usable even though nothing has failed yet.
    pub fn has_unsolicited_data(&self) -> bool {
        self.buffer.iter().any(|b| !b.is_ascii_whitespace())
    }

    /// Ready with nothing unexpected waiting in the buffer
    pub fn is_reusable(&self) -> bool {
        self.is_ready() && !self.has_unsolicited_data()
    }

    /// Mark the connection unusable
    pub fn fault(&mut self) {
        self.state = ConnectionState::Faulted;
    }

    /// Write one frame and read exactly one reply frame.
    ///
    /// Any failure, including the timeout, faults the connection.
    pub async fn request(&mut self, frame: &[u8], timeout: Duration) -> Result<Vec<u8>> {
        let state = self.state();
        if state != ConnectionState::Ready {
            return Err(Error::NotReady(state));
        }

        let outcome = tokio::time::timeout(timeout, self.exchange(frame)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                self.in_flight = false;
                Err(Error::Timeout {
                    operation: "request",
                    after: timeout,
                })
            }
        };

        if result.is_err() {
            self.fault();
        }
        result
    }

    async fn exchange(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        // Nothing has been written yet, so this is safe to retry elsewhere
        if self.has_unsolicited_data() {
            return Err(Error::NotReady(ConnectionState::Faulted));
        }
        self.buffer.clear();
        self.scanner.reset();

        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotReady(ConnectionState::Disconnected));
        };

        self.in_flight = true;
        stream.write_all(frame).await?;
        stream.flush().await?;

        let reply = loop {
            if let Some(len) = self.scanner.frame_len(&self.buffer)? {
                let reply: Vec<u8> = self.buffer.drain(..len).collect();
                self.scanner.reset();
                break reply;
            }

            self.buffer.reserve(READ_CHUNK);
            let read = stream.read_buf(&mut self.buffer).await?;
            if read == 0 {
                let detail = if self.buffer.is_empty() {
                    "editor closed the connection"
                } else {
                    "editor closed the connection mid-reply"
                };
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, detail).into());
            }

            if self.buffer.len() > self.max_frame_bytes {
                return Err(ProtocolError::FrameTooLarge {
                    limit: self.max_frame_bytes,
                }
                .into());
            }
        };

        self.in_flight = false;
        tracing::trace!(bytes = reply.len(), "received reply frame");
        Ok(reply)
    }

    /// Release the stream. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!("error while closing editor connection: {}", e);
            }
        }
        self.buffer.clear();
        self.scanner.reset();
        self.in_flight = false;
        self.state = ConnectionState::Disconnected;
    }
}
