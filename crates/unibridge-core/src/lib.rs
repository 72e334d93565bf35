//! unibridge core - command dispatch to a running Unity editor
//!
//! The editor hosts a bridge that executes named commands (`manage_scene`,
//! `take_screenshot`, ...) received over a TCP socket. This crate is the client
//! side of that socket:
//!
//! - [`codec`] - request/reply framing and the reply envelope
//! - [`Connection`] - one channel, one exchange at a time, faulted on any failure
//! - [`Dispatcher`] - shared handle that serializes callers onto the connection,
//!   reconnects lazily, and retries connect/transport failures
//!
//! ## Example
//!
//! ```no_run
//! use unibridge_core::{BridgeConfig, Dispatcher, Params, TcpConnector};
//!
//! # async fn run() {
//! let config = BridgeConfig::default();
//! let connector = TcpConnector::new(config.host.clone(), config.port);
//! let dispatcher = Dispatcher::spawn(connector, config);
//!
//! let response = dispatcher
//!     .send_command("manage_scene", Params::new().with("action", "get_active"))
//!     .await;
//! if !response.success {
//!     eprintln!("{}", response.error.unwrap_or_default());
//! }
//! # }
//! ```

pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use command::{Command, Params, Response};
pub use config::{Backoff, BridgeConfig};
pub use connection::{Connection, ConnectionOptions, ConnectionState, Connector, TcpConnector};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, Error, ErrorKind, ProtocolError, Result};

// Re-export for adapters building parameter values
pub use serde_json::{Value, json};
