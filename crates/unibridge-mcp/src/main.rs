//! unibridge MCP server binary
//!
//! Serves the Unity editor tools on stdio. The editor must be running with its
//! bridge listening (localhost:6400 unless configured otherwise); the first
//! tool call connects.
//!
//! ## Usage
//!
//! ```bash
//! unibridge-mcp --port 6400
//! ```
//!
//! Or in an MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "unity": {
//!       "command": "unibridge-mcp"
//!     }
//!   }
//! }
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::ServiceExt;
use rmcp::transport::io::stdio;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use unibridge_core::{BridgeConfig, Dispatcher, TcpConnector};
use unibridge_mcp::UnityMcpService;

#[derive(Parser)]
#[command(name = "unibridge-mcp")]
#[command(about = "MCP server exposing a running Unity editor as tools", long_about = None)]
#[command(version)]
struct Args {
    /// Config file (defaults to the user config dir's unibridge/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Editor bridge host
    #[arg(long)]
    host: Option<String>,

    /// Editor bridge port
    #[arg(long)]
    port: Option<u16>,

    /// Connect and handshake timeout in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Retries after a connection or transport failure
    #[arg(long)]
    max_retries: Option<u32>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

impl Args {
    fn bridge_config(&self) -> Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load_from(path)?,
            None => BridgeConfig::load()?,
        };
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.connect_timeout_ms = ms;
        }
        if let Some(ms) = self.request_timeout_ms {
            config.request_timeout_ms = ms;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Log to stderr only; stdout carries MCP JSON-RPC
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .init();

    let config = args.bridge_config().context("invalid bridge configuration")?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %format!("{}:{}", config.host, config.port),
        "starting unibridge MCP server"
    );

    let connector = TcpConnector::new(config.host.clone(), config.port);
    let dispatcher = Dispatcher::spawn(connector, config);

    let service = UnityMcpService::new(dispatcher.clone());
    let server = service.serve(stdio()).await?;

    // Wait for client to disconnect or error
    server.waiting().await?;

    if let Err(e) = dispatcher.disconnect().await {
        tracing::debug!(error = %e, "disconnect on shutdown failed");
    }
    tracing::info!("client disconnected, shutting down");
    Ok(())
}
