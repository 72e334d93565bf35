//! unibridge CLI - talk to a running Unity editor from the terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use unibridge_core::{BridgeConfig, Dispatcher, Params, TcpConnector, Value};

#[derive(Parser)]
#[command(name = "unibridge")]
#[command(about = "Send commands to the Unity editor bridge", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    bridge: BridgeArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BridgeArgs {
    /// Config file (defaults to the user config dir's unibridge/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Editor bridge host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Editor bridge port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the editor bridge answers
    Ping,

    /// Send one command and print the response as JSON
    Send {
        /// Command name, e.g. manage_scene
        command: String,

        /// Parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.bridge.load()?;

    match cli.command {
        Commands::Ping => run_ping(config).await,
        Commands::Send { command, params } => run_send(config, &command, &params).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

impl BridgeArgs {
    fn load(&self) -> Result<BridgeConfig> {
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
        if let Some(ms) = self.timeout_ms {
            config.request_timeout_ms = ms;
        }
        config.validate().context("invalid bridge configuration")?;
        Ok(config)
    }
}

fn connect(config: BridgeConfig) -> Dispatcher {
    tracing::debug!(
        host = %config.host,
        port = config.port,
        request_timeout_ms = config.request_timeout_ms,
        "using editor bridge"
    );
    let connector = TcpConnector::new(config.host.clone(), config.port);
    Dispatcher::spawn(connector, config)
}

async fn run_ping(config: BridgeConfig) -> Result<ExitCode> {
    let endpoint = format!("{}:{}", config.host, config.port);
    let dispatcher = connect(config);

    match dispatcher.ping().await {
        Ok(elapsed) => {
            println!("pong from {endpoint} in {} ms", elapsed.as_millis());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{endpoint}: {}: {e}", e.kind().label());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_send(config: BridgeConfig, command: &str, params: &str) -> Result<ExitCode> {
    let params = parse_params(params)?;
    let dispatcher = connect(config);

    let response = dispatcher.send_command(command, params).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn parse_params(raw: &str) -> Result<Params> {
    let value: Value = serde_json::from_str(raw).context("--params is not valid JSON")?;
    match Params::try_from(value) {
        Ok(params) => Ok(params),
        Err(other) => bail!("--params must be a JSON object, got {other}"),
    }
}
