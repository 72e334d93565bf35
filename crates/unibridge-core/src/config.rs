//! Bridge configuration
//!
//! Values are layered: built-in defaults, then `{config_dir}/unibridge/config.json`
//! (or an explicit file), then `UNIBRIDGE_*` environment variables. Binaries
//! apply their command-line flags on top.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionOptions;
use crate::error::ConfigError;

/// Port the editor bridge listens on by default
pub const DEFAULT_PORT: u16 = 6400;

/// Delay schedule between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backoff {
    /// The same delay before every retry
    Fixed { delay_ms: u64 },
    /// `base_ms`, doubling per retry, capped at `max_ms`
    Exponential { base_ms: u64, max_ms: u64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base_ms: 250,
            max_ms: 2_000,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (1-based)
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Self::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Self::Exponential { base_ms, max_ms } => {
                let factor = 1u64 << retry.saturating_sub(1).min(32);
                Duration::from_millis(base_ms.saturating_mul(factor).min(max_ms))
            }
        }
    }
}

/// Everything the dispatcher needs to reach the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Host the editor bridge listens on
    pub host: String,
    /// TCP port of the editor bridge
    pub port: u16,
    /// Bound on connecting plus the handshake
    pub connect_timeout_ms: u64,
    /// Bound on waiting for one reply
    pub request_timeout_ms: u64,
    /// Bound on waiting for a turn on the shared connection
    pub queue_timeout_ms: u64,
    /// Additional attempts after a connect or transport failure
    pub max_retries: u32,
    /// Delay schedule between attempts
    pub backoff: Backoff,
    /// Require a ping/pong exchange before a connection is used
    pub handshake: bool,
    /// Largest reply accepted
    pub max_frame_bytes: usize,
    /// Commands that may wait for the connection at once
    pub queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            queue_timeout_ms: 60_000,
            max_retries: 2,
            backoff: Backoff::default(),
            handshake: true,
            max_frame_bytes: 16 * 1024 * 1024,
            queue_capacity: 64,
        }
    }
}

impl BridgeConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("unibridge").join("config.json"))
    }

    /// Defaults, overlaid with the default config file (if any) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`BridgeConfig::load`] but with an explicit file, which must exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Override fields from `UNIBRIDGE_*` variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("UNIBRIDGE_HOST") {
            self.host = host;
        }
        if let Some(port) = parse_env(&lookup, "UNIBRIDGE_PORT")? {
            self.port = port;
        }
        if let Some(ms) = parse_env(&lookup, "UNIBRIDGE_CONNECT_TIMEOUT_MS")? {
            self.connect_timeout_ms = ms;
        }
        if let Some(ms) = parse_env(&lookup, "UNIBRIDGE_REQUEST_TIMEOUT_MS")? {
            self.request_timeout_ms = ms;
        }
        if let Some(ms) = parse_env(&lookup, "UNIBRIDGE_QUEUE_TIMEOUT_MS")? {
            self.queue_timeout_ms = ms;
        }
        if let Some(retries) = parse_env(&lookup, "UNIBRIDGE_MAX_RETRIES")? {
            self.max_retries = retries;
        }
        if let Some(handshake) = parse_env(&lookup, "UNIBRIDGE_HANDSHAKE")? {
            self.handshake = handshake;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must not be 0".to_string()));
        }
        if self.connect_timeout_ms == 0 || self.request_timeout_ms == 0 || self.queue_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than 0".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".to_string()));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::Invalid("max_frame_bytes must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            connect_timeout: self.connect_timeout(),
            handshake: self.handshake,
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

fn parse_env<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = BridgeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 6400);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff() {
        let fixed = Backoff::Fixed { delay_ms: 100 };
        assert_eq!(fixed.delay(1), Duration::from_millis(100));
        assert_eq!(fixed.delay(5), Duration::from_millis(100));

        let exp = Backoff::Exponential {
            base_ms: 100,
            max_ms: 350,
        };
        assert_eq!(exp.delay(1), Duration::from_millis(100));
        assert_eq!(exp.delay(2), Duration::from_millis(200));
        assert_eq!(exp.delay(3), Duration::from_millis(350));
        assert_eq!(exp.delay(60), Duration::from_millis(350));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BridgeConfig::default();
        config
            .apply_env(env(&[
                ("UNIBRIDGE_HOST", "10.0.0.5"),
                ("UNIBRIDGE_PORT", "7000"),
                ("UNIBRIDGE_MAX_RETRIES", " 0 "),
            ]))
            .unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.request_timeout_ms, 30_000);
    }

    #[test]
    fn test_env_queue_timeout_and_handshake() {
        let mut config = BridgeConfig::default();
        config
            .apply_env(env(&[
                ("UNIBRIDGE_QUEUE_TIMEOUT_MS", "1500"),
                ("UNIBRIDGE_HANDSHAKE", "false"),
            ]))
            .unwrap();
        assert_eq!(config.queue_timeout(), Duration::from_millis(1500));
        assert!(!config.handshake);

        let err = config
            .apply_env(env(&[("UNIBRIDGE_HANDSHAKE", "sometimes")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "UNIBRIDGE_HANDSHAKE",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = BridgeConfig::default();
        let err = config
            .apply_env(env(&[("UNIBRIDGE_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "UNIBRIDGE_PORT",
                ..
            }
        ));
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"port": 6500, "backoff": {"kind": "fixed", "delay_ms": 10}}"#,
        )
        .unwrap();

        let config = BridgeConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 6500);
        assert_eq!(config.backoff, Backoff::Fixed { delay_ms: 10 });
        assert_eq!(config.host, "localhost");
        assert!(config.handshake);
    }

    #[test]
    fn test_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ port: ").unwrap();
        assert!(matches!(
            BridgeConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            BridgeConfig::from_file(&dir.path().join("missing.json")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_validation() {
        let config = BridgeConfig {
            request_timeout_ms: 0,
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());

        let config = BridgeConfig {
            queue_capacity: 0,
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
