//! Configuration types and loading.
//!
//! Config is read from an optional TOML file; the binary layers CLI flags and
//! environment variables (`WA_BRIDGE_*`, `.env`) on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level bridge config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub version: VersionConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Render pairing QR codes in the terminal.
    #[serde(default = "default_true")]
    pub print_qr: bool,
}

/// HTTP bind address and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where session credentials live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_dir")]
    pub dir: PathBuf,
}

/// Protocol version lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionConfig {
    #[serde(default = "default_version_url")]
    pub url: String,

    /// When false, the bundled version is used without a lookup.
    #[serde(default = "default_true")]
    pub fetch: bool,
}

/// Endpoint the WebSocket transport dials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_transport_url")]
    pub url: String,
}

/// Backoff between reconnect attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Consecutive failed attempts before giving up. Unlimited when absent.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

/// Inbound message mirror.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_mirror_capacity")]
    pub capacity: usize,

    /// Keep only the first envelope of each upsert batch.
    #[serde(default = "default_true")]
    pub first_only: bool,

    /// Messages kept per chat in the store dump.
    #[serde(default = "default_messages_per_chat")]
    pub messages_per_chat: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_auth_dir() -> PathBuf {
    PathBuf::from("auth")
}

fn default_version_url() -> String {
    crate::version::DEFAULT_VERSION_URL.to_string()
}

fn default_transport_url() -> String {
    crate::client::DEFAULT_WS_URL.to_string()
}

fn default_initial_delay_ms() -> u64 {
    2_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_factor() -> f64 {
    2.0
}

fn default_mirror_capacity() -> usize {
    crate::mirror::DEFAULT_CAPACITY
}

fn default_messages_per_chat() -> usize {
    crate::store::DEFAULT_MESSAGES_PER_CHAT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            version: VersionConfig::default(),
            transport: TransportConfig::default(),
            reconnect: ReconnectConfig::default(),
            mirror: MirrorConfig::default(),
            log: LogConfig::default(),
            print_qr: true,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            dir: default_auth_dir(),
        }
    }
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            url: default_version_url(),
            fetch: true,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_transport_url(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            factor: default_factor(),
            max_attempts: None,
        }
    }
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.max(self.initial_delay_ms))
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            capacity: default_mirror_capacity(),
            first_only: true,
            messages_per_chat: default_messages_per_chat(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Socket address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

/// Load config from `path` (TOML). Without a path, or when the file is absent, defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parsing config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = Config::default();
        assert_eq!(c.server.port, 3000);
        assert_eq!(c.bind_addr(), "0.0.0.0:3000");
        assert_eq!(c.auth.dir, PathBuf::from("auth"));
        assert_eq!(c.reconnect.initial_delay(), Duration::from_secs(2));
        assert_eq!(c.reconnect.max_delay(), Duration::from_secs(30));
        assert_eq!(c.reconnect.max_attempts, None);
        assert!(c.mirror.first_only);
        assert!(c.print_qr);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let c: Config = toml::from_str(
            r#"
            print_qr = false

            [server]
            port = 8080

            [reconnect]
            max_attempts = 5

            [mirror]
            capacity = 50
            first_only = false
            "#,
        )
        .unwrap();
        assert_eq!(c.server.port, 8080);
        assert_eq!(c.server.bind, "0.0.0.0");
        assert_eq!(c.reconnect.max_attempts, Some(5));
        assert_eq!(c.reconnect.factor, 2.0);
        assert_eq!(c.mirror.capacity, 50);
        assert!(!c.mirror.first_only);
        assert!(!c.print_qr);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("wa-bridge-{}.toml", uuid::Uuid::new_v4()));
        let c = load_config(Some(&path)).unwrap();
        assert_eq!(c.server.port, 3000);
    }

    #[test]
    fn invalid_file_reports_path() {
        let path = std::env::temp_dir().join(format!("wa-bridge-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "server = 3").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing config"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn max_delay_never_below_initial() {
        let r = ReconnectConfig {
            initial_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        assert_eq!(r.max_delay(), Duration::from_secs(5));
    }
}
