//! Configuration for MSRP endpoints.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MSRP_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/msrp/config.toml
//!   3. ~/.config/msrp/config.toml

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MsrpConfig {
    pub endpoint: EndpointConfig,
    pub media: MediaConfig,
    pub transfer: TransferConfig,
    pub timers: TimerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Hostname used in the local endpoint URI.
    pub authority: String,
    /// MSRP URI of the relay to authenticate against. Empty = direct
    /// peer-to-peer session, no AUTH exchange.
    pub relay_uri: String,
    /// Username for relay digest authentication.
    pub username: String,
    /// Password for relay digest authentication. Empty = no credentials.
    pub password: String,
    /// Requested relay binding lifetime in seconds. 0 = relay default.
    pub auth_expires: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// MIME types accepted from the peer. `*` accepts everything.
    pub accept_types: Vec<String>,
    /// Types accepted inside message/cpim wrappers. Empty = no wrapping.
    pub accept_wrapped_types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Payload bytes per SEND chunk.
    pub chunk_size: usize,
    /// Max unacknowledged chunks in flight per message.
    pub max_outstanding_sends: usize,
    /// Reassembly staging buffer size in bytes. Incoming data is flushed
    /// to the application once this fills.
    pub recv_buffer_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// How long to wait for the final success REPORT before failing a
    /// sent message, in milliseconds.
    pub report_timeout_ms: u64,
    /// Max gap between incoming chunks of one message, in milliseconds.
    pub chunk_timeout_ms: u64,
    /// How long to wait for a transaction response, in milliseconds.
    pub request_timeout_ms: u64,
    /// Interval of the receiver liveness sweep, in milliseconds.
    pub sweep_interval_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for MsrpConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            media: MediaConfig::default(),
            transfer: TransferConfig::default(),
            timers: TimerConfig::default(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            authority: "anonymous.invalid".to_string(),
            relay_uri: String::new(),
            username: "anonymous".to_string(),
            password: String::new(),
            auth_expires: 0,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            accept_types: vec!["*".to_string()],
            accept_wrapped_types: Vec::new(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2048,
            // 32 KiB of data in flight at the default chunk size.
            max_outstanding_sends: 32 * 1024 / 2048,
            recv_buffer_bytes: 1024 * 1024,
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            report_timeout_ms: 120_000,
            chunk_timeout_ms: 30_000,
            request_timeout_ms: 30_000,
            sweep_interval_ms: 1_000,
        }
    }
}

impl TimerConfig {
    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl MediaConfig {
    /// Whether `content_type` is acceptable under `accept_types`.
    /// Matches exact types, `type/*` wildcards and the global `*`.
    pub fn accepts(&self, content_type: &str) -> bool {
        let content_type = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim();
        self.accept_types.iter().any(|accepted| {
            if accepted == "*" {
                return true;
            }
            if let Some(prefix) = accepted.strip_suffix("/*") {
                return content_type
                    .split('/')
                    .next()
                    .is_some_and(|main| main == prefix);
            }
            accepted.eq_ignore_ascii_case(content_type)
        })
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("msrp")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MsrpConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MsrpConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MSRP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply MSRP_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MSRP_ENDPOINT__AUTHORITY") {
            self.endpoint.authority = v;
        }
        if let Ok(v) = std::env::var("MSRP_ENDPOINT__RELAY_URI") {
            self.endpoint.relay_uri = v;
        }
        if let Ok(v) = std::env::var("MSRP_ENDPOINT__USERNAME") {
            self.endpoint.username = v;
        }
        if let Ok(v) = std::env::var("MSRP_ENDPOINT__PASSWORD") {
            self.endpoint.password = v;
        }
        if let Ok(v) = std::env::var("MSRP_TRANSFER__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.transfer.chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("MSRP_TRANSFER__MAX_OUTSTANDING_SENDS") {
            if let Ok(n) = v.parse() {
                self.transfer.max_outstanding_sends = n;
            }
        }
        if let Ok(v) = std::env::var("MSRP_TIMERS__REPORT_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.timers.report_timeout_ms = n;
            }
        }
        if let Ok(v) = std::env::var("MSRP_TIMERS__CHUNK_TIMEOUT_MS") {
            if let Ok(n) = v.parse() {
                self.timers.chunk_timeout_ms = n;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfer.chunk_size == 0 {
            return Err(ConfigError::Invalid("transfer.chunk_size must be nonzero"));
        }
        if self.transfer.max_outstanding_sends == 0 {
            return Err(ConfigError::Invalid(
                "transfer.max_outstanding_sends must be nonzero",
            ));
        }
        if self.media.accept_types.is_empty() {
            return Err(ConfigError::Invalid("media.accept_types must not be empty"));
        }
        Ok(())
    }
}
