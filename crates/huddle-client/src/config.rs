//! Client configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file (first of `huddle.toml`,
//!   `/etc/huddle/huddle.toml`, `~/.config/huddle/huddle.toml`)
//! - Environment variables (`HUDDLE__SECTION__KEY`)
//! - Command line flags, applied by the binary on top

use anyhow::{Context, Result};
use huddle_core::{Identity, Placement, TimeLabels, ADMIN_CHARACTER_ID, ADMIN_NICKNAME};
use huddle_protocol::HeartBeat;
use huddle_transport::{FallbackTransport, Transport, WebSocketConfig, WebSocketTransport};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::session::SessionConfig;

const CONFIG_PATHS: [&str; 3] = [
    "huddle.toml",
    "/etc/huddle/huddle.toml",
    "~/.config/huddle/huddle.toml",
];

/// Client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat bus connection.
    #[serde(default)]
    pub bus: BusConfig,

    /// Who the client speaks as.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Transcript rendering.
    #[serde(default)]
    pub display: DisplayConfig,

    /// REST collaborators.
    #[serde(default)]
    pub api: ApiConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// WebSocket endpoints, tried in order.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// `host` header for `CONNECT`.
    #[serde(default = "default_host")]
    pub host: String,

    /// Handshake timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Heart-beat interval offered to the broker, in milliseconds. 0 disables.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_ms: u32,

    /// Maximum inbound WebSocket message size in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

/// Identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_nickname")]
    pub nickname: String,

    #[serde(default = "default_character_id")]
    pub character_id: i64,

    /// Where the avatar appears when joining.
    #[serde(default)]
    pub placement: Placement,
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_am_marker")]
    pub am_marker: String,

    #[serde(default = "default_pm_marker")]
    pub pm_marker: String,

    /// Fixed UTC offset for time labels. Local zone when unset.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

/// REST API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_endpoints() -> Vec<String> {
    vec!["ws://127.0.0.1:5000/ws/websocket".to_string()]
}

fn default_host() -> String {
    "/".to_string()
}

fn default_connect_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_heartbeat() -> u32 {
    10_000
}

fn default_max_frame_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_nickname() -> String {
    ADMIN_NICKNAME.to_string()
}

fn default_character_id() -> i64 {
    ADMIN_CHARACTER_ID
}

fn default_am_marker() -> String {
    "오전".to_string()
}

fn default_pm_marker() -> String {
    "오후".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_api_timeout() -> u64 {
    5_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            host: default_host(),
            connect_timeout_ms: default_connect_timeout(),
            heartbeat_ms: default_heartbeat(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nickname: default_nickname(),
            character_id: default_character_id(),
            placement: Placement::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            am_marker: default_am_marker(),
            pm_marker: default_pm_marker(),
            utc_offset_minutes: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the first default path that exists, layered
    /// with `HUDDLE__*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or an
    /// override has the wrong type.
    pub fn load() -> Result<Self> {
        let path = CONFIG_PATHS
            .iter()
            .map(|path| PathBuf::from(shellexpand::tilde(path).as_ref()))
            .find(|path| path.exists());

        Self::layered(path.as_deref())
    }

    /// Load `path` (if any) layered with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or an override has the
    /// wrong type.
    pub fn layered(path: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "Loading config file");
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("HUDDLE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("bus.endpoints"),
            )
            .build()
            .context("Failed to assemble configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Load configuration from a specific file, without overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Session settings derived from `[bus]`.
    #[must_use]
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            host: self.bus.host.clone(),
            connect_timeout: Duration::from_millis(self.bus.connect_timeout_ms),
            heart_beat: HeartBeat::new(self.bus.heartbeat_ms, self.bus.heartbeat_ms),
        }
    }

    /// Bus transport for the configured endpoints.
    ///
    /// A single endpoint is dialled directly; several are tried in order.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        let mut endpoints: Vec<Arc<dyn Transport>> = self
            .bus
            .endpoints
            .iter()
            .map(|url| {
                Arc::new(WebSocketTransport::new(WebSocketConfig {
                    url: url.clone(),
                    max_message_size: self.bus.max_frame_size,
                    connect_timeout: Duration::from_millis(self.bus.connect_timeout_ms),
                })) as Arc<dyn Transport>
            })
            .collect();

        if endpoints.len() == 1 {
            endpoints.remove(0)
        } else {
            Arc::new(FallbackTransport::new(endpoints))
        }
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.identity.nickname.clone(), self.identity.character_id)
    }

    #[must_use]
    pub fn time_labels(&self) -> TimeLabels {
        let labels = TimeLabels::new(
            self.display.am_marker.clone(),
            self.display.pm_marker.clone(),
        );
        match self.display.utc_offset_minutes {
            Some(minutes) => labels.with_utc_offset_minutes(minutes),
            None => labels,
        }
    }

    /// API request timeout.
    #[must_use]
    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }
}
