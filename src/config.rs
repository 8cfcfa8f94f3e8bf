//! Configuration types for crytrack

use crate::board::SortKey;
use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::time::Duration;

/// Binance spot WebSocket endpoint
pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Binance spot REST endpoint
pub const BINANCE_REST_URL: &str = "https://api.binance.com/api/v3";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Live feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// WebSocket endpoint for the trade stream
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// REST endpoint used for reference prices
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Symbols tracked when none are given on the command line
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Fixed delay before a closed session is rebuilt (milliseconds)
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// How long the WebSocket handshake may take before the attempt is retried
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long to wait for a subscribe acknowledgment before streaming provisionally
    #[serde(default = "default_subscribe_ack_timeout_ms")]
    pub subscribe_ack_timeout_ms: u64,

    /// Maximum concurrent reference price requests
    #[serde(default = "default_baseline_concurrency")]
    pub baseline_concurrency: usize,

    /// Timeout for a single reference price request (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Interval between keepalive pings (seconds)
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Buffer size of the quote channel handed to consumers
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_ws_url() -> String {
    BINANCE_WS_URL.to_string()
}
fn default_rest_url() -> String {
    BINANCE_REST_URL.to_string()
}
fn default_symbols() -> Vec<String> {
    crate::board::DEFAULT_SELECTION
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_reconnect_delay_ms() -> u64 {
    5_000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_subscribe_ack_timeout_ms() -> u64 {
    10_000
}
fn default_baseline_concurrency() -> usize {
    8
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_ping_interval_secs() -> u64 {
    30
}
fn default_buffer_size() -> usize {
    1024
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            rest_url: default_rest_url(),
            symbols: default_symbols(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            subscribe_ack_timeout_ms: default_subscribe_ack_timeout_ms(),
            baseline_concurrency: default_baseline_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn subscribe_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_ack_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

/// Quote board configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BoardConfig {
    /// Minimum interval between board refreshes (milliseconds)
    #[serde(default = "default_throttle_interval_ms")]
    pub throttle_interval_ms: u64,

    /// Initial sort order
    #[serde(default)]
    pub sort_by: SortKey,
}

fn default_throttle_interval_ms() -> u64 {
    3_000
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: default_throttle_interval_ms(),
            sort_by: SortKey::default(),
        }
    }
}

impl BoardConfig {
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Serve Prometheus metrics on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
