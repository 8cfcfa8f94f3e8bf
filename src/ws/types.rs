//! WebSocket types and configuration

use std::time::Duration;
use thiserror::Error;

/// Shortest ping interval the client will use
pub const MIN_PING_INTERVAL: Duration = Duration::from_secs(1);

/// WebSocket client configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL to connect to
    pub url: String,
    /// Interval for sending ping frames, never below [`MIN_PING_INTERVAL`]
    pub ping_interval: Duration,
    /// Deadline for the TCP connect and WebSocket handshake
    pub connect_timeout: Duration,
    /// Buffer size of the inbound message channel
    pub buffer_size: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ping_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            buffer_size: 1024,
        }
    }
}

impl WsConfig {
    /// Create a new config with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d.max(MIN_PING_INTERVAL);
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Set inbound buffer size
    pub fn buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n.max(1);
        self
    }
}

/// WebSocket message types
#[derive(Debug, Clone)]
pub enum WsMessage {
    /// Text message
    Text(String),
    /// Binary message
    Binary(Vec<u8>),
    /// Connection established
    Connected,
    /// Connection closed; `error` is set when it ended abnormally
    Disconnected { error: Option<String> },
}

/// WebSocket errors
#[derive(Debug, Clone, Error)]
pub enum WsError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Handshake did not finish within the connect timeout
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// No pong before the next ping was due
    #[error("Pong timeout")]
    PongTimeout,
}
