//! WebSocket client library
//!
//! One bidirectional connection per call with ping/pong keepalive.
//! Reconnection policy belongs to the caller.

mod client;
mod types;

pub use client::WsClient;
pub use types::{WsConfig, WsError, WsMessage, MIN_PING_INTERVAL};
