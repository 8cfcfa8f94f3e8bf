//! crytrack: live cryptocurrency price tracking over the Binance trade stream
//!
//! This library provides the core components for:
//! - Symbol selection and reference (24h) price bootstrap via REST
//! - Trade subscriptions over a single WebSocket connection
//! - Session lifecycle with fixed-delay reconnects
//! - Per-symbol quote board with throttled updates
//! - Structured logging and Prometheus metrics

pub mod baseline;
pub mod board;
pub mod cli;
pub mod config;
pub mod feed;
pub mod telemetry;
pub mod ws;
