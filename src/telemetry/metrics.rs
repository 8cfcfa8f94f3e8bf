//! Prometheus metrics

use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Trade frames parsed from the stream
    TradesReceived,
    /// Quotes handed to the consumer
    QuotesDelivered,
    /// Inbound frames dropped as malformed
    MalformedFrames,
    /// Session restarts after a closed connection
    Reconnects,
    /// Reference price lookups that came back unavailable
    BaselineFailures,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Symbols in the current selection
    ActiveSymbols,
    /// Symbols with a reference price in the current session attempt
    BaselinesLoaded,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Reference price request round trip
    BaselineFetch,
    /// Full bootstrap of one session attempt
    Bootstrap,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::TradesReceived => "crytrack_trades_received_total",
            CounterMetric::QuotesDelivered => "crytrack_quotes_delivered_total",
            CounterMetric::MalformedFrames => "crytrack_malformed_frames_total",
            CounterMetric::Reconnects => "crytrack_reconnects_total",
            CounterMetric::BaselineFailures => "crytrack_baseline_failures_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::ActiveSymbols => "crytrack_active_symbols",
            GaugeMetric::BaselinesLoaded => "crytrack_baselines_loaded",
        }
    }
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::BaselineFetch => "crytrack_baseline_fetch_latency_ms",
            LatencyMetric::Bootstrap => "crytrack_bootstrap_latency_ms",
        }
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let value_ms = duration.as_secs_f64() * 1000.0;
    tracing::trace!(metric = metric.name(), value_ms, "Recording latency");
    metrics::histogram!(metric.name()).record(value_ms);
}
