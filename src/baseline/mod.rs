//! Reference price module
//!
//! Fetches the price as of 24 hours ago per symbol, the baseline for the
//! change percentage.

mod rest;

pub use rest::{BaselineError, BinanceRestClient};

use crate::feed::{ReferenceBaseline, SelectionSet, Symbol};
use crate::telemetry::{self, GaugeMetric, LatencyMetric};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::time::Instant;

/// Trait for reference price sources
///
/// Implementations never fail past this boundary: any error becomes `None`.
#[async_trait]
pub trait BaselineSource: Send + Sync {
    /// Opening price 24 hours ago, or `None` if unavailable
    async fn open_price(&self, symbol: &Symbol) -> Option<Decimal>;
}

/// Resolve reference prices for every selected symbol
///
/// At most `concurrency` requests are in flight. Symbols whose lookup
/// fails are left out of the returned map.
pub async fn fetch_baselines(
    source: &dyn BaselineSource,
    selection: &SelectionSet,
    concurrency: usize,
) -> ReferenceBaseline {
    let started = Instant::now();

    let baseline: ReferenceBaseline = stream::iter(selection.iter().cloned())
        .map(|symbol| async move { source.open_price(&symbol).await.map(|p| (symbol, p)) })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|entry| async move { entry })
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .collect();

    telemetry::record_latency(LatencyMetric::Bootstrap, started.elapsed());
    telemetry::set_gauge(GaugeMetric::BaselinesLoaded, baseline.len() as f64);

    tracing::info!(
        requested = selection.len(),
        loaded = baseline.len(),
        "Reference prices loaded"
    );

    baseline
}
