//! Binance REST client for 24h reference prices

use super::BaselineSource;
use crate::feed::Symbol;
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Reference price lookup failures
///
/// These never escape the [`BaselineSource`] boundary; they are logged and
/// turned into "unavailable".
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Ticker API error: {status} - {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Malformed ticker response: {0}")]
    Malformed(String),
    #[error("Non-numeric openPrice: {0}")]
    InvalidPrice(String),
    #[error("Non-positive openPrice: {0}")]
    NonPositive(Decimal),
}

/// 24h ticker statistics, only the fields we use
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    open_price: String,
}

/// Client for the Binance `/ticker/24hr` endpoint
pub struct BinanceRestClient {
    base_url: String,
    client: Client,
}

impl BinanceRestClient {
    /// Create a client against `base_url` (e.g., "https://api.binance.com/api/v3")
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BaselineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BaselineError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the 24h opening price for one symbol
    pub async fn fetch_open_price(&self, symbol: &Symbol) -> Result<Decimal, BaselineError> {
        let url = format!("{}/ticker/24hr", self.base_url);

        tracing::debug!(url = %url, %symbol, "Fetching 24h ticker");

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BaselineError::Status { status, body });
        }

        let body = response.text().await?;
        parse_open_price(&body)
    }
}

#[async_trait]
impl BaselineSource for BinanceRestClient {
    async fn open_price(&self, symbol: &Symbol) -> Option<Decimal> {
        let started = Instant::now();
        let result = self.fetch_open_price(symbol).await;
        telemetry::record_latency(LatencyMetric::BaselineFetch, started.elapsed());

        match result {
            Ok(price) => Some(price),
            Err(e) => {
                telemetry::increment(CounterMetric::BaselineFailures);
                tracing::warn!(%symbol, error = %e, "Failed to fetch 24h opening price");
                None
            }
        }
    }
}

/// Extract a positive `openPrice` from a ticker response body
fn parse_open_price(body: &str) -> Result<Decimal, BaselineError> {
    let ticker: Ticker24h =
        serde_json::from_str(body).map_err(|e| BaselineError::Malformed(e.to_string()))?;

    let price = Decimal::from_str(ticker.open_price.trim())
        .map_err(|_| BaselineError::InvalidPrice(ticker.open_price.clone()))?;

    if price <= Decimal::ZERO {
        return Err(BaselineError::NonPositive(price));
    }

    Ok(price)
}
