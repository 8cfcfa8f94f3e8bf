//! Live feed module
//!
//! Streams Binance trades for a selection of symbols and reports each
//! trade's price with its change against the 24h reference price.

pub mod binance;
mod controller;
mod session;
mod types;

pub use controller::FeedController;
pub use session::FeedHandle;
pub use types::{
    PriceQuote, ReferenceBaseline, SelectionSet, SessionId, SessionState, Symbol, SymbolError,
};

use crate::baseline::{BaselineSource, BinanceRestClient};
use crate::config::FeedConfig;
use session::{spawn_session, QuoteCallback, UpdateSink};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// A session needs at least one symbol
    #[error("Selection is empty")]
    EmptySelection,
    /// No session is running
    #[error("No active feed session")]
    NoSession,
    /// Client construction failed
    #[error("Feed setup failed: {0}")]
    Setup(String),
    /// Connection failed or closed
    #[error("Transport error: {0}")]
    Transport(String),
    /// The exchange refused the subscribe request
    #[error("Subscribe rejected ({code}): {msg}")]
    SubscribeRejected { code: i64, msg: String },
    /// Outbound request could not be encoded
    #[error("Serialization failed: {0}")]
    Serialize(String),
}

/// Starts feed sessions against one exchange endpoint
pub struct FeedClient {
    config: FeedConfig,
    source: Arc<dyn BaselineSource>,
}

impl FeedClient {
    /// Create a client that fetches reference prices from the configured REST endpoint
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let source = BinanceRestClient::new(config.rest_url.as_str(), config.request_timeout())
            .map_err(|e| FeedError::Setup(e.to_string()))?;
        Ok(Self::with_source(config, Arc::new(source)))
    }

    /// Create a client with a custom reference price source
    pub fn with_source(config: FeedConfig, source: Arc<dyn BaselineSource>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Start a session that invokes `on_update` for every qualifying trade
    ///
    /// The callback runs on the session task and may be called at trade
    /// frequency; pacing is the caller's concern.
    pub fn start<F>(&self, selection: SelectionSet, on_update: F) -> Result<FeedHandle, FeedError>
    where
        F: Fn(PriceQuote) + Send + Sync + 'static,
    {
        self.start_shared(selection, Arc::new(on_update))
    }

    /// Start a session that delivers quotes over a channel
    ///
    /// Dropping the receiver ends the session.
    pub fn subscribe(
        &self,
        selection: SelectionSet,
    ) -> Result<(FeedHandle, mpsc::Receiver<PriceQuote>), FeedError> {
        let (tx, rx) = mpsc::channel(self.config.buffer_size.max(1));
        let handle = spawn_session(
            selection,
            self.config.clone(),
            self.source.clone(),
            UpdateSink::Channel(tx),
        )?;
        Ok((handle, rx))
    }

    pub(crate) fn start_shared(
        &self,
        selection: SelectionSet,
        callback: QuoteCallback,
    ) -> Result<FeedHandle, FeedError> {
        spawn_session(
            selection,
            self.config.clone(),
            self.source.clone(),
            UpdateSink::Callback(callback),
        )
    }
}
