//! Keeps at most one live session per consumer

use super::session::QuoteCallback;
use super::{FeedClient, FeedError, FeedHandle, PriceQuote, SelectionSet, SessionId};
use std::sync::Arc;

/// Owns the current session for one consumer callback
///
/// Changing the selection tears the old session down completely before the
/// new one starts, so the callback never sees two sessions at once.
pub struct FeedController {
    client: FeedClient,
    on_update: QuoteCallback,
    current: Option<FeedHandle>,
}

impl FeedController {
    pub fn new<F>(client: FeedClient, on_update: F) -> Self
    where
        F: Fn(PriceQuote) + Send + Sync + 'static,
    {
        Self {
            client,
            on_update: Arc::new(on_update),
            current: None,
        }
    }

    /// The running session, if any
    pub fn current(&self) -> Option<&FeedHandle> {
        self.current.as_ref()
    }

    /// Selection of the running session, if any
    pub fn selection(&self) -> Option<&SelectionSet> {
        self.current.as_ref().map(FeedHandle::selection)
    }

    /// Replace the tracked selection
    ///
    /// The previous session is closed first. An empty selection leaves no
    /// session running and returns [`FeedError::EmptySelection`].
    pub async fn select(&mut self, selection: SelectionSet) -> Result<SessionId, FeedError> {
        self.close().await;

        let handle = self
            .client
            .start_shared(selection, self.on_update.clone())?;
        let id = handle.id();

        tracing::info!(
            session = %id,
            symbols = ?handle.selection().iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            "Selection applied"
        );

        self.current = Some(handle);
        Ok(id)
    }

    /// Rebuild the current session from scratch with the same selection
    pub async fn refresh(&mut self) -> Result<SessionId, FeedError> {
        let selection = self.selection().cloned().ok_or(FeedError::NoSession)?;
        self.select(selection).await
    }

    /// Close the running session, if any
    pub async fn close(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.close().await;
        }
    }
}
