//! Watch command implementation

use crate::board::{throttle, QuoteBoard, SortKey};
use crate::config::Config;
use crate::feed::{FeedClient, SessionState};
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Symbols to track (comma separated); defaults to the configured list
    #[arg(short, long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Sort order of the board
    #[arg(long, value_enum)]
    pub sort: Option<SortKey>,

    /// Board refresh interval in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Print quotes as JSON lines instead of a table
    #[arg(long)]
    pub json: bool,
}

impl WatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let selection = super::resolve_selection(&self.symbols, config)?;
        let sort = self.sort.unwrap_or(config.board.sort_by);
        let interval = self
            .interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.board.throttle_interval());

        let client = FeedClient::new(config.feed.clone())?;
        let (handle, quotes) = client.subscribe(selection.clone())?;
        let mut batches = throttle(quotes, interval);
        let mut board = QuoteBoard::new(&selection);
        let mut states = handle.state_watch();

        tracing::info!(session = %handle.id(), symbols = selection.len(), "Watching");

        loop {
            tokio::select! {
                batch = batches.recv() => {
                    let Some(batch) = batch else {
                        tracing::warn!("Quote stream ended");
                        break;
                    };
                    if self.json {
                        for quote in &batch {
                            println!("{}", serde_json::to_string(quote)?);
                        }
                    }
                    for quote in batch {
                        board.apply(quote);
                    }
                    if !self.json {
                        println!("{}", board.render(sort));
                    }
                }
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    if let SessionState::Reconnecting { attempt } = state {
                        tracing::warn!(attempt, "Feed reconnecting");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                    break;
                }
            }
        }

        handle.close().await;
        Ok(())
    }
}
