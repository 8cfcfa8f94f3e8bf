//! Per-symbol quote coalescing

use crate::feed::{PriceQuote, Symbol};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Shortest flush interval
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Coalesce a quote stream into at most one batch per `interval`
///
/// Each batch holds the latest quote per symbol received since the last
/// flush, in symbol order; older quotes for the same symbol are discarded.
/// Remaining quotes are flushed when the input closes. A zero interval is
/// treated as [`MIN_INTERVAL`].
pub fn throttle(
    mut input: mpsc::Receiver<PriceQuote>,
    interval: Duration,
) -> mpsc::Receiver<Vec<PriceQuote>> {
    let (tx, rx) = mpsc::channel(16);
    let interval = interval.max(MIN_INTERVAL);

    tokio::spawn(async move {
        let mut pending: BTreeMap<Symbol, PriceQuote> = BTreeMap::new();
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                quote = input.recv() => {
                    match quote {
                        Some(quote) => {
                            pending.insert(quote.symbol.clone(), quote);
                        }
                        None => {
                            if !pending.is_empty() {
                                let _ = tx.send(pending.into_values().collect()).await;
                            }
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if pending.is_empty() {
                        continue;
                    }
                    let batch: Vec<PriceQuote> = std::mem::take(&mut pending).into_values().collect();
                    if tx.send(batch).await.is_err() {
                        tracing::debug!("Throttle output dropped, stopping");
                        break;
                    }
                }
            }
        }
    });

    rx
}
