//! Feed session: bootstrap, connect, subscribe, stream, retry
//!
//! One session serves one selection for its whole life. Every attempt
//! starts from scratch with a fresh reference price map; when the
//! connection ends for any reason the session waits a fixed delay and
//! starts over, until its handle closes it.

use super::binance::{self, InboundFrame, SubscribeRequest, TradeEvent};
use super::{FeedError, PriceQuote, ReferenceBaseline, SelectionSet, SessionId, SessionState, Symbol};
use crate::baseline::{fetch_baselines, BaselineSource};
use crate::config::FeedConfig;
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use crate::ws::{WsClient, WsConfig, WsMessage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

/// Consumer callback shared across sessions
pub(crate) type QuoteCallback = Arc<dyn Fn(PriceQuote) + Send + Sync>;

/// Where a session delivers its quotes
pub(crate) enum UpdateSink {
    Callback(QuoteCallback),
    Channel(mpsc::Sender<PriceQuote>),
}

impl UpdateSink {
    /// Deliver one quote; false once the consumer is gone
    async fn deliver(&self, quote: PriceQuote) -> bool {
        match self {
            UpdateSink::Callback(callback) => {
                callback(quote);
                true
            }
            UpdateSink::Channel(tx) => tx.send(quote).await.is_ok(),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            UpdateSink::Callback(_) => false,
            UpdateSink::Channel(tx) => tx.is_closed(),
        }
    }
}

/// How a single connection attempt finished
enum AttemptEnd {
    /// Connection ended; rebuild after the retry delay
    Restart(FeedError),
    /// Nobody is listening any more
    ConsumerGone,
}

/// State owned by the session task
pub(crate) struct Session {
    id: SessionId,
    selection: SelectionSet,
    config: FeedConfig,
    source: Arc<dyn BaselineSource>,
    sink: UpdateSink,
    state_tx: watch::Sender<SessionState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Caller's handle to a running session
///
/// Dropping the handle stops the session as well; `close` additionally
/// waits until the session task has finished, so no update is delivered
/// after it returns.
pub struct FeedHandle {
    id: SessionId,
    selection: SelectionSet,
    shutdown_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<SessionState>,
    task: Option<JoinHandle<()>>,
}

/// Spawn a session task for `selection`
pub(crate) fn spawn_session(
    selection: SelectionSet,
    config: FeedConfig,
    source: Arc<dyn BaselineSource>,
    sink: UpdateSink,
) -> Result<FeedHandle, FeedError> {
    if selection.is_empty() {
        return Err(FeedError::EmptySelection);
    }

    let id = SessionId::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (state_tx, state_rx) = watch::channel(SessionState::Bootstrapping { attempt: 1 });

    let session = Session {
        id,
        selection: selection.clone(),
        config,
        source,
        sink,
        state_tx,
        shutdown_rx,
    };
    let task = tokio::spawn(session.run());

    Ok(FeedHandle {
        id,
        selection,
        shutdown_tx,
        state_rx,
        task: Some(task),
    })
}

impl Session {
    /// Run attempts until shutdown or until the consumer goes away
    async fn run(self) {
        tracing::info!(
            session = %self.id,
            symbols = self.selection.len(),
            "Feed session started"
        );
        telemetry::set_gauge(GaugeMetric::ActiveSymbols, self.selection.len() as f64);

        let mut shutdown = self.shutdown_rx.clone();
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            let end = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                end = self.run_attempt(attempt) => end,
            };

            match end {
                AttemptEnd::ConsumerGone => {
                    tracing::info!(session = %self.id, "Quote consumer dropped, stopping session");
                    break;
                }
                AttemptEnd::Restart(e) => {
                    tracing::warn!(
                        session = %self.id,
                        attempt,
                        error = %e,
                        delay_ms = self.config.reconnect_delay_ms,
                        "Feed connection ended, restarting after delay"
                    );
                }
            }

            telemetry::increment(CounterMetric::Reconnects);
            self.set_state(SessionState::Reconnecting { attempt });

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = sleep(self.config.reconnect_delay()) => {}
            }
        }

        telemetry::set_gauge(GaugeMetric::ActiveSymbols, 0.0);
        self.set_state(SessionState::Closed);
        tracing::info!(session = %self.id, "Feed session closed");
    }

    /// Bootstrap, connect and stream until the connection ends
    async fn run_attempt(&self, attempt: u32) -> AttemptEnd {
        self.set_state(SessionState::Bootstrapping { attempt });
        let baseline = fetch_baselines(
            self.source.as_ref(),
            &self.selection,
            self.config.baseline_concurrency,
        )
        .await;

        if self.sink.is_closed() {
            return AttemptEnd::ConsumerGone;
        }

        self.set_state(SessionState::Connecting { attempt });

        let ws_config = WsConfig::new(self.config.ws_url.as_str())
            .ping_interval(self.config.ping_interval())
            .connect_timeout(self.config.connect_timeout())
            .buffer_size(self.config.buffer_size);
        let (mut ws_rx, ws_tx) = WsClient::new(ws_config).connect_bidirectional();

        let ack_deadline = sleep_until(Instant::now() + self.config.subscribe_ack_timeout());
        tokio::pin!(ack_deadline);
        // Request id of this connection's subscribe, and whether it is still unanswered
        let mut request_id: Option<u64> = None;
        let mut pending_ack = false;

        loop {
            tokio::select! {
                msg = ws_rx.recv() => {
                    match msg {
                        Some(WsMessage::Connected) => {
                            let id = binance::next_request_id();
                            let request = SubscribeRequest::trades(id, &self.selection);
                            let json = match serde_json::to_string(&request) {
                                Ok(json) => json,
                                Err(e) => return AttemptEnd::Restart(FeedError::Serialize(e.to_string())),
                            };
                            if ws_tx.send(json).await.is_err() {
                                return AttemptEnd::Restart(FeedError::Transport(
                                    "connection closed before subscribe".into(),
                                ));
                            }

                            tracing::info!(
                                session = %self.id,
                                request_id = id,
                                streams = ?request.params,
                                "Sent subscribe request"
                            );
                            request_id = Some(id);
                            pending_ack = true;
                            ack_deadline
                                .as_mut()
                                .reset(Instant::now() + self.config.subscribe_ack_timeout());
                            self.set_state(SessionState::AwaitingAck { request_id: id });
                        }
                        Some(WsMessage::Text(text)) => {
                            match binance::parse_frame(&text) {
                                Ok(InboundFrame::Trade(trade)) => {
                                    if !self.handle_trade(trade, &baseline).await {
                                        return AttemptEnd::ConsumerGone;
                                    }
                                }
                                Ok(InboundFrame::Ack { id }) if request_id == Some(id) => {
                                    if pending_ack {
                                        tracing::info!(session = %self.id, request_id = id, "Subscription acknowledged");
                                    } else {
                                        tracing::info!(session = %self.id, request_id = id, "Late subscription acknowledgment");
                                    }
                                    pending_ack = false;
                                    self.set_state(SessionState::Streaming { acknowledged: true });
                                }
                                Ok(InboundFrame::Ack { id }) => {
                                    tracing::debug!(session = %self.id, request_id = id, "Ignoring acknowledgment for unknown request");
                                }
                                Ok(InboundFrame::Rejected { id, code, msg }) => {
                                    tracing::error!(
                                        session = %self.id,
                                        request_id = ?id,
                                        code,
                                        msg = %msg,
                                        "Subscribe request rejected"
                                    );
                                    return AttemptEnd::Restart(FeedError::SubscribeRejected { code, msg });
                                }
                                Ok(InboundFrame::Other { event_type }) => {
                                    tracing::trace!(event_type = %event_type, "Ignoring non-trade event");
                                }
                                Err(e) => {
                                    telemetry::increment(CounterMetric::MalformedFrames);
                                    tracing::warn!(
                                        session = %self.id,
                                        error = %e,
                                        msg_preview = %text.chars().take(100).collect::<String>(),
                                        "Dropping malformed stream message"
                                    );
                                }
                            }
                        }
                        Some(WsMessage::Binary(_)) => {
                            // Binance doesn't send binary messages for trade streams
                        }
                        Some(WsMessage::Disconnected { error }) => {
                            let reason = error.unwrap_or_else(|| "closed by server".to_string());
                            return AttemptEnd::Restart(FeedError::Transport(reason));
                        }
                        None => {
                            return AttemptEnd::Restart(FeedError::Transport("transport task ended".into()));
                        }
                    }
                }

                _ = &mut ack_deadline, if pending_ack => {
                    tracing::warn!(
                        session = %self.id,
                        request_id = ?request_id,
                        timeout_ms = self.config.subscribe_ack_timeout_ms,
                        "No subscribe acknowledgment, streaming provisionally"
                    );
                    pending_ack = false;
                    self.set_state(SessionState::Streaming { acknowledged: false });
                }
            }
        }
    }

    /// Turn a trade into a quote and deliver it; false once the consumer is gone
    async fn handle_trade(&self, trade: TradeEvent, baseline: &ReferenceBaseline) -> bool {
        telemetry::increment(CounterMetric::TradesReceived);

        let symbol = match Symbol::new(&trade.symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                telemetry::increment(CounterMetric::MalformedFrames);
                tracing::warn!(session = %self.id, error = %e, "Dropping trade with invalid symbol");
                return true;
            }
        };

        if !self.selection.contains(&symbol) {
            tracing::debug!(session = %self.id, %symbol, "Dropping trade for unselected symbol");
            return true;
        }

        let quote = quote_from_trade(symbol, trade, baseline);
        let delivered = self.sink.deliver(quote).await;
        if delivered {
            telemetry::increment(CounterMetric::QuotesDelivered);
        }
        delivered
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!(session = %self.id, ?state, "Session state changed");
        self.state_tx.send_replace(state);
    }
}

/// Resolve once shutdown is requested or the handle is gone
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    // Err means the sender was dropped, which also stops the session
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Build the quote for one trade tick against this attempt's reference prices
pub(crate) fn quote_from_trade(
    symbol: Symbol,
    trade: TradeEvent,
    baseline: &ReferenceBaseline,
) -> PriceQuote {
    let change_24h = baseline.change_pct(&symbol, trade.price_value);
    PriceQuote {
        symbol,
        price: trade.price,
        change_24h,
        exchange_ts: trade.trade_time,
        received_at: Utc::now(),
    }
}

impl FeedHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Symbols this session was started with
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Watch channel of lifecycle state changes
    pub fn state_watch(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    pub fn is_active(&self) -> bool {
        self.state() != SessionState::Closed
    }

    /// Stop the session and wait for its task to finish
    ///
    /// Suppresses any pending reconnect.
    pub async fn close(mut self) {
        self.shutdown_tx.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(session = %self.id, error = %e, "Feed session task failed");
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
