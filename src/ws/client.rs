//! WebSocket client

use super::types::{WsConfig, WsError, WsMessage, MIN_PING_INTERVAL};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Outbound queue depth; requests are rare, one subscribe per connection
const OUTBOUND_BUFFER: usize = 64;

/// WebSocket client with ping/pong handling
pub struct WsClient {
    config: WsConfig,
}

impl WsClient {
    /// Create a new WebSocket client with the given configuration
    pub fn new(config: WsConfig) -> Self {
        Self { config }
    }

    /// Create a new client with just a URL using default config
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::new(WsConfig::new(url))
    }

    /// Get the configured URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Open one connection and return (message_receiver, message_sender)
    ///
    /// A background task owns the socket. The receiver yields `Connected`
    /// once the handshake completes, then every text/binary frame, and
    /// finally exactly one `Disconnected`. Text pushed into the sender is
    /// written to the socket. Dropping the sender closes the connection
    /// with a close frame; dropping the receiver closes it too.
    pub fn connect_bidirectional(&self) -> (mpsc::Receiver<WsMessage>, mpsc::Sender<String>) {
        let (msg_tx, msg_rx) = mpsc::channel(self.config.buffer_size);
        let (send_tx, send_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let config = self.config.clone();

        tokio::spawn(async move {
            let error = match Self::connect_and_stream(&config, &msg_tx, send_rx).await {
                Ok(()) => {
                    tracing::debug!(url = %config.url, "WebSocket connection closed cleanly");
                    None
                }
                Err(e) => {
                    tracing::warn!(url = %config.url, error = %e, "WebSocket connection ended");
                    Some(e.to_string())
                }
            };
            let _ = msg_tx.send(WsMessage::Disconnected { error }).await;
        });

        (msg_rx, send_tx)
    }

    /// Connect to WebSocket and stream messages until either side closes
    async fn connect_and_stream(
        config: &WsConfig,
        tx: &mpsc::Sender<WsMessage>,
        mut send_rx: mpsc::Receiver<String>,
    ) -> Result<(), WsError> {
        tracing::info!(url = %config.url, "Connecting to WebSocket");

        let handshake = timeout(config.connect_timeout, connect_async(config.url.as_str()));
        let (ws_stream, _response) = handshake
            .await
            .map_err(|_| WsError::ConnectTimeout(config.connect_timeout))?
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let (mut write, mut read) = ws_stream.split();

        tracing::info!(url = %config.url, "WebSocket connected");

        if tx.send(WsMessage::Connected).await.is_err() {
            let _ = write.send(Message::Close(None)).await;
            return Ok(());
        }

        // Struct-literal configs bypass the builder clamp
        let ping_every = config.ping_interval.max(MIN_PING_INTERVAL);
        let mut ping_interval = interval_at(Instant::now() + ping_every, ping_every);
        ping_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut waiting_for_pong = false;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(WsMessage::Text(text)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            if tx.send(WsMessage::Binary(data)).await.is_err() {
                                tracing::debug!("Receiver dropped, closing connection");
                                let _ = write.send(Message::Close(None)).await;
                                return Ok(());
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            waiting_for_pong = false;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Received close frame");
                            return Ok(());
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            return Err(WsError::ConnectionFailed(e.to_string()));
                        }
                        None => {
                            return Err(WsError::ConnectionFailed("Stream ended unexpectedly".into()));
                        }
                    }
                }

                outbound = send_rx.recv() => {
                    match outbound {
                        Some(text) => {
                            write.send(Message::Text(text)).await
                                .map_err(|e| WsError::SendFailed(e.to_string()))?;
                        }
                        None => {
                            // Sender dropped, close connection
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }

                _ = ping_interval.tick() => {
                    if waiting_for_pong {
                        return Err(WsError::PongTimeout);
                    }
                    write.send(Message::Ping(Vec::new())).await
                        .map_err(|e| WsError::SendFailed(e.to_string()))?;
                    waiting_for_pong = true;
                }
            }
        }
    }
}
