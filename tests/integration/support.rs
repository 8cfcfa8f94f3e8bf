//! In-process exchange doubles shared by the integration tests

use async_trait::async_trait;
use crytrack::baseline::BaselineSource;
use crytrack::config::FeedConfig;
use crytrack::feed::binance::SubscribeRequest;
use crytrack::feed::{PriceQuote, Symbol};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

/// Feed config pointing at a local stream with short timings
pub fn feed_config(ws_url: String) -> FeedConfig {
    FeedConfig {
        ws_url,
        rest_url: "http://127.0.0.1:9/api/v3".to_string(),
        reconnect_delay_ms: 100,
        subscribe_ack_timeout_ms: 2_000,
        request_timeout_secs: 2,
        ..FeedConfig::default()
    }
}

/// Callback that forwards every quote into a channel
pub fn collector() -> (
    impl Fn(PriceQuote) + Send + Sync + 'static,
    mpsc::UnboundedReceiver<PriceQuote>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let callback = move |quote: PriceQuote| {
        let _ = tx.send(quote);
    };
    (callback, rx)
}

/// Next quote, failing the test if none arrives in time
pub async fn next_quote(rx: &mut mpsc::UnboundedReceiver<PriceQuote>) -> PriceQuote {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for quote")
        .expect("quote channel closed")
}

/// Reference prices served from memory, counting lookups
#[derive(Default)]
pub struct StaticBaselines {
    prices: Mutex<HashMap<String, Decimal>>,
    calls: AtomicUsize,
}

impl StaticBaselines {
    pub fn new(prices: &[(&str, Decimal)]) -> Arc<Self> {
        let source = Self::default();
        for (symbol, price) in prices {
            source.set(symbol, *price);
        }
        Arc::new(source)
    }

    pub fn set(&self, symbol: &str, price: Decimal) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaselineSource for StaticBaselines {
    async fn open_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices.lock().unwrap().get(symbol.as_str()).copied()
    }
}

/// Local WebSocket endpoint that hands out accepted connections
pub struct MockExchange {
    addr: SocketAddr,
    incoming: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockExchange {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, incoming) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(MockConnection { ws }).is_err() {
                        break;
                    }
                }
            }
        });

        Self { addr, incoming }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn accept(&mut self) -> MockConnection {
        self.try_accept(WAIT)
            .await
            .expect("client never connected")
    }

    pub async fn try_accept(&mut self, within: Duration) -> Option<MockConnection> {
        timeout(within, self.incoming.recv()).await.ok().flatten()
    }
}

/// Server side of one client connection
pub struct MockConnection {
    ws: WebSocketStream<TcpStream>,
}

impl MockConnection {
    pub async fn read_subscribe(&mut self) -> SubscribeRequest {
        loop {
            let msg = timeout(WAIT, self.ws.next())
                .await
                .expect("no subscribe request");
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text).expect("not a subscribe request")
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended before subscribe: {other:?}"),
            }
        }
    }

    /// Read the subscribe request and acknowledge it
    pub async fn handshake(&mut self) -> SubscribeRequest {
        let request = self.read_subscribe().await;
        self.send_json(json!({ "result": null, "id": request.id })).await;
        request
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string()))
            .await
            .unwrap();
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    pub async fn trade(&mut self, symbol: &str, price: &str) {
        self.send_json(json!({
            "e": "trade",
            "E": 1704067200000_i64,
            "s": symbol,
            "t": 123456789,
            "p": price,
            "q": "0.001",
            "T": 1704067200123_i64
        }))
        .await;
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
        while let Ok(Some(Ok(_))) = timeout(Duration::from_millis(200), self.ws.next()).await {}
    }

    /// True once the client has closed the connection
    pub async fn closed_by_client(&mut self, within: Duration) -> bool {
        timeout(within, async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    Some(Ok(_)) => continue,
                }
            }
        })
        .await
        .is_ok()
    }
}

type Responder = Arc<dyn Fn(&str) -> (u16, String) + Send + Sync>;

/// Minimal HTTP/1.1 server answering each request via `respond(request_line)`
pub struct MockHttp {
    addr: SocketAddr,
    requests: mpsc::UnboundedReceiver<String>,
}

impl MockHttp {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, requests) = mpsc::unbounded_channel();
        let respond: Responder = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                let respond = respond.clone();
                tokio::spawn(async move {
                    serve_one(stream, tx, respond).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api/v3", self.addr)
    }

    pub async fn next_request(&mut self) -> String {
        timeout(WAIT, self.requests.recv())
            .await
            .expect("no HTTP request")
            .expect("server stopped")
    }
}

async fn serve_one(mut stream: TcpStream, tx: mpsc::UnboundedSender<String>, respond: Responder) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let request = String::from_utf8_lossy(&buf);
    let request_line = request.lines().next().unwrap_or_default().to_string();
    let (status, body) = respond(&request_line);
    let _ = tx.send(request_line);

    let reason = if status == 200 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}
