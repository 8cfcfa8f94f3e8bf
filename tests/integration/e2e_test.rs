//! End-to-end tests: config file, REST bootstrap and trade stream together

use crate::support::{collector, next_quote, MockExchange, MockHttp};
use crytrack::board::{throttle, QuoteBoard, SortKey};
use crytrack::config::Config;
use crytrack::feed::{FeedClient, SelectionSet};
use std::io::Write;
use std::time::Duration;

#[test]
fn test_example_config_parses() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert!(!config.feed.symbols.is_empty());
    assert!(config.feed.ws_url.starts_with("wss://"));
    assert_eq!(config.feed.reconnect_delay_ms, 5_000);
}

fn config_file(ws_url: &str, rest_url: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[feed]
ws_url = "{ws_url}"
rest_url = "{rest_url}"
symbols = ["BTCUSDT", "ETHUSDT"]
reconnect_delay_ms = 100
request_timeout_secs = 2

[board]
throttle_interval_ms = 50
sort_by = "change"
"#
    )
    .unwrap();
    file
}

#[tokio::test]
async fn test_live_quotes_from_loaded_config() {
    let mut exchange = MockExchange::start().await;
    let http = MockHttp::start(|line: &str| {
        if line.contains("symbol=BTCUSDT") {
            (200, r#"{"openPrice":"50000.00"}"#.to_string())
        } else {
            (503, "unavailable".to_string())
        }
    })
    .await;

    let file = config_file(&exchange.url(), &http.base_url());
    let config = Config::load(file.path()).unwrap();
    let selection = SelectionSet::parse(&config.feed.symbols).unwrap();

    let client = FeedClient::new(config.feed.clone()).unwrap();
    let (on_update, mut quotes) = collector();
    let handle = client.start(selection, on_update).unwrap();

    let mut conn = exchange.accept().await;
    conn.handshake().await;

    conn.trade("BTCUSDT", "51000").await;
    let btc = next_quote(&mut quotes).await;
    assert!((btc.change_24h.unwrap() - 2.0).abs() < 1e-9);

    conn.trade("ETHUSDT", "3000").await;
    let eth = next_quote(&mut quotes).await;
    assert_eq!(eth.price, "3000");
    assert_eq!(eth.change_24h, None);

    handle.close().await;
}

#[tokio::test]
async fn test_throttled_board_shows_latest_prices() {
    let mut exchange = MockExchange::start().await;
    let http = MockHttp::start(|line: &str| {
        if line.contains("symbol=BTCUSDT") {
            (200, r#"{"openPrice":"50000"}"#.to_string())
        } else {
            (200, r#"{"openPrice":"2000"}"#.to_string())
        }
    })
    .await;

    let file = config_file(&exchange.url(), &http.base_url());
    let config = Config::load(file.path()).unwrap();
    let selection = SelectionSet::parse(&config.feed.symbols).unwrap();

    let client = FeedClient::new(config.feed.clone()).unwrap();
    let (handle, quotes) = client.subscribe(selection.clone()).unwrap();
    let mut batches = throttle(quotes, config.board.throttle_interval());
    let mut board = QuoteBoard::new(&selection);

    let mut conn = exchange.accept().await;
    conn.handshake().await;
    conn.trade("BTCUSDT", "50500").await;
    conn.trade("ETHUSDT", "2100").await;
    conn.trade("BTCUSDT", "51000").await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while board.sorted(SortKey::Price).iter().any(|r| r.price.is_none())
        || board
            .sorted(SortKey::Price)
            .iter()
            .any(|r| r.price.as_deref() == Some("50500"))
    {
        let batch = tokio::time::timeout_at(deadline, batches.recv())
            .await
            .expect("board never caught up")
            .expect("batch stream ended");
        for quote in batch {
            board.apply(quote);
        }
    }

    let order: Vec<&str> = board
        .sorted(config.board.sort_by)
        .into_iter()
        .map(|r| r.symbol.as_str())
        .collect();
    assert_eq!(config.board.sort_by, SortKey::Change);
    assert_eq!(order, vec!["ETHUSDT", "BTCUSDT"]);

    handle.close().await;
}
