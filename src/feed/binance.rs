//! Binance stream wire contract
//!
//! Outbound: `{"method":"SUBSCRIBE","params":["btcusdt@trade"],"id":1}`.
//! Inbound: short-key trade events (`e`, `s`, `p`, `T`), subscribe
//! acknowledgments (`{"result":null,"id":1}`) and error replies
//! (`{"error":{"code":2,"msg":"..."},"id":1}`).

use super::SelectionSet;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Event type of a single executed trade
const TRADE_EVENT: &str = "trade";

static LAST_REQUEST_ID: AtomicU64 = AtomicU64::new(0);

/// Next subscribe request id
///
/// Derived from wall-clock milliseconds, bumped past the previous id so two
/// requests in the same millisecond never share one.
pub fn next_request_id() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
    let mut prev = LAST_REQUEST_ID.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_REQUEST_ID.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// Subscribe request sent once per connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub method: String,
    pub params: Vec<String>,
    pub id: u64,
}

impl SubscribeRequest {
    /// Trade-channel subscription for every symbol in the selection
    pub fn trades(id: u64, selection: &SelectionSet) -> Self {
        Self {
            method: "SUBSCRIBE".to_string(),
            params: selection.stream_names(),
            id,
        }
    }
}

/// Binance trade message structure
#[derive(Debug, Deserialize)]
struct BinanceTradeMessage {
    /// Symbol
    #[serde(rename = "s")]
    symbol: Option<String>,
    /// Price
    #[serde(rename = "p")]
    price: Option<String>,
    /// Trade time (milliseconds)
    #[serde(rename = "T")]
    trade_time: Option<i64>,
}

/// Error reply body
#[derive(Debug, Deserialize)]
struct BinanceErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

/// A trade event after validation
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    /// Symbol as sent by the exchange
    pub symbol: String,
    /// Raw price string, kept for display
    pub price: String,
    /// Parsed price, used for the change computation
    pub price_value: Decimal,
    /// Exchange trade time
    pub trade_time: Option<DateTime<Utc>>,
}

/// A classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Trade(TradeEvent),
    /// Subscribe acknowledgment
    Ack { id: u64 },
    /// Error reply to a request
    Rejected { id: Option<u64>, code: i64, msg: String },
    /// Well-formed event of another type
    Other { event_type: String },
}

/// Why an inbound frame could not be used
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Frame is not a JSON object")]
    NotAnObject,
    #[error("Trade event missing field: {0}")]
    MissingField(&'static str),
    #[error("Trade event has non-numeric price: {0}")]
    InvalidPrice(String),
    #[error("Unrecognized frame")]
    Unrecognized,
}

/// Parse and classify a text frame from the stream
pub fn parse_frame(text: &str) -> Result<InboundFrame, FrameError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| FrameError::InvalidJson(e.to_string()))?;
    classify(value)
}

fn classify(value: Value) -> Result<InboundFrame, FrameError> {
    let obj = value.as_object().ok_or(FrameError::NotAnObject)?;

    // Combined-stream wrapper: {"stream": "...", "data": {...}}
    if obj.contains_key("stream") {
        if let Some(data) = obj.get("data") {
            return classify(data.clone());
        }
    }

    if let Some(event_type) = obj.get("e").and_then(Value::as_str) {
        if event_type == TRADE_EVENT {
            return parse_trade(value).map(InboundFrame::Trade);
        }
        return Ok(InboundFrame::Other {
            event_type: event_type.to_string(),
        });
    }

    let id = obj.get("id").and_then(Value::as_u64);

    if let Some(error) = obj.get("error") {
        let body: BinanceErrorBody = serde_json::from_value(error.clone())
            .unwrap_or(BinanceErrorBody {
                code: 0,
                msg: error.to_string(),
            });
        return Ok(InboundFrame::Rejected {
            id,
            code: body.code,
            msg: body.msg,
        });
    }

    match (obj.contains_key("result"), id) {
        (true, Some(id)) => Ok(InboundFrame::Ack { id }),
        _ => Err(FrameError::Unrecognized),
    }
}

fn parse_trade(value: Value) -> Result<TradeEvent, FrameError> {
    let trade: BinanceTradeMessage =
        serde_json::from_value(value).map_err(|e| FrameError::InvalidJson(e.to_string()))?;

    let symbol = trade
        .symbol
        .filter(|s| !s.is_empty())
        .ok_or(FrameError::MissingField("s"))?;
    let price = trade
        .price
        .filter(|p| !p.is_empty())
        .ok_or(FrameError::MissingField("p"))?;
    let price_value =
        Decimal::from_str(&price).map_err(|_| FrameError::InvalidPrice(price.clone()))?;
    let trade_time = trade
        .trade_time
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    Ok(TradeEvent {
        symbol,
        price,
        price_value,
        trade_time,
    })
}
