//! Quote board module
//!
//! Per-symbol display state fed by throttled quote batches.

mod throttle;

pub use throttle::throttle;

use crate::feed::{PriceQuote, SelectionSet, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::str::FromStr;

/// Pairs offered for selection
pub const AVAILABLE_SYMBOLS: [&str; 9] = [
    "BTCUSDT", "ETHUSDT", "XRPUSDT", "ADAUSDT", "SOLUSDT", "DOTUSDT", "DOGEUSDT", "LTCUSDT",
    "BNBUSDT",
];

/// Pairs tracked when nothing else is selected
pub const DEFAULT_SELECTION: [&str; 3] = ["BTCUSDT", "ETHUSDT", "XRPUSDT"];

/// Board sort order, both descending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Highest price first
    #[default]
    Price,
    /// Largest 24h change first
    Change,
}

/// One row of the board
#[derive(Debug, Clone, PartialEq)]
pub struct BoardRow {
    pub symbol: Symbol,
    /// Last price as received, `None` until the first trade
    pub price: Option<String>,
    pub change_24h: Option<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BoardRow {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            price: None,
            change_24h: None,
            updated_at: None,
        }
    }

    fn price_value(&self) -> Option<Decimal> {
        self.price.as_deref().and_then(|p| Decimal::from_str(p).ok())
    }
}

/// Latest quote per selected symbol
#[derive(Debug, Clone, Default)]
pub struct QuoteBoard {
    rows: BTreeMap<Symbol, BoardRow>,
}

impl QuoteBoard {
    /// Create a board with an empty row for every selected symbol
    pub fn new(selection: &SelectionSet) -> Self {
        Self {
            rows: selection
                .iter()
                .map(|s| (s.clone(), BoardRow::new(s.clone())))
                .collect(),
        }
    }

    /// Apply a quote; returns false for symbols not on the board
    pub fn apply(&mut self, quote: PriceQuote) -> bool {
        match self.rows.get_mut(&quote.symbol) {
            Some(row) => {
                row.price = Some(quote.price);
                row.change_24h = quote.change_24h;
                row.updated_at = Some(quote.received_at);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&BoardRow> {
        self.rows.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in display order
    ///
    /// `Price`: unpriced rows go last. `Change`: a missing change ranks as 0.
    /// Ties keep symbol order.
    pub fn sorted(&self, key: SortKey) -> Vec<&BoardRow> {
        let mut rows: Vec<&BoardRow> = self.rows.values().collect();
        match key {
            SortKey::Price => rows.sort_by(|a, b| match (a.price_value(), b.price_value()) {
                (Some(pa), Some(pb)) => pb.cmp(&pa),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }),
            SortKey::Change => rows.sort_by(|a, b| {
                let ca = a.change_24h.unwrap_or(0.0);
                let cb = b.change_24h.unwrap_or(0.0);
                cb.total_cmp(&ca)
            }),
        }
        rows
    }

    /// Render the board as a fixed-width text table
    pub fn render(&self, key: SortKey) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<10} {:>20} {:>10}", "SYMBOL", "PRICE", "24H");
        for row in self.sorted(key) {
            let _ = writeln!(
                out,
                "{:<10} {:>20} {:>10}",
                row.symbol,
                row.price.as_deref().unwrap_or("-"),
                format_change(row.change_24h)
            );
        }
        out
    }
}

/// Format a change percentage as "+1.23%", or "-" when unknown
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.2}%", c),
        None => "-".to_string(),
    }
}
