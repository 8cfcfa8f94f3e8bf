//! Feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Suffix of the per-symbol trade channel
const TRADE_CHANNEL_SUFFIX: &str = "@trade";

/// Invalid symbol input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Symbol is empty")]
    Empty,
    #[error("Symbol contains invalid characters: {0}")]
    InvalidCharacters(String),
}

/// Trading pair identifier, canonicalized to uppercase (e.g., "BTCUSDT")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from user or wire input
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SymbolError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SymbolError::InvalidCharacters(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exchange channel name for this symbol's trade stream (e.g., "btcusdt@trade")
    pub fn stream_name(&self) -> String {
        format!("{}{}", self.0.to_ascii_lowercase(), TRADE_CHANNEL_SUFFIX)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Symbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

/// The set of symbols one session tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet(BTreeSet<Symbol>);

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of raw symbols, failing on the first invalid entry
    pub fn parse<I, S>(raw: I) -> Result<Self, SymbolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .map(Symbol::new)
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Self)
    }

    /// Add a symbol, returning false if it was already selected
    pub fn insert(&mut self, symbol: Symbol) -> bool {
        self.0.insert(symbol)
    }

    /// Toggle a symbol in or out of the selection
    pub fn toggle(&mut self, symbol: Symbol) {
        if !self.0.remove(&symbol) {
            self.0.insert(symbol);
        }
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.0.contains(symbol)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.0.iter()
    }

    /// Channel names for a subscribe request, in symbol order
    pub fn stream_names(&self) -> Vec<String> {
        self.0.iter().map(Symbol::stream_name).collect()
    }
}

impl FromIterator<Symbol> for SelectionSet {
    fn from_iter<T: IntoIterator<Item = Symbol>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a Symbol;
    type IntoIter = std::collections::btree_set::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Reference prices recorded 24 hours prior, keyed by symbol
///
/// Built once per session attempt and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ReferenceBaseline(HashMap<Symbol, Decimal>);

impl ReferenceBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol, price: Decimal) {
        self.0.insert(symbol, price);
    }

    pub fn get(&self, symbol: &Symbol) -> Option<Decimal> {
        self.0.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Percentage change of `price` against this symbol's reference price
    ///
    /// `None` when no reference price exists or it is zero.
    pub fn change_pct(&self, symbol: &Symbol, price: Decimal) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;

        let base = self.get(symbol)?;
        let ratio = (price - base).checked_div(base)?;
        (ratio * Decimal::ONE_HUNDRED).to_f64()
    }
}

impl FromIterator<(Symbol, Decimal)> for ReferenceBaseline {
    fn from_iter<T: IntoIterator<Item = (Symbol, Decimal)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A price update delivered to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Trading symbol (e.g., "BTCUSDT")
    pub symbol: Symbol,
    /// Trade price exactly as received on the wire
    pub price: String,
    /// Percentage change against the 24h reference price, if one is known
    #[serde(rename = "change24h")]
    pub change_24h: Option<f64>,
    /// Exchange trade time
    pub exchange_ts: Option<DateTime<Utc>>,
    /// Local timestamp when the trade was received
    pub received_at: DateTime<Utc>,
}

/// Identity of one feed session; retries stay bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a feed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fetching reference prices
    Bootstrapping { attempt: u32 },
    /// Opening the transport
    Connecting { attempt: u32 },
    /// Subscribe request sent, acknowledgment pending
    AwaitingAck { request_id: u64 },
    /// Receiving trades; `acknowledged` is false when the ack timed out
    Streaming { acknowledged: bool },
    /// Waiting out the retry delay after the connection ended
    Reconnecting { attempt: u32 },
    /// Session stopped; no further updates
    Closed,
}

impl SessionState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Streaming { .. })
    }
}
