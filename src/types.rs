//! Shared types for the edge engine.
//!
//! These types form the data model used across all modules. Everything
//! here lives for at most one trading cycle except the `LogEntry`
//! sequence, which is handed to the log sink when the cycle completes.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A binary outcome market snapshot, as delivered by the market source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    /// Category slug the market was fetched under (e.g. "crypto").
    pub category: String,
    /// Current YES price (0.0–1.0)
    pub price_yes: f64,
    /// Current NO price (0.0–1.0)
    pub price_no: f64,
    /// Outcome token routed to when buying YES.
    pub yes_token: String,
    /// Outcome token routed to when buying NO.
    pub no_token: String,
    pub volume: f64,
    pub liquidity: f64,
    pub active: bool,
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (YES: {:.0}¢ | NO: {:.0}¢ | vol: ${:.0})",
            self.id,
            self.question,
            self.price_yes * 100.0,
            self.price_no * 100.0,
            self.volume,
        )
    }
}

impl Market {
    /// Outcome prices as the ordered pair (yes, no).
    pub fn outcome_prices(&self) -> (f64, f64) {
        (self.price_yes, self.price_no)
    }

    /// Token bought when taking `side` on this market. BUY takes YES,
    /// SELL takes NO. Returns `None` when the source gave no token id.
    pub fn token_for(&self, side: Side) -> Option<&str> {
        let token = match side {
            Side::Buy => self.yes_token.as_str(),
            Side::Sell => self.no_token.as_str(),
        };
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }

    /// A sample market for tests.
    pub fn sample() -> Self {
        Self {
            id: "0xbtc-5m-up".to_string(),
            question: "Will Bitcoin be up in the next 5 minutes?".to_string(),
            category: "crypto".to_string(),
            price_yes: 0.45,
            price_no: 0.55,
            yes_token: "tok-yes".to_string(),
            no_token: "tok-no".to_string(),
            volume: 25_000.0,
            liquidity: 8_000.0,
            active: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Trade direction relative to the YES outcome.
///
/// BUY means the model thinks YES is underpriced; SELL means it is
/// overpriced, which is expressed by buying the NO outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Kind of audit-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogAction {
    Scan,
    Trade,
    Skip,
    Halt,
    Error,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogAction::Scan => write!(f, "SCAN"),
            LogAction::Trade => write!(f, "TRADE"),
            LogAction::Skip => write!(f, "SKIP"),
            LogAction::Halt => write!(f, "HALT"),
            LogAction::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Strategy types
// ---------------------------------------------------------------------------

/// A market whose model fair value diverges from its quote by at least
/// the edge threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSignal {
    pub asset: String,
    pub market: Market,
    /// Model fair value, percentage points (0–100).
    pub model_fair: f64,
    /// Market YES price, percentage points (0–100).
    pub market_price: f64,
    /// `model_fair - market_price`
    pub divergence: f64,
    pub side: Side,
    pub d2: f64,
    pub nd2: f64,
}

impl fmt::Display for EdgeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} model={:.2} mkt={:.2} edge={:+.2}pp",
            self.side, self.asset, self.market.id, self.model_fair, self.market_price, self.divergence,
        )
    }
}

impl EdgeSignal {
    /// Market-implied YES probability (0–1).
    pub fn market_probability(&self) -> f64 {
        self.market_price / 100.0
    }

    /// Price of the outcome actually bought: the YES price for BUY,
    /// the complement for SELL.
    pub fn execution_price(&self) -> f64 {
        let mkt_p = self.market_probability();
        match self.side {
            Side::Buy => mkt_p,
            Side::Sell => 1.0 - mkt_p,
        }
    }
}

/// A signal turned into a concrete order size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizedPosition {
    pub signal: EdgeSignal,
    /// Applied bankroll fraction, in `[0, max_position_pct]`.
    pub kelly_fraction: f64,
    pub size_usd: f64,
    pub shares: u64,
}

impl SizedPosition {
    pub fn execution_price(&self) -> f64 {
        self.signal.execution_price()
    }
}

impl fmt::Display for SizedPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} x{} @ {:.2}¢ (${:.2}, kelly {:.2}%)",
            self.signal.side,
            self.signal.asset,
            self.shares,
            self.execution_price() * 100.0,
            self.size_usd,
            self.kelly_fraction * 100.0,
        )
    }
}

/// Outcome of a successfully placed order. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub position: SizedPosition,
    /// Tick-rounded limit price sent to the venue.
    pub price: Decimal,
    /// Shares ordered, after re-fitting to the rounded price.
    pub size: Decimal,
    pub order_id: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl TradeResult {
    /// Dollars committed by the placed order.
    pub fn notional(&self) -> f64 {
        (self.price * self.size).to_f64().unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Venue types
// ---------------------------------------------------------------------------

/// A resting order at the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub price: Decimal,
    pub original_size: Decimal,
    pub size_matched: Decimal,
    /// Outcome token id.
    pub asset: String,
    pub side: Side,
}

impl OpenOrder {
    /// Shares not yet matched.
    pub fn remaining(&self) -> Decimal {
        (self.original_size - self.size_matched).max(Decimal::ZERO)
    }

    /// Capital still at risk in the unmatched remainder.
    pub fn open_notional(&self) -> Decimal {
        self.price * self.remaining()
    }

    pub fn is_partially_filled(&self) -> bool {
        self.size_matched > Decimal::ZERO
    }
}

/// Limit order sent to the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: Side,
}

/// Venue acknowledgement for a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub status: String,
}

/// A spot price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotQuote {
    pub value: f64,
    pub as_of: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Cycle log
// ---------------------------------------------------------------------------

/// One audit-log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub action: LogAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.action,
            self.asset.as_deref().unwrap_or("-"),
            self.details,
        )
    }
}

/// Append-only, ordered log for one cycle.
///
/// Every push is mirrored as a `tracing` event so the console shows the
/// same trail the log sink receives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleLog {
    entries: Vec<LogEntry>,
}

impl CycleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: LogAction, asset: Option<&str>, details: impl Into<String>) {
        let details = details.into();
        let asset_label = asset.unwrap_or("-");
        match action {
            LogAction::Error => error!(action = %action, asset = asset_label, "{details}"),
            LogAction::Halt => warn!(action = %action, asset = asset_label, "{details}"),
            _ => info!(action = %action, asset = asset_label, "{details}"),
        }
        self.entries.push(LogEntry {
            action,
            asset: asset.map(str::to_string),
            details,
            timestamp: Utc::now(),
        });
    }

    pub fn scan(&mut self, asset: Option<&str>, details: impl Into<String>) {
        self.push(LogAction::Scan, asset, details);
    }

    pub fn skip(&mut self, asset: Option<&str>, details: impl Into<String>) {
        self.push(LogAction::Skip, asset, details);
    }

    pub fn trade(&mut self, asset: Option<&str>, details: impl Into<String>) {
        self.push(LogAction::Trade, asset, details);
    }

    pub fn halt(&mut self, asset: Option<&str>, details: impl Into<String>) {
        self.push(LogAction::Halt, asset, details);
    }

    pub fn error(&mut self, asset: Option<&str>, details: impl Into<String>) {
        self.push(LogAction::Error, asset, details);
    }

    /// Append another log's entries, preserving their order.
    pub fn extend(&mut self, other: CycleLog) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<LogEntry> {
        self.entries
    }

    pub fn count(&self, action: LogAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Engine error taxonomy.
///
/// Risk halts are not errors; they are recorded as HALT log entries.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid model input: {0}")]
    Domain(String),

    #[error("Transport error ({source_name}): {message}")]
    Transport { source_name: String, message: String },

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },

    #[error("A trading cycle is already in flight")]
    CycleInFlight,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn domain(message: impl Into<String>) -> Self {
        EngineError::Domain(message.into())
    }

    pub fn transport(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        EngineError::Transport {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    /// Timeouts are handled exactly like transport failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, EngineError::Transport { .. } | EngineError::Timeout { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
