//! Core data model for the microstructure pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("Buy"),
            Side::Sell => f.write_str("Sell"),
        }
    }
}

impl FromStr for Side {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(Side::Buy),
            "Sell" => Ok(Side::Sell),
            other => Err(anyhow::anyhow!("Invalid Side value: {}", other)),
        }
    }
}

/// Directional bias carried by a derived signal or alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("Long"),
            Direction::Short => f.write_str("Short"),
        }
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Long" => Ok(Direction::Long),
            "Short" => Ok(Direction::Short),
            other => Err(anyhow::anyhow!("Invalid Direction value: {}", other)),
        }
    }
}

/// One executed transaction, immutable once received.
///
/// Identity is `hash`, the delivery identifier assigned by the venue;
/// it is what dedups retransmissions after a reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub coin: String,
    pub side: Side,
    pub price: f64,
    pub size: f64,
    /// price × size, in USD.
    pub notional: f64,
    pub hash: String,
    pub ts_ms: u64,
}

impl Trade {
    pub fn new(
        coin: impl Into<String>,
        side: Side,
        price: f64,
        size: f64,
        hash: impl Into<String>,
        ts_ms: u64,
    ) -> Self {
        Self {
            coin: coin.into(),
            side,
            price,
            size,
            notional: price * size,
            hash: hash.into(),
            ts_ms,
        }
    }
}

/// A trade whose notional cleared the effective whale threshold at
/// classification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhaleTrade {
    pub side: Side,
    pub price: f64,
    pub size: f64,
    pub notional: f64,
    pub hash: String,
    pub ts_ms: u64,
}

impl WhaleTrade {
    pub fn from_trade(trade: &Trade) -> Self {
        Self {
            side: trade.side,
            price: trade.price,
            size: trade.size,
            notional: trade.notional,
            hash: trade.hash.clone(),
            ts_ms: trade.ts_ms,
        }
    }
}

/// Kind of derived signal.
///
/// Absorption is reserved: it has no producer yet, and adding one (or any
/// further kind) must not touch dedup or buffer-eviction logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Flush,
    Burst,
    Absorption,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Flush => f.write_str("Flush"),
            EventKind::Burst => f.write_str("Burst"),
            EventKind::Absorption => f.write_str("Absorption"),
        }
    }
}

/// A derived microstructure signal.
///
/// `reclaimed` is the single mutable field of the model: price trading
/// back through a Flush's level flips it, in place, exactly once. It has
/// no meaning for other kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    pub direction: Direction,
    /// Magnitude score; for flush/burst this is the triggering notional.
    pub magnitude: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Price at which the signal fired.
    pub price_level: f64,
    pub ts_ms: u64,
    pub reclaimed: bool,
}

/// Timestamp + price, used only for intra-window high/low spread and
/// percent price change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceSample {
    pub ts_ms: u64,
    pub price: f64,
}

/// Point-in-time aggregation over one rolling window.
///
/// Recomputed on demand, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeframeSnapshot {
    pub window_ms: u64,
    /// Σ buy notional − Σ sell notional over whale trades, in USD.
    pub net_whale_flow_usd: f64,
    pub flush_count: usize,
    pub burst_count: usize,
    pub absorption_count: usize,
    /// Percent change from the oldest to the newest retained sample.
    pub price_change_pct: f64,
    pub total_notional_usd: f64,
    /// (high − low) / midpoint, as a percent. ATR proxy.
    pub volatility_pct: f64,
}
