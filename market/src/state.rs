//! Shared per-instrument market state.
//!
//! One `MarketState` exists per collector; the ingest task is its only
//! writer and the aggregator reads it at timer-fire boundaries. Callers
//! serialize access behind a single `tokio::sync::Mutex`, so no torn
//! reads are possible.

use crate::buffers::{DedupSet, SignalBuffer};
use crate::types::{ClassifiedEvent, PriceSample, WhaleTrade};

/// Buffer capacities. Age pruning (`prune`) bounds retention in time;
/// these bound it in space.
pub const WHALE_BUFFER_CAP: usize = 256;
pub const EVENT_BUFFER_CAP: usize = 128;
pub const PRICE_BUFFER_CAP: usize = 512;

/// Longest supported aggregation window.
pub const RETENTION_CEILING_MS: u64 = 4 * 60 * 60 * 1000;

/// Shortest supported window; buffers shrink to this after a cycle whose
/// verdict carried no alert.
pub const RETENTION_FLOOR_MS: u64 = 10 * 60 * 1000;

#[derive(Debug)]
pub struct MarketState {
    pub dedup: DedupSet,
    pub whales: SignalBuffer<WhaleTrade>,
    pub flushes: SignalBuffer<ClassifiedEvent>,
    pub bursts: SignalBuffer<ClassifiedEvent>,
    pub absorptions: SignalBuffer<ClassifiedEvent>,
    pub prices: SignalBuffer<PriceSample>,
    /// Last traded price observed, if any.
    pub last_price: Option<f64>,
    /// Mark price from the asset-context stream, if subscribed.
    pub mark_price: Option<f64>,
}

impl MarketState {
    pub fn new() -> Self {
        Self {
            dedup: DedupSet::new(),
            whales: SignalBuffer::new(WHALE_BUFFER_CAP),
            flushes: SignalBuffer::new(EVENT_BUFFER_CAP),
            bursts: SignalBuffer::new(EVENT_BUFFER_CAP),
            absorptions: SignalBuffer::new(EVENT_BUFFER_CAP),
            prices: SignalBuffer::new(PRICE_BUFFER_CAP),
            last_price: None,
            mark_price: None,
        }
    }

    /// Drop everything older than `now_ms − retention_ms` across all
    /// buffers.
    pub fn prune(&mut self, now_ms: u64, retention_ms: u64) {
        let cutoff = now_ms.saturating_sub(retention_ms);

        self.whales.prune_older_than(cutoff);
        self.flushes.prune_older_than(cutoff);
        self.bursts.prune_older_than(cutoff);
        self.absorptions.prune_older_than(cutoff);
        self.prices.prune_older_than(cutoff);
    }

    /// True when nothing has been ingested yet; a cycle over an empty
    /// state is skipped, not failed.
    pub fn has_data(&self) -> bool {
        self.last_price.is_some() || !self.prices.is_empty()
    }
}

impl Default for MarketState {
    fn default() -> Self {
        Self::new()
    }
}
