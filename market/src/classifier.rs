//! Event Classifier
//!
//! Turns each trade into zero or more derived signals:
//!   • Whale:   notional ≥ the effective threshold
//!   • Flush:   sell-side whale with notional > 2× effective threshold
//!   • Burst:   symmetric rule on the buy side
//!   • Reclaim: a whale buy near an unreclaimed Flush's level marks it
//!
//! Dedup happens before anything else: a delivery identifier that is
//! already known discards the trade entirely. Absorption is a reserved
//! kind with no producer; adding one touches neither dedup nor eviction.

use tracing::debug;

use crate::state::MarketState;
use crate::types::{ClassifiedEvent, Direction, EventKind, PriceSample, Side, Trade, WhaleTrade};

#[derive(Clone, Copy, Debug)]
pub struct ClassifierConfig {
    /// Multiplier over the effective threshold for flush/burst detection.
    pub event_notional_mult: f64,
    /// Divisor scale for confidence: notional / (this × effective), capped at 1.
    pub confidence_notional_mult: f64,
    /// Proximity (percent of the flush level) for reclaim marking.
    pub reclaim_proximity_pct: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            event_notional_mult: 2.0,
            confidence_notional_mult: 5.0,
            reclaim_proximity_pct: 0.5,
        }
    }
}

/// What one ingest call did; handy for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Trade was a retransmission and was discarded before processing.
    pub duplicate: bool,
    pub whale: bool,
    pub event: Option<EventKind>,
    /// An existing Flush was marked reclaimed by this trade.
    pub reclaim_marked: bool,
}

pub struct EventClassifier {
    cfg: ClassifierConfig,
}

impl EventClassifier {
    pub fn new(cfg: ClassifierConfig) -> Self {
        Self { cfg }
    }

    /// Classify one trade against the current effective threshold and
    /// update the shared buffers.
    pub fn ingest(
        &self,
        state: &mut MarketState,
        trade: &Trade,
        effective_threshold: f64,
    ) -> IngestReport {
        // Dedup before any further processing.
        if !state.dedup.insert(&trade.hash) {
            return IngestReport {
                duplicate: true,
                ..Default::default()
            };
        }

        state.prices.push(PriceSample {
            ts_ms: trade.ts_ms,
            price: trade.price,
        });
        state.last_price = Some(trade.price);

        if trade.notional < effective_threshold {
            return IngestReport::default();
        }

        let mut report = IngestReport {
            whale: true,
            ..Default::default()
        };

        state.whales.push(WhaleTrade::from_trade(trade));
        debug!(
            coin = %trade.coin,
            side = %trade.side,
            notional = trade.notional,
            threshold = effective_threshold,
            "whale trade"
        );

        let event_floor = self.cfg.event_notional_mult * effective_threshold;
        let confidence = (trade.notional
            / (self.cfg.confidence_notional_mult * effective_threshold))
            .min(1.0);

        match trade.side {
            Side::Sell if trade.notional > event_floor => {
                state.flushes.push(ClassifiedEvent {
                    kind: EventKind::Flush,
                    direction: Direction::Short,
                    magnitude: trade.notional,
                    confidence,
                    price_level: trade.price,
                    ts_ms: trade.ts_ms,
                    reclaimed: false,
                });
                report.event = Some(EventKind::Flush);
            }
            Side::Buy if trade.notional > event_floor => {
                state.bursts.push(ClassifiedEvent {
                    kind: EventKind::Burst,
                    direction: Direction::Long,
                    magnitude: trade.notional,
                    confidence,
                    price_level: trade.price,
                    ts_ms: trade.ts_ms,
                    reclaimed: false,
                });
                report.event = Some(EventKind::Burst);
            }
            _ => {}
        }

        if trade.side == Side::Buy {
            report.reclaim_marked = self.mark_reclaims(state, trade.price);
        }

        report
    }

    /// A whale buy within the configured proximity of an unreclaimed
    /// Flush's recorded level confirms the reclaim, mutating the stored
    /// event in place.
    fn mark_reclaims(&self, state: &mut MarketState, buy_price: f64) -> bool {
        let proximity = self.cfg.reclaim_proximity_pct / 100.0;
        let mut marked = false;

        for flush in state.flushes.iter_mut() {
            if flush.reclaimed || flush.price_level <= 0.0 {
                continue;
            }

            let distance = (buy_price - flush.price_level).abs() / flush.price_level;
            if distance <= proximity {
                flush.reclaimed = true;
                marked = true;
                debug!(level = flush.price_level, buy_price, "flush level reclaimed");
            }
        }

        marked
    }
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
