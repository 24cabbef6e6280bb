//! Multi-Timeframe Aggregator
//!
//! Produces point-in-time snapshots over the rolling buffers for the
//! fixed windows (10 m, 1 h, 4 h in the reference configuration).
//!
//! `compute_snapshot` is a pure function over the shared state: it
//! filters every collection to entries with `ts ≥ now − window`
//! (boundary-inclusive) and derives the aggregate figures. Callers prune
//! the buffers to the retention ceiling before computing and may prune to
//! the retention floor after an uneventful cycle; pruning lives on
//! `MarketState`, not here.

use crate::state::MarketState;
use crate::types::{Side, TimeframeSnapshot};

pub const WINDOW_10M_MS: u64 = 10 * 60 * 1000;
pub const WINDOW_1H_MS: u64 = 60 * 60 * 1000;
pub const WINDOW_4H_MS: u64 = 4 * 60 * 60 * 1000;

/// Compute one window's snapshot. Pure: the state is only read.
pub fn compute_snapshot(state: &MarketState, window_ms: u64, now_ms: u64) -> TimeframeSnapshot {
    let cutoff = now_ms.saturating_sub(window_ms);

    let mut net_whale_flow_usd = 0.0;
    let mut total_notional_usd = 0.0;

    for whale in state.whales.iter().filter(|w| w.ts_ms >= cutoff) {
        total_notional_usd += whale.notional;
        match whale.side {
            Side::Buy => net_whale_flow_usd += whale.notional,
            Side::Sell => net_whale_flow_usd -= whale.notional,
        }
    }

    let flush_count = state.flushes.iter().filter(|e| e.ts_ms >= cutoff).count();
    let burst_count = state.bursts.iter().filter(|e| e.ts_ms >= cutoff).count();
    let absorption_count = state
        .absorptions
        .iter()
        .filter(|e| e.ts_ms >= cutoff)
        .count();

    // Price figures over the retained samples within the window. The
    // buffer is newest-first, so the first retained sample is the newest
    // and the last is the oldest.
    let mut newest_price = None;
    let mut oldest_price = None;
    let mut high = f64::MIN;
    let mut low = f64::MAX;
    let mut samples = 0usize;

    for sample in state.prices.iter().filter(|p| p.ts_ms >= cutoff) {
        if newest_price.is_none() {
            newest_price = Some(sample.price);
        }
        oldest_price = Some(sample.price);
        high = high.max(sample.price);
        low = low.min(sample.price);
        samples += 1;
    }

    let price_change_pct = match (oldest_price, newest_price) {
        (Some(oldest), Some(newest)) if oldest > 0.0 => (newest - oldest) / oldest * 100.0,
        _ => 0.0,
    };

    let volatility_pct = if samples > 0 {
        let midpoint = (high + low) / 2.0;
        if midpoint > 0.0 {
            (high - low) / midpoint * 100.0
        } else {
            0.0
        }
    } else {
        0.0
    };

    TimeframeSnapshot {
        window_ms,
        net_whale_flow_usd,
        flush_count,
        burst_count,
        absorption_count,
        price_change_pct,
        total_notional_usd,
        volatility_pct,
    }
}
