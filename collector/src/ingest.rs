//! Feed ingest task.
//!
//! Bridges the multiplexer's fan-out channel into the shared market
//! state: wire trades become `market::Trade` and run through the
//! classifier against the current effective threshold; asset-context
//! frames refresh the mark price.
//!
//! A single consumer owns the receive loop, so classification for
//! message N+1 never begins before message N's handler returns.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use feed::protocol::{FeedMessage, WsTrade};
use market::classifier::EventClassifier;
use market::types::{Side, Trade};

use crate::engine::SharedMarket;

/// Best-effort wire-to-domain conversion; unparsable fields drop the
/// trade, mirroring the transport's malformed-frame policy.
fn to_trade(ws: &WsTrade) -> Option<Trade> {
    let price: f64 = ws.px.parse().ok()?;
    let size: f64 = ws.sz.parse().ok()?;
    if !(price.is_finite() && size.is_finite()) || price <= 0.0 || size <= 0.0 {
        return None;
    }

    let side = if ws.is_buy() { Side::Buy } else { Side::Sell };
    Some(Trade::new(
        ws.coin.clone(),
        side,
        price,
        size,
        ws.hash.clone(),
        ws.time,
    ))
}

/// Spawn the ingest loop for one instrument.
///
/// The receiver end is handed to `FeedMultiplexer::register_listener`;
/// the task runs until the channel closes.
pub fn spawn_ingest(
    shared: Arc<Mutex<SharedMarket>>,
    classifier: EventClassifier,
    instrument: String,
    mut rx: mpsc::Receiver<FeedMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match message {
                FeedMessage::Trades(trades) => {
                    let mut guard = shared.lock().await;
                    let threshold = guard.effective_threshold;

                    for ws in trades.iter().filter(|t| t.coin == instrument) {
                        let Some(trade) = to_trade(ws) else {
                            debug!(hash = %ws.hash, "dropping unparsable trade");
                            continue;
                        };

                        classifier.ingest(&mut guard.state, &trade, threshold);
                    }
                }

                FeedMessage::AssetCtx(ctx) if ctx.coin == instrument => {
                    if let Some(mark) = ctx.mark_px.as_deref().and_then(|p| p.parse().ok()) {
                        shared.lock().await.state.mark_price = Some(mark);
                    }
                }

                FeedMessage::AssetCtx(_) | FeedMessage::Pong => {}
            }
        }

        debug!(instrument = %instrument, "feed channel closed, ingest task ending");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws_trade(coin: &str, side: &str, px: &str, sz: &str, hash: &str) -> WsTrade {
        WsTrade {
            coin: coin.into(),
            side: side.into(),
            px: px.into(),
            sz: sz.into(),
            time: 1_000,
            hash: hash.into(),
        }
    }

    #[test]
    fn converts_wire_trades() {
        let trade = to_trade(&ws_trade("BTC", "B", "97000.5", "2", "0xabc")).unwrap();

        assert_eq!(trade.side, Side::Buy);
        assert_eq!(trade.price, 97_000.5);
        assert_eq!(trade.notional, 194_001.0);
        assert_eq!(trade.hash, "0xabc");
    }

    #[test]
    fn sell_side_maps_from_ask() {
        let trade = to_trade(&ws_trade("BTC", "A", "100", "1", "0x1")).unwrap();
        assert_eq!(trade.side, Side::Sell);
    }

    #[test]
    fn garbage_numbers_drop_the_trade() {
        assert!(to_trade(&ws_trade("BTC", "B", "not-a-price", "1", "0x1")).is_none());
        assert!(to_trade(&ws_trade("BTC", "B", "100", "", "0x2")).is_none());
        assert!(to_trade(&ws_trade("BTC", "B", "-5", "1", "0x3")).is_none());
        assert!(to_trade(&ws_trade("BTC", "B", "100", "0", "0x4")).is_none());
    }
}
