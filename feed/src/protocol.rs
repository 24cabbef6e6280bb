//! Wire protocol for the venue's streaming endpoint.
//!
//! The endpoint accepts JSON control frames:
//!
//! ```text
//! {"method": "subscribe",   "subscription": {"type": ..., "coin"?, "interval"?, "user"?}}
//! {"method": "unsubscribe", "subscription": {...}}
//! {"method": "ping"}
//! ```
//!
//! and emits `{"channel": <string>, "data": <channel-specific>}` frames.
//!
//! Frame building and parsing are pure functions. Parsing is best-effort:
//! anything malformed returns `None` and the caller drops it.

use serde::Deserialize;
use serde_json::{Value, json};

/// A logical subscription multiplexed over the shared connection.
///
/// Reference counting in the multiplexer is keyed by this type, so two
/// call sites asking for the same coin's trades share one wire
/// subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Trades { coin: String },
    AssetCtx { coin: String },
    Candle { coin: String, interval: String },
    UserEvents { user: String },
}

impl Topic {
    pub fn trades(coin: impl Into<String>) -> Self {
        Topic::Trades { coin: coin.into() }
    }

    pub fn asset_ctx(coin: impl Into<String>) -> Self {
        Topic::AssetCtx { coin: coin.into() }
    }

    /// Stable string form used for logging.
    pub fn key(&self) -> String {
        match self {
            Topic::Trades { coin } => format!("trades:{coin}"),
            Topic::AssetCtx { coin } => format!("activeAssetCtx:{coin}"),
            Topic::Candle { coin, interval } => format!("candle:{coin}:{interval}"),
            Topic::UserEvents { user } => format!("userEvents:{user}"),
        }
    }

    fn subscription_value(&self) -> Value {
        match self {
            Topic::Trades { coin } => json!({ "type": "trades", "coin": coin }),
            Topic::AssetCtx { coin } => json!({ "type": "activeAssetCtx", "coin": coin }),
            Topic::Candle { coin, interval } => {
                json!({ "type": "candle", "coin": coin, "interval": interval })
            }
            Topic::UserEvents { user } => json!({ "type": "userEvents", "user": user }),
        }
    }
}

pub fn subscribe_frame(topic: &Topic) -> String {
    json!({
        "method": "subscribe",
        "subscription": topic.subscription_value(),
    })
    .to_string()
}

pub fn unsubscribe_frame(topic: &Topic) -> String {
    json!({
        "method": "unsubscribe",
        "subscription": topic.subscription_value(),
    })
    .to_string()
}

pub fn ping_frame() -> String {
    json!({ "method": "ping" }).to_string()
}

/// One executed trade as delivered on the `trades` channel.
///
/// Decimal fields arrive as strings (venue convention); `time` is a
/// millisecond timestamp and `hash` is the unique delivery identifier
/// used for dedup after reconnects.
#[derive(Debug, Clone, Deserialize)]
pub struct WsTrade {
    pub coin: String,
    /// "B" for buy, "A" for ask/sell.
    pub side: String,
    pub px: String,
    pub sz: String,
    pub time: u64,
    pub hash: String,
}

impl WsTrade {
    pub fn is_buy(&self) -> bool {
        self.side == "B"
    }
}

/// Asset context as delivered on the `activeAssetCtx` channel.
///
/// The coin sits beside the ctx payload on the wire; the parser fills
/// it in after deserializing the inner object.
#[derive(Debug, Clone, Deserialize)]
pub struct WsAssetCtx {
    #[serde(default)]
    pub coin: String,
    #[serde(rename = "markPx")]
    pub mark_px: Option<String>,
    #[serde(rename = "midPx")]
    pub mid_px: Option<String>,
}

/// Parsed inbound frame fanned out to every registered listener.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Trades(Vec<WsTrade>),
    AssetCtx(WsAssetCtx),
    /// Keepalive echo from the server.
    Pong,
}

/// Parse one inbound text frame.
///
/// Best-effort: unknown channels and malformed payloads yield `None`.
pub fn parse_frame(raw: &str) -> Option<FeedMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let channel = value.get("channel")?.as_str()?;

    match channel {
        "trades" => {
            let trades: Vec<WsTrade> =
                serde_json::from_value(value.get("data")?.clone()).ok()?;
            Some(FeedMessage::Trades(trades))
        }
        "activeAssetCtx" => {
            let data = value.get("data")?;

            // The ctx payload is nested under "ctx"; the coin sits beside it.
            let coin = data.get("coin")?.as_str()?.to_string();
            let mut ctx: WsAssetCtx =
                serde_json::from_value(data.get("ctx")?.clone()).ok()?;
            ctx.coin = coin;
            Some(FeedMessage::AssetCtx(ctx))
        }
        "pong" => Some(FeedMessage::Pong),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_carries_type_and_coin() {
        let frame = subscribe_frame(&Topic::trades("BTC"));
        let v: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(v["method"], "subscribe");
        assert_eq!(v["subscription"]["type"], "trades");
        assert_eq!(v["subscription"]["coin"], "BTC");
    }

    #[test]
    fn candle_subscription_includes_interval() {
        let frame = subscribe_frame(&Topic::Candle {
            coin: "ETH".into(),
            interval: "1h".into(),
        });
        let v: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(v["subscription"]["type"], "candle");
        assert_eq!(v["subscription"]["interval"], "1h");
    }

    #[test]
    fn unsubscribe_frame_mirrors_subscribe() {
        let topic = Topic::asset_ctx("BTC");
        let sub: Value = serde_json::from_str(&subscribe_frame(&topic)).unwrap();
        let unsub: Value = serde_json::from_str(&unsubscribe_frame(&topic)).unwrap();

        assert_eq!(unsub["method"], "unsubscribe");
        assert_eq!(sub["subscription"], unsub["subscription"]);
    }

    #[test]
    fn parses_trades_frame() {
        let raw = r#"{
            "channel": "trades",
            "data": [
                {"coin":"BTC","side":"B","px":"97000.5","sz":"0.5","time":1700000000000,"hash":"0xabc"}
            ]
        }"#;

        let Some(FeedMessage::Trades(trades)) = parse_frame(raw) else {
            panic!("expected trades frame");
        };

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].coin, "BTC");
        assert!(trades[0].is_buy());
        assert_eq!(trades[0].hash, "0xabc");
    }

    #[test]
    fn parses_asset_ctx_frame() {
        let raw = r#"{
            "channel": "activeAssetCtx",
            "data": {"coin":"BTC","ctx":{"markPx":"97001.0","midPx":"97000.0"}}
        }"#;

        let Some(FeedMessage::AssetCtx(ctx)) = parse_frame(raw) else {
            panic!("expected asset ctx frame");
        };

        assert_eq!(ctx.coin, "BTC");
        assert_eq!(ctx.mark_px.as_deref(), Some("97001.0"));
    }

    #[test]
    fn malformed_frames_are_dropped() {
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"{"channel":"trades","data":"nope"}"#).is_none());
        assert!(parse_frame(r#"{"data":[]}"#).is_none());
        assert!(parse_frame(r#"{"channel":"somethingElse","data":{}}"#).is_none());
    }
}
