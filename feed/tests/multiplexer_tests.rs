use std::time::Duration;

use tokio::sync::mpsc;

use feed::multiplexer::{FeedMultiplexer, FeedMultiplexerConfig};
use feed::protocol::Topic;

/// Config pointing at a dead endpoint: connect attempts fail fast and the
/// refcount / listener bookkeeping is exercised without a live venue.
fn test_config() -> FeedMultiplexerConfig {
    FeedMultiplexerConfig {
        ws_url: "ws://127.0.0.1:9".into(),
        keepalive_interval_ms: 8_000,
        teardown_grace_ms: 100,
    }
}

#[tokio::test]
async fn listener_registration_is_tracked() {
    let mux = FeedMultiplexer::new(test_config());

    let (tx, _rx) = mpsc::channel(8);
    mux.clone().register_listener("collector-btc".into(), tx).await;
    assert_eq!(mux.listener_count().await, 1);

    mux.clone().unregister_listener("collector-btc").await;
    assert_eq!(mux.listener_count().await, 0);
}

#[tokio::test]
async fn topic_refcounts_increment_and_decrement() {
    let mux = FeedMultiplexer::new(test_config());
    let topic = Topic::trades("BTC");

    mux.subscribe(topic.clone()).await;
    mux.subscribe(topic.clone()).await;
    assert_eq!(mux.topic_refcount(&topic).await, 2);

    mux.unsubscribe(&topic).await;
    assert_eq!(mux.topic_refcount(&topic).await, 1);

    mux.unsubscribe(&topic).await;
    assert_eq!(mux.topic_refcount(&topic).await, 0);
}

#[tokio::test]
async fn unsubscribe_of_unknown_topic_is_a_noop() {
    let mux = FeedMultiplexer::new(test_config());
    let topic = Topic::trades("ETH");

    mux.unsubscribe(&topic).await;
    assert_eq!(mux.topic_refcount(&topic).await, 0);
}

#[tokio::test]
async fn distinct_topics_are_counted_independently() {
    let mux = FeedMultiplexer::new(test_config());
    let trades = Topic::trades("BTC");
    let ctx = Topic::asset_ctx("BTC");

    mux.subscribe(trades.clone()).await;
    mux.subscribe(ctx.clone()).await;

    assert_eq!(mux.topic_refcount(&trades).await, 1);
    assert_eq!(mux.topic_refcount(&ctx).await, 1);
}

#[tokio::test]
async fn reregistration_within_grace_period_keeps_listeners_alive() {
    let mux = FeedMultiplexer::new(test_config());

    let (tx1, _rx1) = mpsc::channel(8);
    mux.clone().register_listener("a".into(), tx1).await;
    mux.clone().unregister_listener("a").await;

    // Come back before the grace period elapses.
    let (tx2, _rx2) = mpsc::channel(8);
    mux.clone().register_listener("b".into(), tx2).await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    // The new listener must have survived the stale teardown timer.
    assert_eq!(mux.listener_count().await, 1);
}
