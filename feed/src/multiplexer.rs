//! FeedMultiplexer
//!
//! Owns the single physical connection to the venue's streaming endpoint
//! and multiplexes many logical subscriptions and listeners over it.
//! Responsibilities:
//!   • Track registered listeners; connect when the first arrives, tear
//!     down 5 s after the last one leaves (grace absorbs churn)
//!   • Reference-count topics so each is subscribed on the wire once and
//!     unsubscribed only when its last subscriber leaves
//!   • Reconnect with exponential backoff on unexpected close; re-subscribe
//!     every live topic after reconnect
//!   • Send a keepalive ping every 8 s while connected
//!   • Fan parsed inbound frames out to every listener, isolating failures
//!
//! The multiplexer is an Arc-managed async service constructed once at
//! application scope; components receive a handle explicitly rather than
//! reaching for an ambient global. Transport errors never reach callers:
//! they surface as a close, which drives the reconnect policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::backoff::{DISCONNECT_SENTINEL, reconnect_delay_ms};
use crate::protocol::{
    FeedMessage, Topic, parse_frame, ping_frame, subscribe_frame, unsubscribe_frame,
};

/// Identifies one registered listener.
pub type ListenerId = String;

#[derive(Debug, Clone)]
pub struct FeedMultiplexerConfig {
    pub ws_url: String,
    /// Keepalive ping cadence while connected.
    pub keepalive_interval_ms: u64,
    /// How long the connection survives after the last listener leaves.
    pub teardown_grace_ms: u64,
}

impl Default for FeedMultiplexerConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://api.hyperliquid.xyz/ws".into(),
            keepalive_interval_ms: 8_000,
            teardown_grace_ms: 5_000,
        }
    }
}

/// Commands accepted by the live connection task's writer half.
enum Outbound {
    Frame(String),
    Shutdown,
}

#[derive(Default)]
struct MuxState {
    listeners: HashMap<ListenerId, mpsc::Sender<FeedMessage>>,
    /// Topic -> subscriber refcount. Wire traffic only on 0→1 and 1→0.
    topics: HashMap<Topic, usize>,
    /// Reconnect attempt counter; DISCONNECT_SENTINEL suppresses reconnects.
    attempt: u32,
    /// Bumped on every listener change; stale teardown timers compare it.
    generation: u64,
    /// Writer channel into the live connection, when one exists.
    outbound: Option<mpsc::Sender<Outbound>>,
    /// Whether a connection task is currently alive (connected or backing off).
    task_running: bool,
}

pub struct FeedMultiplexer {
    cfg: FeedMultiplexerConfig,
    state: Mutex<MuxState>,
}

impl FeedMultiplexer {
    pub fn new(cfg: FeedMultiplexerConfig) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            state: Mutex::new(MuxState::default()),
        })
    }

    /// Register an interested party.
    ///
    /// The connection opens when the first listener registers. Registering
    /// inside the teardown grace period cancels the pending teardown.
    pub async fn register_listener(
        self: Arc<Self>,
        id: ListenerId,
        sender: mpsc::Sender<FeedMessage>,
    ) {
        let mut state = self.state.lock().await;
        state.listeners.insert(id.clone(), sender);
        state.generation += 1;

        debug!(listener = %id, total = state.listeners.len(), "listener registered");

        if !state.task_running {
            state.task_running = true;
            state.attempt = 0;

            let mux = Arc::clone(&self);
            tokio::spawn(async move {
                mux.run_connection().await;
            });
        }
    }

    /// Remove a listener; schedules teardown when the last one leaves.
    pub async fn unregister_listener(self: Arc<Self>, id: &str) {
        let mut state = self.state.lock().await;
        state.listeners.remove(id);
        state.generation += 1;

        debug!(listener = %id, total = state.listeners.len(), "listener unregistered");

        if !state.listeners.is_empty() {
            return;
        }

        // Last listener gone: give rapid re-registration a grace window
        // before dropping the connection.
        let expected_generation = state.generation;
        let grace = Duration::from_millis(self.cfg.teardown_grace_ms);
        let mux = Arc::clone(&self);
        drop(state);

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let state = mux.state.lock().await;
            if state.generation != expected_generation || !state.listeners.is_empty() {
                return; // someone came back during the grace period
            }

            info!("no listeners after grace period, closing feed connection");
            if let Some(out) = state.outbound.clone() {
                drop(state);
                let _ = out.send(Outbound::Shutdown).await;
            }
        });
    }

    /// Increment a topic's refcount; emits a wire subscribe only on 0→1.
    pub async fn subscribe(&self, topic: Topic) {
        let mut state = self.state.lock().await;
        let count = state.topics.entry(topic.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            debug!(topic = %topic.key(), "first subscriber, sending wire subscribe");
            if let Some(out) = state.outbound.clone() {
                drop(state);
                let _ = out.send(Outbound::Frame(subscribe_frame(&topic))).await;
            }
        }
    }

    /// Decrement a topic's refcount; emits a wire unsubscribe only on 1→0.
    pub async fn unsubscribe(&self, topic: &Topic) {
        let mut state = self.state.lock().await;

        let Some(count) = state.topics.get_mut(topic) else {
            return;
        };

        *count = count.saturating_sub(1);
        if *count > 0 {
            return;
        }

        state.topics.remove(topic);
        debug!(topic = %topic.key(), "last subscriber left, sending wire unsubscribe");

        if let Some(out) = state.outbound.clone() {
            drop(state);
            let _ = out.send(Outbound::Frame(unsubscribe_frame(topic))).await;
        }
    }

    /// Deliberately close the connection and suppress reconnection.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.attempt = DISCONNECT_SENTINEL;

        if let Some(out) = state.outbound.clone() {
            drop(state);
            let _ = out.send(Outbound::Shutdown).await;
        }
    }

    pub async fn listener_count(&self) -> usize {
        self.state.lock().await.listeners.len()
    }

    pub async fn topic_refcount(&self, topic: &Topic) -> usize {
        self.state.lock().await.topics.get(topic).copied().unwrap_or(0)
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.outbound.is_some()
    }

    /// Connection task: connect, pump frames, reconnect with backoff.
    ///
    /// Runs until there are no listeners left or a deliberate disconnect.
    async fn run_connection(self: Arc<Self>) {
        loop {
            {
                let mut state = self.state.lock().await;
                if state.listeners.is_empty() || state.attempt == DISCONNECT_SENTINEL {
                    state.task_running = false;
                    return;
                }
            }

            match connect_async(&self.cfg.ws_url).await {
                Ok((ws, _)) => {
                    info!(url = %self.cfg.ws_url, "feed connected");

                    let deliberate = self.pump(ws).await;

                    {
                        let mut state = self.state.lock().await;
                        state.outbound = None;

                        if deliberate {
                            state.task_running = false;
                            return;
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, "feed connect failed");
                }
            }

            // Unexpected close or failed connect: back off, then retry.
            let delay = {
                let mut state = self.state.lock().await;
                if state.listeners.is_empty() || state.attempt == DISCONNECT_SENTINEL {
                    state.task_running = false;
                    return;
                }

                let delay = reconnect_delay_ms(state.attempt);
                state.attempt += 1;
                delay
            };

            warn!(delay_ms = delay, "feed reconnecting after backoff");
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    /// Drive one live connection until it closes.
    ///
    /// Returns true when the close was deliberate (shutdown command), false
    /// for any transport-initiated close.
    async fn pump<S>(&self, ws: tokio_tungstenite::WebSocketStream<S>) -> bool
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut write, mut read) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(64);

        // Successful open: reset backoff, expose the writer, re-subscribe
        // every topic that still has subscribers.
        let resubscribe: Vec<String> = {
            let mut state = self.state.lock().await;
            state.attempt = 0;
            state.outbound = Some(out_tx);

            state
                .topics
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(topic, _)| subscribe_frame(topic))
                .collect()
        };

        for frame in resubscribe {
            if write.send(Message::Text(frame.into())).await.is_err() {
                return false;
            }
        }

        let mut keepalive =
            tokio::time::interval(Duration::from_millis(self.cfg.keepalive_interval_ms));
        keepalive.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if write.send(Message::Text(ping_frame().into())).await.is_err() {
                        return false;
                    }
                }

                cmd = out_rx.recv() => match cmd {
                    Some(Outbound::Frame(frame)) => {
                        if write.send(Message::Text(frame.into())).await.is_err() {
                            return false;
                        }
                    }
                    Some(Outbound::Shutdown) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        return true;
                    }
                },

                msg = read.next() => match msg {
                    Some(Ok(m)) if m.is_text() => {
                        let Ok(raw) = m.to_text() else { continue };

                        // Best-effort parsing: malformed frames are dropped.
                        if let Some(parsed) = parse_frame(raw) {
                            self.fan_out(parsed).await;
                        }
                    }
                    Some(Ok(m)) if m.is_close() => return false,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "feed read error");
                        return false;
                    }
                    None => return false,
                },
            }
        }
    }

    /// Deliver a message to every listener.
    ///
    /// A full or closed listener channel must not prevent delivery to the
    /// others, so sends are non-blocking and their results ignored.
    async fn fan_out(&self, msg: FeedMessage) {
        let state = self.state.lock().await;
        for sender in state.listeners.values() {
            let _ = sender.try_send(msg.clone());
        }
    }
}
