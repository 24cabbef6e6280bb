//! Alert Window Gate
//!
//! Per-(instrument, kind) rate limiter over a fixed rolling window.
//! State is created lazily on the first candidate and reset exactly once
//! when `now` crosses into a new window:
//!
//! ```text
//! window_start = floor(now / window_size_ms) * window_size_ms
//! ```
//!
//! `check_window` is idempotent with respect to `now`: it never changes
//! the count, so repeated calls with the same inputs yield the same
//! decision until `record_emission` is called. The in-memory state here
//! is the source of truth for rate limiting even when the durable record
//! store is down.

use std::collections::HashMap;

use crate::model::{AlertId, AlertKind};

/// Per-kind gate policy.
#[derive(Debug, Clone, Copy)]
pub struct KindPolicy {
    pub max_per_window: usize,
    /// When the window is full, update the most recent alert in place
    /// instead of rejecting outright.
    pub update_in_window: bool,
}

#[derive(Debug, Clone)]
pub struct WindowGateConfig {
    pub window_size_ms: u64,
    pub risk: KindPolicy,
    pub trade: KindPolicy,
}

impl Default for WindowGateConfig {
    fn default() -> Self {
        Self {
            window_size_ms: 10 * 60 * 1000,
            risk: KindPolicy {
                max_per_window: 2,
                update_in_window: true,
            },
            trade: KindPolicy {
                max_per_window: 1,
                update_in_window: false,
            },
        }
    }
}

impl WindowGateConfig {
    fn policy(&self, kind: AlertKind) -> KindPolicy {
        match kind {
            AlertKind::Risk => self.risk,
            AlertKind::Trade => self.trade,
        }
    }
}

/// Rolling-window counter for one (instrument, kind).
#[derive(Debug, Clone, Default)]
pub struct AlertWindowState {
    pub window_start_ms: u64,
    /// Monotonically non-decreasing within a window.
    pub count: usize,
    /// Most recent emitted alert, for update-in-place.
    pub last_alert_id: Option<AlertId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Window has room: create a new alert record.
    Emit,
    /// Window is full but the kind allows in-place updates.
    UpdateInPlace(AlertId),
    Reject { reason: String },
}

pub fn window_start(now_ms: u64, window_size_ms: u64) -> u64 {
    (now_ms / window_size_ms) * window_size_ms
}

pub struct AlertWindowGate {
    cfg: WindowGateConfig,
    states: HashMap<(String, AlertKind), AlertWindowState>,
}

impl AlertWindowGate {
    pub fn new(cfg: WindowGateConfig) -> Self {
        Self {
            cfg,
            states: HashMap::new(),
        }
    }

    /// Decide whether an alert of `kind` may surface for `instrument` now.
    ///
    /// Mutation is limited to lazy creation and the once-per-transition
    /// window reset; the count only moves via `record_emission`.
    pub fn check_window(&mut self, instrument: &str, kind: AlertKind, now_ms: u64) -> GateDecision {
        let policy = self.cfg.policy(kind);
        let state = self.roll_window(instrument, kind, now_ms);

        if state.count < policy.max_per_window {
            return GateDecision::Emit;
        }

        if policy.update_in_window
            && let Some(id) = state.last_alert_id
        {
            return GateDecision::UpdateInPlace(id);
        }

        GateDecision::Reject {
            reason: format!(
                "{kind} window full for {instrument}: {}/{} emitted since window start",
                state.count, policy.max_per_window
            ),
        }
    }

    /// Record an actual emission (new alert or in-place update target
    /// change) inside the current window.
    pub fn record_emission(
        &mut self,
        instrument: &str,
        kind: AlertKind,
        alert_id: AlertId,
        now_ms: u64,
    ) {
        let state = self.roll_window(instrument, kind, now_ms);
        state.count += 1;
        state.last_alert_id = Some(alert_id);
    }

    /// Current state for inspection; None until first use.
    pub fn state(&self, instrument: &str, kind: AlertKind) -> Option<&AlertWindowState> {
        self.states.get(&(instrument.to_string(), kind))
    }

    /// Lazily create the state and reset it when `now` has crossed into
    /// a new window boundary.
    fn roll_window(
        &mut self,
        instrument: &str,
        kind: AlertKind,
        now_ms: u64,
    ) -> &mut AlertWindowState {
        let start = window_start(now_ms, self.cfg.window_size_ms);
        let state = self
            .states
            .entry((instrument.to_string(), kind))
            .or_insert_with(|| AlertWindowState {
                window_start_ms: start,
                ..Default::default()
            });

        if state.window_start_ms != start {
            *state = AlertWindowState {
                window_start_ms: start,
                ..Default::default()
            };
        }

        state
    }
}
