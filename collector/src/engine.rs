//! Collector engine
//!
//! Runs the periodic analysis cycle for one instrument:
//!   1. Prune buffers to the retention ceiling, compute the three
//!      timeframe snapshots, refresh the effective whale threshold from
//!      the 1-hour volatility
//!   2. Assemble the bundle and invoke the decision oracle under a hard
//!      timeout
//!   3. Pass the verdict's candidates through the window gate and the
//!      validation engine, persisting every outcome
//!
//! At most one cycle is in flight per collector: a periodic trigger that
//! fires while the oracle call is outstanding is a silent no-op. The
//! host sees a completed cycle, a skipped cycle, or a cycle error with a
//! human-readable message, never a raw transport failure.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, warn};

use alerts::model::{AlertCandidate, AlertId, AlertRecord, AlertStatus};
use alerts::store::{AlertStore, OracleCallRecord};
use alerts::validation::{ValidationContext, ValidationEngine};
use alerts::window_gate::{AlertWindowGate, GateDecision, window_start};
use common::logger::{TraceId, cycle_span};
use market::aggregator::{WINDOW_1H_MS, WINDOW_4H_MS, WINDOW_10M_MS, compute_snapshot};
use market::state::{MarketState, RETENTION_CEILING_MS, RETENTION_FLOOR_MS};
use market::threshold::effective_whale_threshold;
use market::types::{Direction, Side};

use crate::config::CollectorConfig;
use crate::types::{
    AnalysisBundle, DecisionOracle, MarketContext, PortfolioReader, PortfolioSnapshot,
    WhaleFlowSummary,
};

/// Market state plus the threshold the ingest task classifies against.
/// One mutex serializes the ingest task and the cycle.
pub struct SharedMarket {
    pub state: MarketState,
    pub effective_threshold: f64,
}

impl SharedMarket {
    pub fn new(base_threshold_usd: f64) -> Self {
        Self {
            state: MarketState::new(),
            effective_threshold: base_threshold_usd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A previous cycle's oracle call is still outstanding.
    AnalysisInProgress,
    /// Nothing ingested yet; not an error.
    NoMarketData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed {
        accepted: usize,
        updated: usize,
        rejected: usize,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("decision oracle timed out after {secs}s")]
    OracleTimeout { secs: u64 },

    #[error("decision oracle failed: {0}")]
    Oracle(String),
}

pub struct Collector<O: DecisionOracle, S: AlertStore, P: PortfolioReader> {
    cfg: CollectorConfig,
    shared: Arc<Mutex<SharedMarket>>,
    gate: Mutex<AlertWindowGate>,
    validation: ValidationEngine,
    oracle: Arc<O>,
    store: Arc<S>,
    portfolio: Arc<P>,
    /// Mutual exclusion for the analysis cycle; acquired with try_lock so
    /// overlapping triggers skip instead of queueing.
    in_flight: Mutex<()>,
}

impl<O: DecisionOracle, S: AlertStore + 'static, P: PortfolioReader> Collector<O, S, P> {
    pub fn new(
        cfg: CollectorConfig,
        oracle: Arc<O>,
        store: Arc<S>,
        portfolio: Arc<P>,
    ) -> Arc<Self> {
        let shared = Arc::new(Mutex::new(SharedMarket::new(cfg.threshold.base_usd)));
        let gate = Mutex::new(AlertWindowGate::new(cfg.gate.clone()));
        let validation = ValidationEngine::new(cfg.validation);

        Arc::new(Self {
            cfg,
            shared,
            gate,
            validation,
            oracle,
            store,
            portfolio,
            in_flight: Mutex::new(()),
        })
    }

    /// Handle to the shared market state, for wiring the ingest task.
    pub fn shared(&self) -> Arc<Mutex<SharedMarket>> {
        Arc::clone(&self.shared)
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.cfg
    }

    /// Run one analysis cycle at `now_ms`.
    pub async fn run_cycle(&self, now_ms: u64) -> Result<CycleOutcome, CycleError> {
        // At most one in-flight analysis per collector.
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!(instrument = %self.cfg.instrument, "analysis in progress, skipping cycle");
            return Ok(CycleOutcome::Skipped(SkipReason::AnalysisInProgress));
        };

        let trace_id = TraceId::default();
        let span = cycle_span(&self.cfg.instrument, &trace_id);

        self.run_cycle_inner(now_ms).instrument(span).await
    }

    async fn run_cycle_inner(&self, now_ms: u64) -> Result<CycleOutcome, CycleError> {
        let Some(bundle) = self.assemble_bundle(now_ms).await else {
            debug!(instrument = %self.cfg.instrument, "no market data yet, skipping cycle");
            return Ok(CycleOutcome::Skipped(SkipReason::NoMarketData));
        };

        let response = match tokio::time::timeout(
            Duration::from_millis(self.cfg.oracle_timeout_ms),
            self.oracle.evaluate(&bundle),
        )
        .await
        {
            Err(_) => {
                // The in-flight request is abandoned with the future.
                return Err(CycleError::OracleTimeout {
                    secs: self.cfg.oracle_timeout_ms / 1000,
                });
            }
            Ok(Err(e)) => return Err(CycleError::Oracle(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let latency_ms = crate::config::now_ms().saturating_sub(now_ms);
        let call_record = OracleCallRecord {
            instrument: self.cfg.instrument.clone(),
            requested_at_ms: now_ms,
            latency_ms,
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            cost_usd: response.cost_usd,
            decision: response.verdict.decision_label(),
            raw_output: response.raw_output.clone(),
        };
        if let Err(e) = self.store.record_oracle_call(&call_record).await {
            warn!(error = %e, "failed to persist oracle call record");
        }

        if response.verdict.is_no_alert() {
            // Analyzed but uninteresting: this data does not need to
            // survive for the next cycle.
            let mut shared = self.shared.lock().await;
            shared.state.prune(now_ms, RETENTION_FLOOR_MS);

            info!(instrument = %self.cfg.instrument, "cycle complete, no alert");
            return Ok(CycleOutcome::Completed {
                accepted: 0,
                updated: 0,
                rejected: 0,
            });
        }

        let candidates = response.verdict.into_candidates();
        let portfolio = bundle.portfolio;

        let mut accepted = 0;
        let mut updated = 0;
        let mut rejected = 0;

        for candidate in candidates {
            match self.gate_and_validate(&candidate, &portfolio, now_ms).await {
                CandidateOutcome::Accepted => accepted += 1,
                CandidateOutcome::Updated => updated += 1,
                CandidateOutcome::Rejected => rejected += 1,
            }
        }

        info!(
            instrument = %self.cfg.instrument,
            accepted, updated, rejected,
            "cycle complete"
        );

        Ok(CycleOutcome::Completed {
            accepted,
            updated,
            rejected,
        })
    }

    /// Snapshot the buffers and build the oracle bundle.
    ///
    /// Returns None when nothing has been ingested yet.
    async fn assemble_bundle(&self, now_ms: u64) -> Option<AnalysisBundle> {
        let portfolio = match self.portfolio.snapshot(&self.cfg.instrument).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Degraded but not fatal: validate against no exposure.
                warn!(error = %e, "portfolio snapshot unavailable");
                PortfolioSnapshot::default()
            }
        };

        let mut shared = self.shared.lock().await;

        if !shared.state.has_data() {
            return None;
        }

        // Bound memory before any window math.
        shared.state.prune(now_ms, RETENTION_CEILING_MS);

        let snapshot_10m = compute_snapshot(&shared.state, WINDOW_10M_MS, now_ms);
        let snapshot_1h = compute_snapshot(&shared.state, WINDOW_1H_MS, now_ms);
        let snapshot_4h = compute_snapshot(&shared.state, WINDOW_4H_MS, now_ms);

        // "Large" follows the last hour's realized volatility.
        let effective = effective_whale_threshold(&self.cfg.threshold, snapshot_1h.volatility_pct);
        shared.effective_threshold = effective;

        let whale_flow = summarize_whale_flow(&shared.state);

        Some(AnalysisBundle {
            instrument: self.cfg.instrument.clone(),
            market: MarketContext {
                last_price: shared.state.last_price,
                mark_price: shared.state.mark_price,
            },
            snapshot_10m,
            snapshot_1h,
            snapshot_4h,
            recent_flushes: shared.state.flushes.iter().cloned().collect(),
            recent_bursts: shared.state.bursts.iter().cloned().collect(),
            recent_absorptions: shared.state.absorptions.iter().cloned().collect(),
            whale_flow,
            portfolio,
            effective_whale_threshold: effective,
            thresholds: self.cfg.threshold,
        })
    }

    /// One candidate through the gate and the validation engine.
    ///
    /// Every path persists a record: accepted alerts as Active, failures
    /// as Inert with the reason in the notes. The gate counter only moves
    /// on an actual emission.
    async fn gate_and_validate(
        &self,
        candidate: &AlertCandidate,
        portfolio: &PortfolioSnapshot,
        now_ms: u64,
    ) -> CandidateOutcome {
        let decision = {
            let mut gate = self.gate.lock().await;
            gate.check_window(&candidate.instrument, candidate.kind, now_ms)
        };

        let start = window_start(now_ms, self.cfg.gate.window_size_ms);

        match decision {
            GateDecision::Emit => {
                let id = AlertId::new_v4();
                let mut record = AlertRecord::from_candidate(candidate, id, now_ms, start);

                let outcome = self.validate(candidate, portfolio, now_ms).await;
                if outcome.is_accepted() {
                    let mut gate = self.gate.lock().await;
                    gate.record_emission(&candidate.instrument, candidate.kind, id, now_ms);
                } else {
                    record.demote(&outcome.to_string());
                }

                self.persist(&record, false).await;
                if record.status == AlertStatus::Active {
                    CandidateOutcome::Accepted
                } else {
                    CandidateOutcome::Rejected
                }
            }

            GateDecision::UpdateInPlace(id) => {
                let outcome = self.validate(candidate, portfolio, now_ms).await;

                if outcome.is_accepted() {
                    let record = AlertRecord::from_candidate(candidate, id, now_ms, start);
                    self.persist(&record, true).await;
                    CandidateOutcome::Updated
                } else {
                    // The previously accepted alert stays untouched; the
                    // rejected candidate gets its own trace record.
                    let mut record =
                        AlertRecord::from_candidate(candidate, AlertId::new_v4(), now_ms, start);
                    record.demote(&outcome.to_string());
                    self.persist(&record, false).await;
                    CandidateOutcome::Rejected
                }
            }

            GateDecision::Reject { reason } => {
                // Still traced, never dropped silently.
                let id = AlertId::new_v4();
                let mut record = AlertRecord::from_candidate(candidate, id, now_ms, start);
                record.demote(&reason);

                self.persist(&record, false).await;
                CandidateOutcome::Rejected
            }
        }
    }

    async fn validate(
        &self,
        candidate: &AlertCandidate,
        portfolio: &PortfolioSnapshot,
        now_ms: u64,
    ) -> alerts::validation::ValidationOutcome {
        let ctx = ValidationContext {
            now_ms,
            last_accepted_at_ms: self.last_accepted_at(candidate, now_ms).await,
            open_position: portfolio.exposure(),
            current_price: self.shared.lock().await.state.last_price,
        };

        self.validation.validate(candidate, &ctx)
    }

    /// Most recent accepted alert of this kind within the cooldown
    /// horizon. Store outages degrade to "no cooldown" rather than
    /// blocking the cycle.
    async fn last_accepted_at(&self, candidate: &AlertCandidate, now_ms: u64) -> Option<u64> {
        let since = now_ms.saturating_sub(self.cfg.validation.cooldown_ms);

        match self
            .store
            .recent_alerts(&candidate.instrument, candidate.kind, since)
            .await
        {
            Ok(records) => records
                .iter()
                .filter(|r| r.status == AlertStatus::Active)
                .map(|r| r.created_at_ms)
                .max(),
            Err(e) => {
                warn!(error = %e, "recent-alert lookup failed, skipping cooldown check");
                None
            }
        }
    }

    /// Fire-and-forget persistence; the in-memory gate stays the source
    /// of truth for rate limiting when the store is down.
    async fn persist(&self, record: &AlertRecord, update: bool) {
        let result = if update {
            self.store.update_alert(record).await
        } else {
            self.store.insert_alert(record).await
        };

        if let Err(e) = result {
            warn!(
                alert_id = %record.id,
                error = %e,
                "alert persistence failed (gate state remains authoritative)"
            );
        }
    }

    /// Convenience runner: trigger a cycle every `cadence_ms`.
    ///
    /// Cycle errors are logged and absorbed; the next tick is the retry.
    pub async fn run_periodic(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.cfg.cadence_ms));
        ticker.tick().await; // immediate first tick

        loop {
            ticker.tick().await;

            match self.run_cycle(crate::config::now_ms()).await {
                Ok(CycleOutcome::Completed { .. }) => {}
                Ok(CycleOutcome::Skipped(reason)) => {
                    debug!(?reason, "cycle skipped");
                }
                Err(e) => {
                    warn!(error = %e, "cycle failed");
                }
            }
        }
    }
}

enum CandidateOutcome {
    Accepted,
    Updated,
    Rejected,
}

fn summarize_whale_flow(state: &MarketState) -> WhaleFlowSummary {
    let mut buy = 0.0;
    let mut sell = 0.0;

    for whale in state.whales.iter() {
        match whale.side {
            Side::Buy => buy += whale.notional,
            Side::Sell => sell += whale.notional,
        }
    }

    let net = buy - sell;
    let dominant = if net > 0.0 {
        Some(Direction::Long)
    } else if net < 0.0 {
        Some(Direction::Short)
    } else {
        None
    };

    WhaleFlowSummary {
        buy_notional_usd: buy,
        sell_notional_usd: sell,
        net_usd: net,
        dominant,
    }
}
