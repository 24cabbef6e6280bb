//! Shared types and abstraction traits used by the collector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use alerts::model::AlertCandidate;
use market::threshold::ThresholdConfig;
use market::types::{ClassifiedEvent, Direction, TimeframeSnapshot};

/// Latest observed market prices for the instrument.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarketContext {
    pub last_price: Option<f64>,
    pub mark_price: Option<f64>,
}

/// Whale flow totals over the retained buffer, plus the dominant side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WhaleFlowSummary {
    pub buy_notional_usd: f64,
    pub sell_notional_usd: f64,
    pub net_usd: f64,
    pub dominant: Option<Direction>,
}

/// Risk/portfolio state at bundle-assembly time, as reported by the host.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Direction of an open position for the instrument, if any.
    pub open_position: Option<Direction>,
    /// Direction of a pending (unfilled) order, if any.
    pub pending_order: Option<Direction>,
}

impl PortfolioSnapshot {
    /// Direction that would conflict with an opposite-direction alert.
    pub fn exposure(&self) -> Option<Direction> {
        self.open_position.or(self.pending_order)
    }
}

/// Everything the decision oracle sees for one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisBundle {
    pub instrument: String,
    pub market: MarketContext,
    pub snapshot_10m: TimeframeSnapshot,
    pub snapshot_1h: TimeframeSnapshot,
    pub snapshot_4h: TimeframeSnapshot,
    pub recent_flushes: Vec<ClassifiedEvent>,
    pub recent_bursts: Vec<ClassifiedEvent>,
    pub recent_absorptions: Vec<ClassifiedEvent>,
    pub whale_flow: WhaleFlowSummary,
    pub portfolio: PortfolioSnapshot,
    pub effective_whale_threshold: f64,
    pub thresholds: ThresholdConfig,
}

/// V1 decision enum (single-alert contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Alert,
    NoAlert,
    NeedMoreData,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Alert => "ALERT",
            Decision::NoAlert => "NO_ALERT",
            Decision::NeedMoreData => "NEED_MORE_DATA",
        }
    }
}

#[derive(Debug, Clone)]
pub struct VerdictV1 {
    pub decision: Decision,
    pub confidence: f64,
    pub candidate: Option<AlertCandidate>,
}

#[derive(Debug, Clone)]
pub struct VerdictV2 {
    /// Multi-alert list: risk and trade alerts arrive separated.
    pub alerts: Vec<AlertCandidate>,
}

/// Versioned verdict contract.
///
/// Both versions normalize into one candidate list so the gate and
/// validation path is shared rather than duplicated per version.
#[derive(Debug, Clone)]
pub enum OracleVerdict {
    V1(VerdictV1),
    V2(VerdictV2),
}

impl OracleVerdict {
    pub fn into_candidates(self) -> Vec<AlertCandidate> {
        match self {
            OracleVerdict::V1(v) => match v.decision {
                Decision::Alert => v.candidate.into_iter().collect(),
                Decision::NoAlert | Decision::NeedMoreData => Vec::new(),
            },
            OracleVerdict::V2(v) => v.alerts,
        }
    }

    /// Short label for the oracle call record.
    pub fn decision_label(&self) -> String {
        match self {
            OracleVerdict::V1(v) => v.decision.label().to_string(),
            OracleVerdict::V2(v) => format!("MULTI_ALERT({})", v.alerts.len()),
        }
    }

    pub fn is_no_alert(&self) -> bool {
        match self {
            OracleVerdict::V1(v) => v.decision != Decision::Alert,
            OracleVerdict::V2(v) => v.alerts.is_empty(),
        }
    }
}

/// Verdict plus accounting for the persisted call record.
#[derive(Debug, Clone)]
pub struct OracleResponse {
    pub verdict: OracleVerdict,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
    pub raw_output: String,
}

/// The external decision process, opaque to this core.
#[async_trait]
pub trait DecisionOracle: Send + Sync + 'static {
    async fn evaluate(&self, bundle: &AnalysisBundle) -> anyhow::Result<OracleResponse>;
}

/// Read-only view of the host's risk/portfolio state.
#[async_trait]
pub trait PortfolioReader: Send + Sync + 'static {
    async fn snapshot(&self, instrument: &str) -> anyhow::Result<PortfolioSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerts::model::AlertKind;

    fn candidate(kind: AlertKind) -> AlertCandidate {
        AlertCandidate {
            instrument: "BTC".into(),
            kind,
            confidence: 0.9,
            direction: None,
            setup: None,
            thesis: None,
            pattern: None,
            execution: None,
            expires_at_ms: None,
        }
    }

    #[test]
    fn v1_no_alert_normalizes_to_nothing() {
        let verdict = OracleVerdict::V1(VerdictV1 {
            decision: Decision::NoAlert,
            confidence: 0.4,
            candidate: Some(candidate(AlertKind::Trade)),
        });

        assert!(verdict.is_no_alert());
        assert!(verdict.into_candidates().is_empty());
    }

    #[test]
    fn v1_alert_yields_its_candidate() {
        let verdict = OracleVerdict::V1(VerdictV1 {
            decision: Decision::Alert,
            confidence: 0.9,
            candidate: Some(candidate(AlertKind::Trade)),
        });

        assert_eq!(verdict.into_candidates().len(), 1);
    }

    #[test]
    fn v2_passes_all_alerts_through() {
        let verdict = OracleVerdict::V2(VerdictV2 {
            alerts: vec![candidate(AlertKind::Risk), candidate(AlertKind::Trade)],
        });

        assert!(!verdict.is_no_alert());
        assert_eq!(verdict.decision_label(), "MULTI_ALERT(2)");
        assert_eq!(verdict.into_candidates().len(), 2);
    }

    #[test]
    fn exposure_prefers_open_position() {
        let snapshot = PortfolioSnapshot {
            open_position: Some(Direction::Long),
            pending_order: Some(Direction::Short),
        };
        assert_eq!(snapshot.exposure(), Some(Direction::Long));

        let pending_only = PortfolioSnapshot {
            open_position: None,
            pending_order: Some(Direction::Short),
        };
        assert_eq!(pending_only.exposure(), Some(Direction::Short));
    }
}
