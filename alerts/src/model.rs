//! Alert data model.
//!
//! Candidates are produced by the external decision oracle; this core
//! consumes them, gates them, and persists the outcome. A rejected
//! candidate is never dropped silently: it is demoted to `Inert` with the
//! rejection reason appended to its notes, so a decision trace always
//! exists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use market::types::Direction;

pub type AlertId = uuid::Uuid;

/// Kind of alert, each with its own window-gate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    /// Informational risk alert.
    Risk,
    /// Actionable trade alert.
    Trade,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Risk => f.write_str("RISK_ALERT"),
            AlertKind::Trade => f.write_str("TRADE_ALERT"),
        }
    }
}

impl FromStr for AlertKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RISK_ALERT" => Ok(AlertKind::Risk),
            "TRADE_ALERT" => Ok(AlertKind::Trade),
            other => Err(anyhow::anyhow!("Invalid AlertKind value: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Active,
    /// Demoted by validation; kept for the decision trace.
    Inert,
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Active => f.write_str("Active"),
            AlertStatus::Inert => f.write_str("Inert"),
        }
    }
}

impl FromStr for AlertStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(AlertStatus::Active),
            "Inert" => Ok(AlertStatus::Inert),
            other => Err(anyhow::anyhow!("Invalid AlertStatus value: {}", other)),
        }
    }
}

/// Execution payload attached to an actionable candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Preferred entry price, when the oracle names one.
    pub entry_ideal: Option<f64>,
    /// Acceptable entry zone (low, high); midpoint is the entry fallback.
    pub entry_zone: Option<(f64, f64)>,
    pub stop_loss: Option<f64>,
    /// Take-profit targets, nearest first.
    pub targets: Vec<f64>,
}

impl ExecutionPlan {
    /// Entry price for risk math: ideal, else zone midpoint.
    /// The caller may still fall back to the current market price.
    pub fn entry_price(&self) -> Option<f64> {
        self.entry_ideal
            .or_else(|| self.entry_zone.map(|(low, high)| (low + high) / 2.0))
    }
}

/// A proposed alert as returned by the decision oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub instrument: String,
    pub kind: AlertKind,
    pub confidence: f64,
    pub direction: Option<Direction>,
    /// Short setup name, e.g. "flush_reclaim_long".
    pub setup: Option<String>,
    pub thesis: Option<String>,
    /// Free-form supporting pattern payload.
    pub pattern: Option<serde_json::Value>,
    pub execution: Option<ExecutionPlan>,
    pub expires_at_ms: Option<u64>,
}

/// Persisted form of a gated candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: AlertId,
    pub instrument: String,
    pub kind: AlertKind,
    pub status: AlertStatus,
    pub confidence: f64,
    pub direction: Option<Direction>,
    pub setup: Option<String>,
    pub thesis: Option<String>,
    pub pattern: Option<serde_json::Value>,
    pub execution: Option<ExecutionPlan>,
    /// Decision trace: validation reasons accumulate here.
    pub notes: String,
    pub created_at_ms: u64,
    pub window_start_ms: u64,
    pub expires_at_ms: Option<u64>,
}

impl AlertRecord {
    pub fn from_candidate(
        candidate: &AlertCandidate,
        id: AlertId,
        created_at_ms: u64,
        window_start_ms: u64,
    ) -> Self {
        Self {
            id,
            instrument: candidate.instrument.clone(),
            kind: candidate.kind,
            status: AlertStatus::Active,
            confidence: candidate.confidence,
            direction: candidate.direction,
            setup: candidate.setup.clone(),
            thesis: candidate.thesis.clone(),
            pattern: candidate.pattern.clone(),
            execution: candidate.execution.clone(),
            notes: String::new(),
            created_at_ms,
            window_start_ms,
            expires_at_ms: candidate.expires_at_ms,
        }
    }

    /// Demote to Inert, appending the reason to the trace.
    pub fn demote(&mut self, reason: &str) {
        self.status = AlertStatus::Inert;
        if !self.notes.is_empty() {
            self.notes.push_str("; ");
        }
        self.notes.push_str(reason);
    }
}
