//! Validation Engine
//!
//! Deterministic business rules applied to a candidate after the window
//! gate grants emission. Checks run in a fixed order and short-circuit on
//! the first failure:
//!
//!   confidence → cooldown → conflicting position → risk/reward
//!
//! The order matters for diagnostics, not correctness. A rejection is a
//! normal control-flow outcome, never an error: the caller demotes the
//! candidate with the reason string and still records the trace.
//
//  This module is deliberately pure: no async, no IO.

use std::fmt;

use market::types::Direction;

use crate::model::{AlertCandidate, AlertKind};

#[derive(Debug, Clone, Copy)]
pub struct ValidationConfig {
    /// Confidence floor for informational risk alerts.
    pub risk_confidence_floor: f64,
    /// Confidence floor for actionable trade alerts.
    pub trade_confidence_floor: f64,
    /// Minimum spacing between accepted alerts of the same kind per
    /// instrument.
    pub cooldown_ms: u64,
    /// Minimum stop distance from entry, percent.
    pub min_stop_distance_pct: f64,
    pub min_risk_reward: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            risk_confidence_floor: 0.80,
            trade_confidence_floor: 0.80,
            cooldown_ms: 5 * 60 * 1000,
            min_stop_distance_pct: 1.0,
            min_risk_reward: 1.5,
        }
    }
}

impl ValidationConfig {
    fn confidence_floor(&self, kind: AlertKind) -> f64 {
        match kind {
            AlertKind::Risk => self.risk_confidence_floor,
            AlertKind::Trade => self.trade_confidence_floor,
        }
    }
}

/// Everything the checks need from the outside world, resolved by the
/// caller so this engine stays pure.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationContext {
    pub now_ms: u64,
    /// When an alert of the same kind was last accepted for the
    /// instrument, if ever.
    pub last_accepted_at_ms: Option<u64>,
    /// Direction of an open position or pending order, if any.
    pub open_position: Option<Direction>,
    /// Last traded price; entry fallback of last resort.
    pub current_price: Option<f64>,
}

/// Result of a validation check.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Accepted,
    LowConfidence { confidence: f64, floor: f64 },
    CooldownActive { remaining_secs: u64 },
    ConflictingPosition { open: Direction },
    StopTooTight { risk_pct: f64 },
    PoorRiskReward { ratio: f64 },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Accepted => f.write_str("accepted"),
            ValidationOutcome::LowConfidence { confidence, floor } => {
                write!(f, "confidence {confidence:.2} below floor {floor:.2}")
            }
            ValidationOutcome::CooldownActive { remaining_secs } => {
                write!(f, "cooldown active, {remaining_secs}s remaining")
            }
            ValidationOutcome::ConflictingPosition { open } => {
                write!(f, "conflicting open position ({open})")
            }
            ValidationOutcome::StopTooTight { risk_pct } => {
                write!(f, "stop too tight: {risk_pct:.2}% from entry")
            }
            ValidationOutcome::PoorRiskReward { ratio } => {
                write!(f, "risk/reward {ratio:.2} below minimum")
            }
        }
    }
}

pub struct ValidationEngine {
    cfg: ValidationConfig,
}

impl ValidationEngine {
    pub fn new(cfg: ValidationConfig) -> Self {
        Self { cfg }
    }

    /// Run all checks in order, stopping at the first failure.
    pub fn validate(
        &self,
        candidate: &AlertCandidate,
        ctx: &ValidationContext,
    ) -> ValidationOutcome {
        let floor = self.cfg.confidence_floor(candidate.kind);
        if candidate.confidence < floor {
            return ValidationOutcome::LowConfidence {
                confidence: candidate.confidence,
                floor,
            };
        }

        if let Some(last) = ctx.last_accepted_at_ms {
            let elapsed = ctx.now_ms.saturating_sub(last);
            if elapsed < self.cfg.cooldown_ms {
                return ValidationOutcome::CooldownActive {
                    remaining_secs: (self.cfg.cooldown_ms - elapsed) / 1000,
                };
            }
        }

        if let (Some(direction), Some(open)) = (candidate.direction, ctx.open_position)
            && direction != open
        {
            return ValidationOutcome::ConflictingPosition { open };
        }

        self.check_risk_reward(candidate, ctx)
    }

    /// Stop distance and risk/reward floors.
    ///
    /// Entry resolution order: ideal entry, entry-zone midpoint, current
    /// price. Multiple targets use the first (nearest) one. Missing stop
    /// or target data skips the check: it cannot be validated, so it
    /// does not block.
    fn check_risk_reward(
        &self,
        candidate: &AlertCandidate,
        ctx: &ValidationContext,
    ) -> ValidationOutcome {
        let Some(execution) = &candidate.execution else {
            return ValidationOutcome::Accepted;
        };

        let Some(entry) = execution.entry_price().or(ctx.current_price) else {
            return ValidationOutcome::Accepted;
        };
        let (Some(stop), Some(&target)) = (execution.stop_loss, execution.targets.first())
        else {
            return ValidationOutcome::Accepted;
        };

        if entry <= 0.0 {
            return ValidationOutcome::Accepted;
        }

        // Direction-aware sign handling: a stop on the wrong side of the
        // entry produces a non-positive risk and fails the floor.
        let (risk_pct, reward_pct) = match candidate.direction {
            Some(Direction::Long) | None => (
                (entry - stop) / entry * 100.0,
                (target - entry) / entry * 100.0,
            ),
            Some(Direction::Short) => (
                (stop - entry) / entry * 100.0,
                (entry - target) / entry * 100.0,
            ),
        };

        if risk_pct < self.cfg.min_stop_distance_pct {
            return ValidationOutcome::StopTooTight { risk_pct };
        }

        let ratio = reward_pct / risk_pct;
        if ratio < self.cfg.min_risk_reward {
            return ValidationOutcome::PoorRiskReward { ratio };
        }

        ValidationOutcome::Accepted
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}
