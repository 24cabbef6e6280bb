pub mod sqlite_store;

use crate::model::{AlertKind, AlertRecord};

/// One decision-oracle invocation, persisted for cost accounting.
#[derive(Debug, Clone)]
pub struct OracleCallRecord {
    pub instrument: String,
    pub requested_at_ms: u64,
    pub latency_ms: u64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
    /// Decision string as returned, e.g. "ALERT" / "NO_ALERT".
    pub decision: String,
    pub raw_output: String,
}

/// Durable record store for alerts and oracle calls.
///
/// Writes are fire-and-forget from the collector's perspective: failures
/// are logged and ignored, and the in-memory window gate remains the
/// rate-limiting source of truth.
#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(&self, record: &AlertRecord) -> anyhow::Result<()>;
    async fn update_alert(&self, record: &AlertRecord) -> anyhow::Result<()>;
    /// Alerts for (instrument, kind) created at or after `since_ms`,
    /// newest first.
    async fn recent_alerts(
        &self,
        instrument: &str,
        kind: AlertKind,
        since_ms: u64,
    ) -> anyhow::Result<Vec<AlertRecord>>;
    async fn record_oracle_call(&self, record: &OracleCallRecord) -> anyhow::Result<()>;
}
