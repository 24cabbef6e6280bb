use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use alerts::model::{AlertKind, AlertRecord};
use alerts::store::{AlertStore, OracleCallRecord};
use collector::types::{
    AnalysisBundle, DecisionOracle, OracleResponse, OracleVerdict, PortfolioReader,
    PortfolioSnapshot,
};

/// Oracle returning a fixed verdict, optionally after a delay.
pub struct MockOracle {
    pub verdict: OracleVerdict,
    pub delay_ms: u64,
}

impl MockOracle {
    pub fn returning(verdict: OracleVerdict) -> Self {
        Self {
            verdict,
            delay_ms: 0,
        }
    }

    pub fn slow(verdict: OracleVerdict, delay_ms: u64) -> Self {
        Self { verdict, delay_ms }
    }
}

#[async_trait]
impl DecisionOracle for MockOracle {
    async fn evaluate(&self, _bundle: &AnalysisBundle) -> anyhow::Result<OracleResponse> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        Ok(OracleResponse {
            verdict: self.verdict.clone(),
            prompt_tokens: 11_000,
            completion_tokens: 420,
            cost_usd: 0.08,
            raw_output: "{}".into(),
        })
    }
}

/// Oracle that always fails.
pub struct BrokenOracle;

#[async_trait]
impl DecisionOracle for BrokenOracle {
    async fn evaluate(&self, _bundle: &AnalysisBundle) -> anyhow::Result<OracleResponse> {
        anyhow::bail!("upstream unavailable")
    }
}

/// In-memory alert store; can be flipped into a failing mode to exercise
/// the fire-and-forget persistence path.
#[derive(Default)]
pub struct InMemoryAlertStore {
    pub alerts: Arc<Mutex<Vec<AlertRecord>>>,
    pub calls: Arc<Mutex<Vec<OracleCallRecord>>>,
    pub failing: AtomicBool,
}

impl InMemoryAlertStore {
    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("store offline");
        }
        Ok(())
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn insert_alert(&self, record: &AlertRecord) -> anyhow::Result<()> {
        self.check()?;
        self.alerts.lock().await.push(record.clone());
        Ok(())
    }

    async fn update_alert(&self, record: &AlertRecord) -> anyhow::Result<()> {
        self.check()?;
        let mut alerts = self.alerts.lock().await;
        if let Some(existing) = alerts.iter_mut().find(|r| r.id == record.id) {
            *existing = record.clone();
        } else {
            alerts.push(record.clone());
        }
        Ok(())
    }

    async fn recent_alerts(
        &self,
        instrument: &str,
        kind: AlertKind,
        since_ms: u64,
    ) -> anyhow::Result<Vec<AlertRecord>> {
        self.check()?;
        let mut matching: Vec<AlertRecord> = self
            .alerts
            .lock()
            .await
            .iter()
            .filter(|r| {
                r.instrument == instrument && r.kind == kind && r.created_at_ms >= since_ms
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        Ok(matching)
    }

    async fn record_oracle_call(&self, record: &OracleCallRecord) -> anyhow::Result<()> {
        self.check()?;
        self.calls.lock().await.push(record.clone());
        Ok(())
    }
}

/// Portfolio reader with a fixed snapshot.
pub struct StaticPortfolio {
    pub snapshot: PortfolioSnapshot,
}

impl StaticPortfolio {
    pub fn flat() -> Self {
        Self {
            snapshot: PortfolioSnapshot::default(),
        }
    }
}

#[async_trait]
impl PortfolioReader for StaticPortfolio {
    async fn snapshot(&self, _instrument: &str) -> anyhow::Result<PortfolioSnapshot> {
        Ok(self.snapshot)
    }
}
