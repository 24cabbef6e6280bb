//! SQLiteAlertStore
//! --------------------
//! SQLite-backed implementation of the `AlertStore` trait. Keeps the
//! durable record of emitted / updated / demoted alerts and of every
//! oracle invocation so that:
//!
//!  - the alert history survives restarts
//!  - demoted candidates keep their decision trace
//!  - oracle spend (tokens, latency, cost) is auditable
//!  - the collector itself stays purely in-memory for rate limiting
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{AlertStore, OracleCallRecord};
use crate::model::{AlertKind, AlertRecord, AlertStatus};
use market::types::Direction;

/// SQLite-based persistence backend for alerts.
///
/// Provides:
///   - schema creation on startup
///   - insert / upsert of alert records
///   - recent-alert lookup per (instrument, kind)
///   - append-only oracle call log
pub struct SqliteAlertStore {
    pool: SqlitePool,
}

impl SqliteAlertStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new SQLite-backed store and ensure schema exists.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = SqlitePool::connect(path).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                instrument TEXT NOT NULL,
                kind TEXT NOT NULL,
                status TEXT NOT NULL,

                confidence REAL NOT NULL,
                direction TEXT,
                setup TEXT,
                thesis TEXT,
                pattern_json TEXT,
                execution_json TEXT,

                notes TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                window_start_ms INTEGER NOT NULL,
                expires_at_ms INTEGER
            );
        "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS oracle_calls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                instrument TEXT NOT NULL,
                requested_at_ms INTEGER NOT NULL,
                latency_ms INTEGER NOT NULL,
                prompt_tokens INTEGER NOT NULL,
                completion_tokens INTEGER NOT NULL,
                cost_usd REAL NOT NULL,
                decision TEXT NOT NULL,
                raw_output TEXT NOT NULL
            );
        "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Upsert one alert row.
    ///
    /// - New alert → inserted
    /// - Existing alert (in-place update, demotion) → updated
    async fn save(&self, record: &AlertRecord) -> anyhow::Result<()> {
        let pattern_json = record
            .pattern
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let execution_json = record
            .execution
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, instrument, kind, status,
                confidence, direction, setup, thesis,
                pattern_json, execution_json,
                notes, created_at_ms, window_start_ms, expires_at_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                instrument = excluded.instrument,
                kind = excluded.kind,
                status = excluded.status,
                confidence = excluded.confidence,
                direction = excluded.direction,
                setup = excluded.setup,
                thesis = excluded.thesis,
                pattern_json = excluded.pattern_json,
                execution_json = excluded.execution_json,
                notes = excluded.notes,
                created_at_ms = excluded.created_at_ms,
                window_start_ms = excluded.window_start_ms,
                expires_at_ms = excluded.expires_at_ms;
        "#,
        )
        .bind(record.id.to_string())
        .bind(&record.instrument)
        .bind(record.kind.to_string())
        .bind(record.status.to_string())
        .bind(record.confidence)
        .bind(record.direction.map(|d| d.to_string()))
        .bind(&record.setup)
        .bind(&record.thesis)
        .bind(pattern_json)
        .bind(execution_json)
        .bind(&record.notes)
        .bind(record.created_at_ms as i64)
        .bind(record.window_start_ms as i64)
        .bind(record.expires_at_ms.map(|v| v as i64))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<AlertRecord> {
        let id_str: String = row.get("id");
        let id = uuid::Uuid::parse_str(&id_str)?;

        let kind_str: String = row.get("kind");
        let kind = AlertKind::from_str(&kind_str)
            .map_err(|e| anyhow::anyhow!("Invalid alert kind '{}': {}", kind_str, e))?;

        let status_str: String = row.get("status");
        let status = AlertStatus::from_str(&status_str)
            .map_err(|e| anyhow::anyhow!("Invalid alert status '{}': {}", status_str, e))?;

        let direction = row
            .get::<Option<String>, _>("direction")
            .map(|s| Direction::from_str(&s))
            .transpose()?;

        let pattern = row
            .get::<Option<String>, _>("pattern_json")
            .map(|s| serde_json::from_str(&s))
            .transpose()?;
        let execution = row
            .get::<Option<String>, _>("execution_json")
            .map(|s| serde_json::from_str(&s))
            .transpose()?;

        Ok(AlertRecord {
            id,
            instrument: row.get("instrument"),
            kind,
            status,
            confidence: row.get("confidence"),
            direction,
            setup: row.get("setup"),
            thesis: row.get("thesis"),
            pattern,
            execution,
            notes: row.get("notes"),
            created_at_ms: row.get::<i64, _>("created_at_ms") as u64,
            window_start_ms: row.get::<i64, _>("window_start_ms") as u64,
            expires_at_ms: row.get::<Option<i64>, _>("expires_at_ms").map(|v| v as u64),
        })
    }
}

#[async_trait]
impl AlertStore for SqliteAlertStore {
    async fn insert_alert(&self, record: &AlertRecord) -> anyhow::Result<()> {
        self.save(record).await
    }

    async fn update_alert(&self, record: &AlertRecord) -> anyhow::Result<()> {
        self.save(record).await
    }

    async fn recent_alerts(
        &self,
        instrument: &str,
        kind: AlertKind,
        since_ms: u64,
    ) -> anyhow::Result<Vec<AlertRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM alerts
            WHERE instrument = ? AND kind = ? AND created_at_ms >= ?
            ORDER BY created_at_ms DESC
        "#,
        )
        .bind(instrument)
        .bind(kind.to_string())
        .bind(since_ms as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(Self::row_to_record(row)?);
        }

        Ok(records)
    }

    async fn record_oracle_call(&self, record: &OracleCallRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oracle_calls (
                instrument, requested_at_ms, latency_ms,
                prompt_tokens, completion_tokens, cost_usd,
                decision, raw_output
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&record.instrument)
        .bind(record.requested_at_ms as i64)
        .bind(record.latency_ms as i64)
        .bind(record.prompt_tokens as i64)
        .bind(record.completion_tokens as i64)
        .bind(record.cost_usd)
        .bind(&record.decision)
        .bind(&record.raw_output)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
