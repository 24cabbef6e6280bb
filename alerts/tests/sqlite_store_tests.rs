use std::str::FromStr;

use alerts::model::{AlertCandidate, AlertId, AlertKind, AlertRecord, AlertStatus, ExecutionPlan};
use alerts::store::sqlite_store::SqliteAlertStore;
use alerts::store::{AlertStore, OracleCallRecord};
use market::types::Direction;

async fn memory_store() -> SqliteAlertStore {
    SqliteAlertStore::new("sqlite::memory:")
        .await
        .expect("in-memory sqlite")
}

fn sample_record(instrument: &str, created_at_ms: u64) -> AlertRecord {
    let candidate = AlertCandidate {
        instrument: instrument.into(),
        kind: AlertKind::Trade,
        confidence: 0.85,
        direction: Some(Direction::Long),
        setup: Some("flush_reclaim_long".into()),
        thesis: Some("flush absorbed and reclaimed".into()),
        pattern: Some(serde_json::json!({"flushes": 2, "reclaimed": true})),
        execution: Some(ExecutionPlan {
            entry_ideal: Some(100.0),
            entry_zone: None,
            stop_loss: Some(98.0),
            targets: vec![106.0, 112.0],
        }),
        expires_at_ms: Some(created_at_ms + 3_600_000),
    };

    AlertRecord::from_candidate(&candidate, AlertId::new_v4(), created_at_ms, 0)
}

#[tokio::test]
async fn insert_then_query_round_trips_all_fields() -> anyhow::Result<()> {
    let store = memory_store().await;

    let record = sample_record("BTC", 1_000);
    store.insert_alert(&record).await?;

    let loaded = store.recent_alerts("BTC", AlertKind::Trade, 0).await?;
    assert_eq!(loaded.len(), 1);

    let got = &loaded[0];
    assert_eq!(got.id, record.id);
    assert_eq!(got.status, AlertStatus::Active);
    assert_eq!(got.direction, Some(Direction::Long));
    assert_eq!(got.setup.as_deref(), Some("flush_reclaim_long"));
    assert_eq!(got.execution.as_ref().unwrap().targets, vec![106.0, 112.0]);
    assert_eq!(got.expires_at_ms, record.expires_at_ms);

    Ok(())
}

#[tokio::test]
async fn update_overwrites_in_place() -> anyhow::Result<()> {
    let store = memory_store().await;

    let mut record = sample_record("BTC", 1_000);
    store.insert_alert(&record).await?;

    record.demote("cooldown active, 180s remaining");
    store.update_alert(&record).await?;

    let loaded = store.recent_alerts("BTC", AlertKind::Trade, 0).await?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].status, AlertStatus::Inert);
    assert!(loaded[0].notes.contains("cooldown active"));

    Ok(())
}

#[tokio::test]
async fn recent_alerts_filters_by_instrument_kind_and_time() -> anyhow::Result<()> {
    let store = memory_store().await;

    store.insert_alert(&sample_record("BTC", 1_000)).await?;
    store.insert_alert(&sample_record("BTC", 5_000)).await?;
    store.insert_alert(&sample_record("ETH", 6_000)).await?;

    let mut risk = sample_record("BTC", 7_000);
    risk.kind = AlertKind::Risk;
    store.insert_alert(&risk).await?;

    let loaded = store.recent_alerts("BTC", AlertKind::Trade, 2_000).await?;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].created_at_ms, 5_000);

    // Boundary-inclusive on since_ms.
    let loaded = store.recent_alerts("BTC", AlertKind::Trade, 1_000).await?;
    assert_eq!(loaded.len(), 2);
    // Newest first.
    assert_eq!(loaded[0].created_at_ms, 5_000);

    Ok(())
}

#[tokio::test]
async fn alert_kind_strings_match_the_wire_names() {
    assert_eq!(AlertKind::Risk.to_string(), "RISK_ALERT");
    assert_eq!(AlertKind::from_str("TRADE_ALERT").unwrap(), AlertKind::Trade);
}

#[tokio::test]
async fn oracle_calls_are_append_only() -> anyhow::Result<()> {
    let store = memory_store().await;

    for i in 0..3 {
        store
            .record_oracle_call(&OracleCallRecord {
                instrument: "BTC".into(),
                requested_at_ms: 1_000 * i,
                latency_ms: 2_500,
                prompt_tokens: 12_000,
                completion_tokens: 800,
                cost_usd: 0.09,
                decision: "NO_ALERT".into(),
                raw_output: "{}".into(),
            })
            .await?;
    }

    // No read API for calls yet; success of all three inserts is the
    // contract under test.
    Ok(())
}
