//! Integration tests for `SqliteWarehouse` against an in-memory database.

use chrono::{Duration, NaiveDate, Utc};
use ridings_core::{
  audit::{ExtractionStatus, Outcome, ERROR_MESSAGE_MAX},
  geo::GeoLookupRow,
  indicator::{IndicatorKey, IndicatorRecord},
  store::Warehouse,
};

use crate::SqliteWarehouse;

async fn store() -> SqliteWarehouse {
  SqliteWarehouse::open_in_memory()
    .await
    .expect("in-memory warehouse")
}

fn april() -> NaiveDate {
  NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
}

fn record(lad_code: &str, lad_name: &str, value: Option<f64>) -> IndicatorRecord {
  IndicatorRecord {
    indicator_id:     "claimant_rate".into(),
    indicator_name:   "Claimant count rate".into(),
    lad_code:         lad_code.into(),
    lad_name:         lad_name.into(),
    reference_period: april(),
    value,
    unit:             Some("rate".into()),
    source:           Some("dwp".into()),
    dataset_code:     Some("ucjsa".into()),
  }
}

fn key(lad_code: &str) -> IndicatorKey {
  IndicatorKey {
    indicator_id:     "claimant_rate".into(),
    lad_code:         lad_code.into(),
    reference_period: april(),
  }
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_inserts_and_finds_by_key() {
  let s = store().await;

  let written = s
    .upsert_indicators(vec![record("E08000035", "Leeds", Some(3.1))], "ucjsa")
    .await
    .unwrap();
  assert_eq!(written, 1);

  let row = s.find_indicator(&key("E08000035")).await.unwrap().unwrap();
  assert_eq!(row.lad_name, "Leeds");
  assert_eq!(row.value, Some(3.1));
  assert_eq!(row.created_at, row.updated_at);
}

#[tokio::test]
async fn upsert_overwrites_on_key_match_and_keeps_created_at() {
  let s = store().await;

  s.upsert_indicators(vec![record("E08000035", "Leeds", Some(3.1))], "ucjsa")
    .await
    .unwrap();
  let first = s.find_indicator(&key("E08000035")).await.unwrap().unwrap();

  s.upsert_indicators(vec![record("E08000035", "Leeds", Some(2.8))], "ucjsa")
    .await
    .unwrap();
  let second = s.find_indicator(&key("E08000035")).await.unwrap().unwrap();

  assert_eq!(second.value, Some(2.8));
  assert_eq!(second.created_at, first.created_at);
  assert!(second.updated_at >= first.updated_at);
  // Same physical row, not a new one.
  assert_eq!(second.id, first.id);
}

#[tokio::test]
async fn upsert_is_idempotent() {
  let s = store().await;
  let batch = vec![
    record("E08000035", "Leeds", Some(3.1)),
    record("E08000032", "Bradford", None),
  ];

  s.upsert_indicators(batch.clone(), "ucjsa").await.unwrap();
  s.upsert_indicators(batch, "ucjsa").await.unwrap();

  let rows = s.list_indicators("claimant_rate", None).await.unwrap();
  assert_eq!(rows.len(), 2);
  // Suppressed value survives the re-run as a genuine null.
  let bradford = rows.iter().find(|r| r.lad_code == "E08000032").unwrap();
  assert_eq!(bradford.value, None);
}

#[tokio::test]
async fn in_batch_duplicates_collapse_last_wins() {
  let s = store().await;
  let batch = vec![
    record("E08000035", "Leeds", Some(1.0)),
    record("E08000035", "Leeds", Some(2.0)),
    record("E08000035", "Leeds", Some(3.0)),
  ];

  let written = s.upsert_indicators(batch, "ucjsa").await.unwrap();
  assert_eq!(written, 1);

  let row = s.find_indicator(&key("E08000035")).await.unwrap().unwrap();
  assert_eq!(row.value, Some(3.0));
}

#[tokio::test]
async fn invalid_record_fails_before_any_write() {
  let s = store().await;
  let batch = vec![
    record("E08000035", "Leeds", Some(1.0)),
    record("", "Nowhere", Some(2.0)), // empty lad_code
  ];

  let err = s.upsert_indicators(batch, "ucjsa").await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(ridings_core::Error::InvalidRecord { field: "lad_code" })
  ));

  // Validate-then-write: the valid record must not have landed either.
  assert!(s.find_indicator(&key("E08000035")).await.unwrap().is_none());
}

#[tokio::test]
async fn find_missing_key_returns_none() {
  let s = store().await;
  assert!(s.find_indicator(&key("E08000035")).await.unwrap().is_none());
}

// ─── Extraction audit ────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_lifecycle_happy_path() {
  let s = store().await;

  let id = s
    .create_audit("ucjsa", "dwp", Some("run-123".into()))
    .await
    .unwrap();

  let created = s.get_audit(id).await.unwrap().unwrap();
  assert_eq!(created.extraction_status, ExtractionStatus::Pending);
  assert_eq!(created.flow_run_id.as_deref(), Some("run-123"));
  assert!(created.rows_loaded.is_none());

  s.mark_running(id).await.unwrap();
  s.mark_terminal(
    id,
    Outcome::Success {
      rows_extracted: 44,
      rows_loaded:    22,
      source_url:     Some("https://example.test/api".into()),
    },
  )
  .await
  .unwrap();

  let done = s.get_audit(id).await.unwrap().unwrap();
  assert_eq!(done.extraction_status, ExtractionStatus::Success);
  assert_eq!(done.rows_extracted, Some(44));
  assert_eq!(done.rows_loaded, Some(22));
  assert!(done.extracted_at.is_some());
  assert!(done.loaded_at.is_some());
  assert!(done.error_message.is_none());
}

#[tokio::test]
async fn second_terminal_write_is_an_invalid_transition() {
  let s = store().await;
  let id = s.create_audit("ucjsa", "dwp", None).await.unwrap();

  s.mark_running(id).await.unwrap();
  s.mark_terminal(id, Outcome::Skipped { source_url: None })
    .await
    .unwrap();

  let err = s
    .mark_terminal(
      id,
      Outcome::Failed { error: "late".into(), source_url: None },
    )
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(ridings_core::Error::InvalidTransition {
      from: ExtractionStatus::Skipped,
      to: ExtractionStatus::Failed,
      ..
    })
  ));
}

#[tokio::test]
async fn pending_may_fail_without_ever_running() {
  let s = store().await;
  let id = s.create_audit("ucjsa", "dwp", None).await.unwrap();

  s.mark_terminal(
    id,
    Outcome::Failed { error: "credentials rejected".into(), source_url: None },
  )
  .await
  .unwrap();

  let done = s.get_audit(id).await.unwrap().unwrap();
  assert_eq!(done.extraction_status, ExtractionStatus::Failed);
  assert_eq!(done.error_message.as_deref(), Some("credentials rejected"));
}

#[tokio::test]
async fn mark_running_twice_is_an_invalid_transition() {
  let s = store().await;
  let id = s.create_audit("ucjsa", "dwp", None).await.unwrap();

  s.mark_running(id).await.unwrap();
  let err = s.mark_running(id).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(ridings_core::Error::InvalidTransition { .. })
  ));
}

#[tokio::test]
async fn audit_writes_on_unknown_id_fail() {
  let s = store().await;
  let err = s.mark_running(999).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(ridings_core::Error::AuditNotFound(999))
  ));
}

#[tokio::test]
async fn error_message_is_truncated_on_write() {
  let s = store().await;
  let id = s.create_audit("ucjsa", "dwp", None).await.unwrap();

  let huge = "x".repeat(ERROR_MESSAGE_MAX * 3);
  s.mark_terminal(id, Outcome::Failed { error: huge, source_url: None })
    .await
    .unwrap();

  let done = s.get_audit(id).await.unwrap().unwrap();
  assert_eq!(done.error_message.unwrap().len(), ERROR_MESSAGE_MAX);
}

#[tokio::test]
async fn stuck_audits_are_detectable() {
  let s = store().await;

  let stuck_id = s.create_audit("ucjsa", "dwp", None).await.unwrap();
  let finished_id = s.create_audit("bres", "nomis", None).await.unwrap();
  s.mark_terminal(finished_id, Outcome::Skipped { source_url: None })
    .await
    .unwrap();

  // Everything above was created before this cutoff.
  let cutoff = Utc::now() + Duration::seconds(1);
  let stuck = s.stuck_audits(cutoff).await.unwrap();

  assert_eq!(stuck.len(), 1);
  assert_eq!(stuck[0].id, stuck_id);
  assert_eq!(stuck[0].extraction_status, ExtractionStatus::Pending);

  // A cutoff in the past finds nothing.
  let earlier = Utc::now() - Duration::hours(1);
  assert!(s.stuck_audits(earlier).await.unwrap().is_empty());
}

#[tokio::test]
async fn recent_audits_newest_first() {
  let s = store().await;
  let a = s.create_audit("a", "nomis", None).await.unwrap();
  let b = s.create_audit("b", "nomis", None).await.unwrap();
  let c = s.create_audit("c", "nomis", None).await.unwrap();

  let recent = s.recent_audits(2).await.unwrap();
  assert_eq!(recent.iter().map(|m| m.id).collect::<Vec<_>>(), vec![c, b]);
  assert!(a < b && b < c);
}

// ─── Error mapping ───────────────────────────────────────────────────────────

#[test]
fn connection_and_statement_failures_map_to_distinct_variants() {
  // Retry guidance differs: a dead connection is transient, a statement
  // failure is not.
  let closed: crate::Error = tokio_rusqlite::Error::ConnectionClosed.into();
  assert!(matches!(closed, crate::Error::Unavailable(_)));

  let statement: crate::Error =
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows).into();
  assert!(matches!(statement, crate::Error::Sql(_)));
}

// ─── Geo lookup ──────────────────────────────────────────────────────────────

fn geo_row(lsoa: &str, lad_code: &str, lad_name: &str) -> GeoLookupRow {
  GeoLookupRow {
    lsoa_code:   lsoa.into(),
    lsoa_name:   format!("{lad_name} {lsoa}"),
    msoa_code:   "E02000001".into(),
    msoa_name:   "MSOA 001".into(),
    lad_code:    lad_code.into(),
    lad_name:    lad_name.into(),
    region_code: Some("E12000003".into()),
    region_name: Some("Yorkshire and The Humber".into()),
  }
}

#[tokio::test]
async fn geo_replace_is_a_full_swap() {
  let s = store().await;

  s.replace_geo_lookup(vec![
    geo_row("E01000001", "E08000035", "Leeds"),
    geo_row("E01000002", "E08000032", "Bradford"),
  ])
  .await
  .unwrap();

  let count = s
    .replace_geo_lookup(vec![geo_row("E01000003", "E08000019", "Sheffield")])
    .await
    .unwrap();
  assert_eq!(count, 1);

  // Only the new release is visible; nothing from the old one lingers.
  let index = s.load_geo_index().await.unwrap();
  assert_eq!(index.len(), 1);
  assert!(index.lad_for("E01000001").is_none());
  assert_eq!(
    index.lad_for("E01000003"),
    Some(("E08000019", "Sheffield"))
  );
}
