//! End-to-end runner tests against an in-memory SQLite warehouse.

use std::time::Duration;

use chrono::NaiveDate;
use ridings_core::{
  audit::ExtractionStatus,
  geo::GeoLookupRow,
  indicator::IndicatorKey,
  store::Warehouse,
  table::{RawRow, RawTable},
};
use ridings_store_sqlite::SqliteWarehouse;
use serde_json::json;

use crate::{
  Error, RunOptions,
  error::BoxError,
  extract::{Extracted, Extractor},
  find_pipeline, run_pipeline,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

async fn store() -> SqliteWarehouse {
  SqliteWarehouse::open_in_memory()
    .await
    .expect("in-memory warehouse")
}

fn opts() -> RunOptions {
  let mut opts =
    RunOptions::for_period(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
  // Keep failure tests instant.
  opts.retry_attempts = 1;
  opts.retry_delay = Duration::from_millis(1);
  opts
}

fn table(rows: &[serde_json::Value]) -> RawTable {
  RawTable::new(
    rows
      .iter()
      .map(|v| match v {
        serde_json::Value::Object(map) => map.clone(),
        _ => panic!("expected object"),
      })
      .collect::<Vec<RawRow>>(),
  )
}

struct Fixed(RawTable);

impl Extractor for Fixed {
  async fn extract(&self) -> Result<Option<Extracted>, BoxError> {
    Ok(Some(Extracted {
      table:      self.0.clone(),
      source_url: Some("https://example.test/extract".into()),
    }))
  }
}

struct NoNewData;

impl Extractor for NoNewData {
  async fn extract(&self) -> Result<Option<Extracted>, BoxError> {
    Ok(None)
  }
}

struct Unreachable;

impl Extractor for Unreachable {
  async fn extract(&self) -> Result<Option<Extracted>, BoxError> {
    Err("connection refused".into())
  }
}

struct Parked;

impl Extractor for Parked {
  async fn extract(&self) -> Result<Option<Extracted>, BoxError> {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Ok(None)
  }
}

fn claimant_table() -> RawTable {
  table(&[
    json!({"area_code": "E08000035", "area_name": "Leeds", "metric": 3.1}),
    json!({"area_code": "E08000032", "area_name": "Bradford", "metric": null}),
  ])
}

// ─── LAD-level runs ──────────────────────────────────────────────────────────

#[tokio::test]
async fn lad_level_run_loads_and_closes_audit() {
  let s = store().await;
  let def = find_pipeline("claimant_count").unwrap();

  let report = run_pipeline(&s, &def, &Fixed(claimant_table()), &opts())
    .await
    .unwrap();

  assert_eq!(report.status, ExtractionStatus::Success);
  assert_eq!(report.rows_extracted, 2);
  assert_eq!(report.rows_loaded, 2);
  // Coverage ran: 20 of the 22 districts are absent from this tiny extract.
  assert_eq!(report.coverage.as_ref().unwrap().missing.len(), 20);

  let audit = s.get_audit(report.audit_id).await.unwrap().unwrap();
  assert_eq!(audit.extraction_status, ExtractionStatus::Success);
  assert_eq!(audit.rows_loaded, Some(2));
  assert_eq!(
    audit.source_url.as_deref(),
    Some("https://example.test/extract")
  );

  let row = s
    .find_indicator(&IndicatorKey {
      indicator_id:     "claimant_rate".into(),
      lad_code:         "E08000035".into(),
      reference_period: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(row.value, Some(3.1));
  assert_eq!(row.source.as_deref(), Some("dwp"));
}

#[tokio::test]
async fn rerun_is_idempotent() {
  let s = store().await;
  let def = find_pipeline("claimant_count").unwrap();
  let extractor = Fixed(claimant_table());

  run_pipeline(&s, &def, &extractor, &opts()).await.unwrap();
  let second = run_pipeline(&s, &def, &extractor, &opts()).await.unwrap();

  assert_eq!(second.rows_loaded, 2);
  let rows = s.list_indicators("claimant_rate", None).await.unwrap();
  assert_eq!(rows.len(), 2);
  // Two runs, two audit records.
  assert_eq!(s.recent_audits(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn no_new_data_is_recorded_as_skipped() {
  let s = store().await;
  let def = find_pipeline("claimant_count").unwrap();

  let report = run_pipeline(&s, &def, &NoNewData, &opts()).await.unwrap();
  assert_eq!(report.status, ExtractionStatus::Skipped);
  assert_eq!(report.rows_loaded, 0);

  let audit = s.get_audit(report.audit_id).await.unwrap().unwrap();
  assert_eq!(audit.extraction_status, ExtractionStatus::Skipped);
  assert!(audit.error_message.is_none());
}

// ─── Failure paths ───────────────────────────────────────────────────────────

#[tokio::test]
async fn extractor_failure_closes_audit_as_failed() {
  let s = store().await;
  let def = find_pipeline("claimant_count").unwrap();

  let err = run_pipeline(&s, &def, &Unreachable, &opts())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Extract(_)));

  let audits = s.recent_audits(1).await.unwrap();
  assert_eq!(audits[0].extraction_status, ExtractionStatus::Failed);
  assert!(
    audits[0]
      .error_message
      .as_deref()
      .unwrap()
      .contains("connection refused")
  );
}

#[tokio::test]
async fn schema_violation_closes_audit_as_failed() {
  let s = store().await;
  let def = find_pipeline("claimant_count").unwrap();
  // `metric` column absent everywhere.
  let bad = table(&[json!({"area_code": "E08000035", "area_name": "Leeds"})]);

  let err = run_pipeline(&s, &def, &Fixed(bad), &opts()).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Transform(ridings_transform::Error::SchemaViolation { .. })
  ));

  let audits = s.recent_audits(1).await.unwrap();
  assert_eq!(audits[0].extraction_status, ExtractionStatus::Failed);
  // The failed run loaded nothing.
  assert!(s.list_indicators("claimant_rate", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn aborted_run_still_closes_audit() {
  let s = store().await;
  let def = find_pipeline("claimant_count").unwrap();

  let handle = tokio::spawn({
    let s = s.clone();
    let def = def.clone();
    async move { run_pipeline(&s, &def, &Parked, &opts()).await }
  });

  // Let the run park in its extract call, then drop it at that await point.
  tokio::time::sleep(Duration::from_millis(50)).await;
  handle.abort();
  assert!(handle.await.unwrap_err().is_cancelled());

  // The guard's terminal write runs on its own task; poll for it to land.
  for _ in 0..100 {
    if let Some(audit) = s.recent_audits(1).await.unwrap().into_iter().next()
      && audit.extraction_status.is_terminal()
    {
      assert_eq!(audit.extraction_status, ExtractionStatus::Failed);
      assert!(audit.error_message.as_deref().unwrap().contains("aborted"));
      return;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("audit left non-terminal after abort");
}

// ─── LSOA-level runs ─────────────────────────────────────────────────────────

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
async fn lsoa_level_run_aggregates_before_loading() {
  let s = store().await;
  s.replace_geo_lookup(vec![
    geo_row("E01000001", "E08000035", "Leeds"),
    geo_row("E01000002", "E08000035", "Leeds"),
    geo_row("E01000003", "E08000032", "Bradford"),
  ])
  .await
  .unwrap();

  let def = find_pipeline("crime_statistics").unwrap();
  let extract = table(&[
    json!({"lsoa_code": "E01000001", "offences": 10.0}),
    json!({"lsoa_code": "E01000002", "offences": 20.0}),
    json!({"lsoa_code": "E01000003", "offences": 5.0}),
    json!({"lsoa_code": "E01999999", "offences": 7.0}), // outside the lookup
  ]);

  let report = run_pipeline(&s, &def, &Fixed(extract), &opts())
    .await
    .unwrap();

  assert_eq!(report.status, ExtractionStatus::Success);
  assert_eq!(report.rows_extracted, 4);
  assert_eq!(report.rows_loaded, 2);
  assert_eq!(report.unmatched_geo, 1);
  assert!(report.coverage.is_none());

  let leeds = s
    .find_indicator(&IndicatorKey {
      indicator_id:     "recorded_offences".into(),
      lad_code:         "E08000035".into(),
      reference_period: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(leeds.value, Some(30.0));
  assert_eq!(leeds.lad_name, "Leeds");
}
