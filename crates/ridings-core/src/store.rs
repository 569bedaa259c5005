//! The `Warehouse` trait — the storage capability every pipeline runs
//! against.
//!
//! Implemented by storage backends (e.g. `ridings-store-sqlite`). Higher
//! layers (`ridings-pipeline`, `ridings-cli`) depend on this abstraction, not
//! on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  audit::{DatasetMetadata, Outcome},
  geo::{GeoIndex, GeoLookupRow},
  indicator::{Indicator, IndicatorKey, IndicatorRecord},
};

/// Abstraction over the relational warehouse.
///
/// Contract highlights:
/// - `upsert_indicators` is validate-then-write, atomic per batch, and fully
///   idempotent: re-running the same batch produces the same end state.
/// - Audit writes enforce the extraction state machine; exactly one terminal
///   write per attempt.
/// - The geo lookup is read-only except for `replace_geo_lookup`, which swaps
///   the whole table in one transaction so readers never observe a
///   half-updated hierarchy.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait Warehouse: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Indicators ────────────────────────────────────────────────────────

  /// Upsert a batch of normalised records, matching on
  /// [`IndicatorKey`](crate::indicator::IndicatorKey).
  ///
  /// Duplicate keys within the batch collapse last-wins before any write.
  /// Existing rows have their value/unit/source/dataset fields overwritten
  /// and `updated_at` refreshed; `created_at` is preserved. Returns the
  /// number of distinct rows written.
  fn upsert_indicators<'a>(
    &'a self,
    records: Vec<IndicatorRecord>,
    dataset_code: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Look up a single row by its upsert key. Returns `None` if absent.
  fn find_indicator<'a>(
    &'a self,
    key: &'a IndicatorKey,
  ) -> impl Future<Output = Result<Option<Indicator>, Self::Error>> + Send + 'a;

  /// All rows for one indicator, optionally restricted to a district,
  /// ordered by (lad_code, reference_period).
  fn list_indicators<'a>(
    &'a self,
    indicator_id: &'a str,
    lad_code: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<Indicator>, Self::Error>> + Send + 'a;

  // ── Extraction audit ──────────────────────────────────────────────────

  /// Open an audit record for a new extraction attempt, in `Pending` state.
  /// Returns the record id.
  fn create_audit<'a>(
    &'a self,
    dataset_code: &'a str,
    source: &'a str,
    flow_run_id: Option<String>,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Move a `Pending` record to `Running` (extract call dispatched).
  /// Fails with an invalid-transition error from any other state.
  fn mark_running(
    &self,
    audit_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Apply the single terminal write for an attempt. Fails with an
  /// invalid-transition error if the record is already terminal; the
  /// check-and-update is atomic.
  fn mark_terminal(
    &self,
    audit_id: i64,
    outcome: Outcome,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_audit(
    &self,
    audit_id: i64,
  ) -> impl Future<Output = Result<Option<DatasetMetadata>, Self::Error>> + Send + '_;

  /// Most recent audit records, newest first.
  fn recent_audits(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<DatasetMetadata>, Self::Error>> + Send + '_;

  /// Non-terminal records created before `cutoff` — attempts that never
  /// received their terminal write and need operator attention.
  fn stuck_audits(
    &self,
    cutoff: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<DatasetMetadata>, Self::Error>> + Send + '_;

  // ── Geo lookup ────────────────────────────────────────────────────────

  /// Atomically replace the entire geography lookup with `rows`. Returns the
  /// number of rows loaded.
  fn replace_geo_lookup(
    &self,
    rows: Vec<GeoLookupRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Load the full lookup into an in-memory [`GeoIndex`] for the duration of
  /// a run.
  fn load_geo_index(
    &self,
  ) -> impl Future<Output = Result<GeoIndex, Self::Error>> + Send + '_;
}
