//! [`SqliteWarehouse`] — the SQLite implementation of
//! [`Warehouse`](ridings_core::store::Warehouse).

use std::path::Path;

use chrono::{DateTime, Utc};
use ridings_core::{
  audit::{DatasetMetadata, ExtractionStatus, Outcome, truncate_error},
  geo::{GeoIndex, GeoLookupRow},
  indicator::{Indicator, IndicatorKey, IndicatorRecord, dedup_last_wins},
  store::Warehouse,
};
use rusqlite::OptionalExtension as _;

use crate::{
  Error, Result,
  encode::{RawAudit, RawGeo, RawIndicator, decode_status, encode_date, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A ridings warehouse backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. SQLite
/// serialises writers, so two concurrent batches touching the same upsert key
/// resolve last-commit-wins, which is acceptable because batches are
/// idempotent.
#[derive(Clone)]
pub struct SqliteWarehouse {
  conn: tokio_rusqlite::Connection,
}

/// Result of a guarded audit write, resolved on the database thread so the
/// status check and the update are one transaction.
enum AuditWrite {
  Applied,
  Missing,
  /// The record's current status forbids the transition.
  Refused(String),
}

impl SqliteWarehouse {
  /// Open (or create) a warehouse at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory warehouse — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  fn refused(&self, audit_id: i64, from: &str, to: ExtractionStatus) -> Error {
    match decode_status(from) {
      Ok(from) => ridings_core::Error::InvalidTransition { audit_id, from, to }.into(),
      Err(corrupt) => corrupt,
    }
  }
}

// ─── Row mappers ─────────────────────────────────────────────────────────────

const INDICATOR_COLUMNS: &str = "id, indicator_id, indicator_name, lad_code, \
   lad_name, reference_period, value, unit, source, dataset_code, created_at, \
   updated_at";

fn indicator_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawIndicator> {
  Ok(RawIndicator {
    id:               row.get(0)?,
    indicator_id:     row.get(1)?,
    indicator_name:   row.get(2)?,
    lad_code:         row.get(3)?,
    lad_name:         row.get(4)?,
    reference_period: row.get(5)?,
    value:            row.get(6)?,
    unit:             row.get(7)?,
    source:           row.get(8)?,
    dataset_code:     row.get(9)?,
    created_at:       row.get(10)?,
    updated_at:       row.get(11)?,
  })
}

const AUDIT_COLUMNS: &str = "id, dataset_code, source, extraction_status, \
   flow_run_id, rows_extracted, rows_loaded, error_message, source_url, \
   extracted_at, loaded_at, created_at";

fn audit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAudit> {
  Ok(RawAudit {
    id:                row.get(0)?,
    dataset_code:      row.get(1)?,
    source:            row.get(2)?,
    extraction_status: row.get(3)?,
    flow_run_id:       row.get(4)?,
    rows_extracted:    row.get(5)?,
    rows_loaded:       row.get(6)?,
    error_message:     row.get(7)?,
    source_url:        row.get(8)?,
    extracted_at:      row.get(9)?,
    loaded_at:         row.get(10)?,
    created_at:        row.get(11)?,
  })
}

// ─── Warehouse impl ──────────────────────────────────────────────────────────

impl Warehouse for SqliteWarehouse {
  type Error = Error;

  // ── Indicators ────────────────────────────────────────────────────────────

  async fn upsert_indicators(
    &self,
    records: Vec<IndicatorRecord>,
    dataset_code: &str,
  ) -> Result<u64> {
    // Validate the whole batch before touching storage.
    for record in &records {
      record.validate()?;
    }

    // In-batch duplicates collapse last-wins before any write, so a retry of
    // the same batch is deterministic.
    let records = dedup_last_wins(records);
    if records.is_empty() {
      return Ok(0);
    }

    let count = records.len() as u64;
    let now_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO indicator (
               indicator_id, indicator_name, lad_code, lad_name,
               reference_period, value, unit, source, dataset_code,
               created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
             ON CONFLICT(indicator_id, lad_code, reference_period) DO UPDATE SET
               indicator_name = excluded.indicator_name,
               lad_name       = excluded.lad_name,
               value          = excluded.value,
               unit           = excluded.unit,
               source         = excluded.source,
               dataset_code   = excluded.dataset_code,
               updated_at     = excluded.updated_at",
          )?;
          for record in &records {
            stmt.execute(rusqlite::params![
              record.indicator_id,
              record.indicator_name,
              record.lad_code,
              record.lad_name,
              encode_date(record.reference_period),
              record.value,
              record.unit,
              record.source,
              record.dataset_code,
              now_str,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(dataset_code, rows = count, "indicator batch upserted");
    Ok(count)
  }

  async fn find_indicator(&self, key: &IndicatorKey) -> Result<Option<Indicator>> {
    let indicator_id = key.indicator_id.clone();
    let lad_code = key.lad_code.clone();
    let period_str = encode_date(key.reference_period);

    let raw: Option<RawIndicator> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {INDICATOR_COLUMNS} FROM indicator
                 WHERE indicator_id = ?1 AND lad_code = ?2 AND reference_period = ?3"
              ),
              rusqlite::params![indicator_id, lad_code, period_str],
              indicator_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawIndicator::into_indicator).transpose()
  }

  async fn list_indicators(
    &self,
    indicator_id: &str,
    lad_code: Option<&str>,
  ) -> Result<Vec<Indicator>> {
    let indicator_id = indicator_id.to_string();
    let lad_code = lad_code.map(str::to_string);

    let raws: Vec<RawIndicator> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(lad) = lad_code {
          let mut stmt = conn.prepare(&format!(
            "SELECT {INDICATOR_COLUMNS} FROM indicator
             WHERE indicator_id = ?1 AND lad_code = ?2
             ORDER BY lad_code, reference_period"
          ))?;
          stmt
            .query_map(rusqlite::params![indicator_id, lad], indicator_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let mut stmt = conn.prepare(&format!(
            "SELECT {INDICATOR_COLUMNS} FROM indicator
             WHERE indicator_id = ?1
             ORDER BY lad_code, reference_period"
          ))?;
          stmt
            .query_map(rusqlite::params![indicator_id], indicator_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIndicator::into_indicator).collect()
  }

  // ── Extraction audit ──────────────────────────────────────────────────────

  async fn create_audit(
    &self,
    dataset_code: &str,
    source: &str,
    flow_run_id: Option<String>,
  ) -> Result<i64> {
    let dataset_code = dataset_code.to_string();
    let source = source.to_string();
    let now_str = encode_dt(Utc::now());

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO dataset_metadata
             (dataset_code, source, extraction_status, flow_run_id, created_at)
           VALUES (?1, ?2, 'pending', ?3, ?4)",
          rusqlite::params![dataset_code, source, flow_run_id, now_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    Ok(id)
  }

  async fn mark_running(&self, audit_id: i64) -> Result<()> {
    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row(
            "SELECT extraction_status FROM dataset_metadata WHERE id = ?1",
            rusqlite::params![audit_id],
            |r| r.get(0),
          )
          .optional()?;

        let Some(status) = current else {
          return Ok(AuditWrite::Missing);
        };
        if status != "pending" {
          return Ok(AuditWrite::Refused(status));
        }

        tx.execute(
          "UPDATE dataset_metadata SET extraction_status = 'running' WHERE id = ?1",
          rusqlite::params![audit_id],
        )?;
        tx.commit()?;
        Ok(AuditWrite::Applied)
      })
      .await?;

    match write {
      AuditWrite::Applied => Ok(()),
      AuditWrite::Missing => Err(ridings_core::Error::AuditNotFound(audit_id).into()),
      AuditWrite::Refused(from) => {
        Err(self.refused(audit_id, &from, ExtractionStatus::Running))
      }
    }
  }

  async fn mark_terminal(&self, audit_id: i64, outcome: Outcome) -> Result<()> {
    let to = outcome.status();
    let now_str = encode_dt(Utc::now());

    let (rows_extracted, rows_loaded, error_message, source_url) = match outcome {
      Outcome::Success { rows_extracted, rows_loaded, source_url } => {
        (Some(rows_extracted), Some(rows_loaded), None, source_url)
      }
      Outcome::Failed { error, source_url } => {
        (None, None, Some(truncate_error(&error)), source_url)
      }
      Outcome::Skipped { source_url } => (None, None, None, source_url),
    };
    let extracted_at = rows_extracted.map(|_| now_str.clone());
    let loaded_at = rows_loaded.map(|_| now_str.clone());
    let status_str = to.as_str();

    let write = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<String> = tx
          .query_row(
            "SELECT extraction_status FROM dataset_metadata WHERE id = ?1",
            rusqlite::params![audit_id],
            |r| r.get(0),
          )
          .optional()?;

        let Some(status) = current else {
          return Ok(AuditWrite::Missing);
        };
        // Exactly one terminal write per attempt.
        if matches!(status.as_str(), "success" | "failed" | "skipped") {
          return Ok(AuditWrite::Refused(status));
        }

        tx.execute(
          "UPDATE dataset_metadata SET
             extraction_status = ?2,
             rows_extracted    = ?3,
             rows_loaded       = ?4,
             error_message     = ?5,
             source_url        = ?6,
             extracted_at      = ?7,
             loaded_at         = ?8
           WHERE id = ?1",
          rusqlite::params![
            audit_id,
            status_str,
            rows_extracted,
            rows_loaded,
            error_message,
            source_url,
            extracted_at,
            loaded_at,
          ],
        )?;
        tx.commit()?;
        Ok(AuditWrite::Applied)
      })
      .await?;

    match write {
      AuditWrite::Applied => Ok(()),
      AuditWrite::Missing => Err(ridings_core::Error::AuditNotFound(audit_id).into()),
      AuditWrite::Refused(from) => Err(self.refused(audit_id, &from, to)),
    }
  }

  async fn get_audit(&self, audit_id: i64) -> Result<Option<DatasetMetadata>> {
    let raw: Option<RawAudit> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {AUDIT_COLUMNS} FROM dataset_metadata WHERE id = ?1"),
              rusqlite::params![audit_id],
              audit_from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAudit::into_metadata).transpose()
  }

  async fn recent_audits(&self, limit: usize) -> Result<Vec<DatasetMetadata>> {
    let limit = limit as i64;

    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM dataset_metadata
           ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![limit], audit_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAudit::into_metadata).collect()
  }

  async fn stuck_audits(&self, cutoff: DateTime<Utc>) -> Result<Vec<DatasetMetadata>> {
    let cutoff_str = encode_dt(cutoff);

    let raws: Vec<RawAudit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM dataset_metadata
           WHERE extraction_status IN ('pending', 'running')
             AND created_at < ?1
           ORDER BY created_at"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![cutoff_str], audit_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAudit::into_metadata).collect()
  }

  // ── Geo lookup ────────────────────────────────────────────────────────────

  async fn replace_geo_lookup(&self, rows: Vec<GeoLookupRow>) -> Result<u64> {
    let count = rows.len() as u64;

    self
      .conn
      .call(move |conn| {
        // Consistent-snapshot swap: readers see the old release or the new
        // one, never a mix.
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM geo_lookup", [])?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO geo_lookup (
               lsoa_code, lsoa_name, msoa_code, msoa_name,
               lad_code, lad_name, region_code, region_name
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![
              row.lsoa_code,
              row.lsoa_name,
              row.msoa_code,
              row.msoa_name,
              row.lad_code,
              row.lad_name,
              row.region_code,
              row.region_name,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::info!(rows = count, "geo lookup replaced");
    Ok(count)
  }

  async fn load_geo_index(&self) -> Result<GeoIndex> {
    let raws: Vec<RawGeo> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT lsoa_code, lsoa_name, msoa_code, msoa_name,
                  lad_code, lad_name, region_code, region_name
           FROM geo_lookup",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawGeo {
              lsoa_code:   row.get(0)?,
              lsoa_name:   row.get(1)?,
              msoa_code:   row.get(2)?,
              msoa_name:   row.get(3)?,
              lad_code:    row.get(4)?,
              lad_name:    row.get(5)?,
              region_code: row.get(6)?,
              region_name: row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(GeoIndex::from_rows(raws.into_iter().map(RawGeo::into_row)))
  }
}
