//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings (which also compare correctly as
//! text), dates as `YYYY-MM-DD`, statuses as their lowercase names.

use chrono::{DateTime, NaiveDate, Utc};
use ridings_core::{
  audit::{DatasetMetadata, ExtractionStatus},
  geo::GeoLookupRow,
  indicator::Indicator,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Corrupt(format!("bad date {s:?}: {e}")))
}

// ─── ExtractionStatus ────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<ExtractionStatus> {
  match s {
    "pending" => Ok(ExtractionStatus::Pending),
    "running" => Ok(ExtractionStatus::Running),
    "success" => Ok(ExtractionStatus::Success),
    "failed" => Ok(ExtractionStatus::Failed),
    "skipped" => Ok(ExtractionStatus::Skipped),
    other => Err(Error::Corrupt(format!("unknown extraction status: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `indicator` row.
pub struct RawIndicator {
  pub id:               i64,
  pub indicator_id:     String,
  pub indicator_name:   String,
  pub lad_code:         String,
  pub lad_name:         String,
  pub reference_period: String,
  pub value:            Option<f64>,
  pub unit:             Option<String>,
  pub source:           Option<String>,
  pub dataset_code:     Option<String>,
  pub created_at:       String,
  pub updated_at:       String,
}

impl RawIndicator {
  pub fn into_indicator(self) -> Result<Indicator> {
    Ok(Indicator {
      id:               self.id,
      indicator_id:     self.indicator_id,
      indicator_name:   self.indicator_name,
      lad_code:         self.lad_code,
      lad_name:         self.lad_name,
      reference_period: decode_date(&self.reference_period)?,
      value:            self.value,
      unit:             self.unit,
      source:           self.source,
      dataset_code:     self.dataset_code,
      created_at:       decode_dt(&self.created_at)?,
      updated_at:       decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `dataset_metadata` row.
pub struct RawAudit {
  pub id:                i64,
  pub dataset_code:      String,
  pub source:            String,
  pub extraction_status: String,
  pub flow_run_id:       Option<String>,
  pub rows_extracted:    Option<i64>,
  pub rows_loaded:       Option<i64>,
  pub error_message:     Option<String>,
  pub source_url:        Option<String>,
  pub extracted_at:      Option<String>,
  pub loaded_at:         Option<String>,
  pub created_at:        String,
}

impl RawAudit {
  pub fn into_metadata(self) -> Result<DatasetMetadata> {
    Ok(DatasetMetadata {
      id:                self.id,
      dataset_code:      self.dataset_code,
      source:            self.source,
      extraction_status: decode_status(&self.extraction_status)?,
      flow_run_id:       self.flow_run_id,
      rows_extracted:    self.rows_extracted,
      rows_loaded:       self.rows_loaded,
      error_message:     self.error_message,
      source_url:        self.source_url,
      extracted_at:      self.extracted_at.as_deref().map(decode_dt).transpose()?,
      loaded_at:         self.loaded_at.as_deref().map(decode_dt).transpose()?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `geo_lookup` row. All columns are already
/// plain text, so this is a straight field-for-field carrier.
pub struct RawGeo {
  pub lsoa_code:   String,
  pub lsoa_name:   String,
  pub msoa_code:   String,
  pub msoa_name:   String,
  pub lad_code:    String,
  pub lad_name:    String,
  pub region_code: Option<String>,
  pub region_name: Option<String>,
}

impl RawGeo {
  pub fn into_row(self) -> GeoLookupRow {
    GeoLookupRow {
      lsoa_code:   self.lsoa_code,
      lsoa_name:   self.lsoa_name,
      msoa_code:   self.msoa_code,
      msoa_name:   self.msoa_name,
      lad_code:    self.lad_code,
      lad_name:    self.lad_name,
      region_code: self.region_code,
      region_name: self.region_name,
    }
  }
}
