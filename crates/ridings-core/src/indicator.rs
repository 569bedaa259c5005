//! Indicator types — the fact rows of the ridings warehouse.
//!
//! One row per (indicator, district, period) observation. Rows are created by
//! a load, overwritten only by a later load carrying the same upsert key, and
//! never deleted in normal operation.

use std::collections::{HashMap, hash_map::Entry};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Upsert key ──────────────────────────────────────────────────────────────

/// The merge key driving upsert matching. No two rows in the warehouse may
/// ever share this triple; an autoincrement id exists but never drives
/// matching, which is what makes re-running a load idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorKey {
  pub indicator_id:     String,
  /// ONS GSS code for the Local Authority District, e.g. `"E08000032"`.
  pub lad_code:         String,
  /// First day of the period the observation relates to.
  pub reference_period: NaiveDate,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One observation as produced by the normalise stage — the input shape for
/// upsert. Timestamps are assigned by the store, never accepted from callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
  /// Short machine-readable identifier, e.g. `"claimant_rate"`.
  pub indicator_id:     String,
  pub indicator_name:   String,
  pub lad_code:         String,
  pub lad_name:         String,
  pub reference_period: NaiveDate,
  /// `None` means the true figure was withheld for disclosure control — it is
  /// a real observation, not missing data, and must never be coerced to zero.
  pub value:            Option<f64>,
  pub unit:             Option<String>,
  /// Source system identifier, e.g. `"nomis"` or `"fingertips"`.
  pub source:           Option<String>,
  pub dataset_code:     Option<String>,
}

impl IndicatorRecord {
  pub fn key(&self) -> IndicatorKey {
    IndicatorKey {
      indicator_id:     self.indicator_id.clone(),
      lad_code:         self.lad_code.clone(),
      reference_period: self.reference_period,
    }
  }

  /// Reject records missing any part of the upsert key or a display name.
  /// Called for the whole batch before any write (validate-then-write).
  pub fn validate(&self) -> Result<()> {
    for (field, text) in [
      ("indicator_id", &self.indicator_id),
      ("indicator_name", &self.indicator_name),
      ("lad_code", &self.lad_code),
      ("lad_name", &self.lad_name),
    ] {
      if text.trim().is_empty() {
        return Err(Error::InvalidRecord { field });
      }
    }
    Ok(())
  }
}

/// A persisted fact row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
  pub id:               i64,
  pub indicator_id:     String,
  pub indicator_name:   String,
  pub lad_code:         String,
  pub lad_name:         String,
  pub reference_period: NaiveDate,
  pub value:            Option<f64>,
  pub unit:             Option<String>,
  pub source:           Option<String>,
  pub dataset_code:     Option<String>,
  pub created_at:       DateTime<Utc>,
  /// Refreshed on every mutating write; equals `created_at` until the row is
  /// first overwritten.
  pub updated_at:       DateTime<Utc>,
}

impl Indicator {
  pub fn key(&self) -> IndicatorKey {
    IndicatorKey {
      indicator_id:     self.indicator_id.clone(),
      lad_code:         self.lad_code.clone(),
      reference_period: self.reference_period,
    }
  }
}

// ─── In-batch deduplication ──────────────────────────────────────────────────

/// Collapse duplicate upsert keys within a single batch, the last occurrence
/// in input order winning. Each key keeps the position of its first
/// appearance, so the output order is deterministic for a given input.
pub fn dedup_last_wins(records: Vec<IndicatorRecord>) -> Vec<IndicatorRecord> {
  let mut slot_by_key: HashMap<IndicatorKey, usize> = HashMap::new();
  let mut out: Vec<IndicatorRecord> = Vec::with_capacity(records.len());

  for record in records {
    match slot_by_key.entry(record.key()) {
      Entry::Occupied(slot) => out[*slot.get()] = record,
      Entry::Vacant(slot) => {
        slot.insert(out.len());
        out.push(record);
      }
    }
  }

  out
}

// ─── Tests ───────────────────────────────────────────────────────────────────
