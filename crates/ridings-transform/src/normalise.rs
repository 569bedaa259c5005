//! Normalisation: map a source-specific table into canonical
//! [`IndicatorRecord`]s.
//!
//! A pure column mapping — source columns are renamed to the canonical field
//! names and the constant per-dataset metadata is attached to every row.
//! Suppressed (null) values stay suppressed.

use chrono::NaiveDate;
use ridings_core::{indicator::IndicatorRecord, table::RawTable};

use crate::{
  Error, Result,
  aggregate::LadAggregation,
  cell::{numeric_cell, text_cell},
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// Which source columns hold the canonical fields.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
  pub lad_code: String,
  pub lad_name: String,
  pub value:    String,
}

/// The constant metadata attached to every record produced from one dataset
/// extract.
#[derive(Debug, Clone)]
pub struct IndicatorMeta {
  pub indicator_id:     String,
  pub indicator_name:   String,
  /// Source system identifier, e.g. `"nomis"`.
  pub source:           String,
  pub dataset_code:     String,
  pub reference_period: NaiveDate,
  pub unit:             Option<String>,
}

// ─── Normalise ───────────────────────────────────────────────────────────────

/// Produce one [`IndicatorRecord`] per input row.
///
/// Fails with [`Error::MissingColumn`] if any mapped column is absent, before
/// any row is converted. Value nulls are preserved as `None`; record-level
/// validation (empty codes and names) is the store's concern at upsert time.
pub fn normalise_to_indicator(
  table: &RawTable,
  meta: &IndicatorMeta,
  columns: &ColumnMapping,
) -> Result<Vec<IndicatorRecord>> {
  for column in [&columns.lad_code, &columns.lad_name, &columns.value] {
    if !table.has_column(column) {
      return Err(Error::MissingColumn { column: column.clone() });
    }
  }

  table
    .rows
    .iter()
    .map(|row| {
      let value = numeric_cell(&columns.value, &row[&columns.value])?;
      Ok(IndicatorRecord {
        indicator_id:     meta.indicator_id.clone(),
        indicator_name:   meta.indicator_name.clone(),
        lad_code:         text_cell(&row[&columns.lad_code]),
        lad_name:         text_cell(&row[&columns.lad_name]),
        reference_period: meta.reference_period,
        value,
        unit:             meta.unit.clone(),
        source:           Some(meta.source.clone()),
        dataset_code:     Some(meta.dataset_code.clone()),
      })
    })
    .collect()
}

/// Bridge from a finished geo aggregation to upsert-ready records.
/// Aggregated values are always concrete — suppressed sub-LAD rows were
/// dropped (and counted) during aggregation.
pub fn records_from_aggregates(
  aggregation: &LadAggregation,
  meta: &IndicatorMeta,
) -> Vec<IndicatorRecord> {
  aggregation
    .rows
    .iter()
    .map(|lad| IndicatorRecord {
      indicator_id:     meta.indicator_id.clone(),
      indicator_name:   meta.indicator_name.clone(),
      lad_code:         lad.lad_code.clone(),
      lad_name:         lad.lad_name.clone(),
      reference_period: meta.reference_period,
      value:            Some(lad.value),
      unit:             meta.unit.clone(),
      source:           Some(meta.source.clone()),
      dataset_code:     Some(meta.dataset_code.clone()),
    })
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
