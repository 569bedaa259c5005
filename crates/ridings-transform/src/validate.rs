//! Schema and completeness checks run before normalisation.

use std::collections::BTreeSet;

use ridings_core::table::RawTable;

use crate::{Error, Result};

// ─── Schema validation ───────────────────────────────────────────────────────

/// Check that `table` has every required column and at least one row.
///
/// Zero rows is always an error — an "empty successful extraction" is a
/// contradiction in terms and must be surfaced, not silently passed through.
/// The input is untouched on success.
pub fn validate_schema(
  table: &RawTable,
  required_columns: &[&str],
  source: &str,
) -> Result<()> {
  if table.is_empty() {
    return Err(Error::SchemaViolation {
      source_system: source.to_string(),
      detail:        "extraction returned zero rows".to_string(),
    });
  }

  let missing = table.missing_columns(required_columns);
  if !missing.is_empty() {
    return Err(Error::SchemaViolation {
      source_system: source.to_string(),
      detail:        format!("missing required columns: {missing:?}"),
    });
  }

  Ok(())
}

// ─── District coverage ───────────────────────────────────────────────────────

/// Result of the non-fatal district completeness check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LadCoverage {
  /// Expected LAD codes with no row in the extract.
  pub missing:    Vec<String>,
  /// Observed LAD codes outside the canonical list (data from adjacent
  /// sources; expected for some extracts).
  pub unexpected: Vec<String>,
}

impl LadCoverage {
  pub fn is_complete(&self) -> bool {
    self.missing.is_empty() && self.unexpected.is_empty()
  }
}

/// Compare the LAD codes present in `table` against the canonical in-scope
/// set and report the symmetric difference.
///
/// Non-fatal by design: not every source covers every district, so gaps are
/// logged as warnings and the pipeline carries on. Only a missing `lad_column`
/// itself — a caller defect — is an error.
pub fn validate_yorkshire_lads(
  table: &RawTable,
  lad_column: &str,
  expected: &[String],
) -> Result<LadCoverage> {
  if !table.has_column(lad_column) {
    return Err(Error::MissingColumn { column: lad_column.to_string() });
  }

  let observed: BTreeSet<&str> = table
    .rows
    .iter()
    .filter_map(|row| row.get(lad_column).and_then(|v| v.as_str()))
    .collect();

  let coverage = LadCoverage {
    missing:    expected
      .iter()
      .filter(|code| !observed.contains(code.as_str()))
      .cloned()
      .collect(),
    unexpected: observed
      .iter()
      .filter(|code| !expected.iter().any(|e| e == *code))
      .map(|code| code.to_string())
      .collect(),
  };

  if !coverage.missing.is_empty() {
    tracing::warn!(missing = ?coverage.missing, "expected LADs absent from extract");
  }
  if !coverage.unexpected.is_empty() {
    tracing::warn!(unexpected = ?coverage.unexpected, "extract carries out-of-scope LAD codes");
  }

  Ok(coverage)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
