//! Raw tabular data as handed over by extraction collaborators.
//!
//! Source APIs return JSON; a raw extract is an array of objects with one
//! object per row. Transforms treat the column set as table-wide: a column is
//! present only when every row carries it.

use serde::{Deserialize, Serialize};

pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// An untyped extracted table. `#[serde(transparent)]` so a saved extract
/// file (a bare JSON array) deserialises directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTable {
  pub rows: Vec<RawRow>,
}

impl RawTable {
  pub fn new(rows: Vec<RawRow>) -> Self { Self { rows } }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }

  /// True when every row carries `column`. Vacuously false for an empty
  /// table, which validation rejects before anything else runs.
  pub fn has_column(&self, column: &str) -> bool {
    !self.rows.is_empty() && self.rows.iter().all(|row| row.contains_key(column))
  }

  /// The subset of `required` absent from this table, in the given order.
  pub fn missing_columns<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
    required
      .iter()
      .copied()
      .filter(|column| !self.has_column(column))
      .collect()
  }
}
