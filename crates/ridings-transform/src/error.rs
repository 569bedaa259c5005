//! Error types for `ridings-transform`.
//!
//! All three variants are caller data defects: surfaced immediately, never
//! retried, and raised before anything is written downstream.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The extracted table does not meet the contract for its source — empty,
  /// or missing required columns.
  #[error("schema violation from {source_system}: {detail}")]
  SchemaViolation {
    source_system: String,
    detail:        String,
  },

  /// A column named in a mapping is absent from the input.
  #[error("missing column {column:?}")]
  MissingColumn { column: String },

  /// A value cell is neither null nor a number (numeric strings are
  /// accepted).
  #[error("column {column:?} contains a non-numeric value: {value}")]
  NonNumeric { column: String, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
