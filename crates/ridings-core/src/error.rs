//! Error types for `ridings-core`.

use thiserror::Error;

use crate::audit::ExtractionStatus;

#[derive(Debug, Error)]
pub enum Error {
  /// A record is missing a field required by the upsert key or display
  /// contract. Surfaced before any write; never retried.
  #[error("invalid record: {field} is empty")]
  InvalidRecord { field: &'static str },

  #[error("audit record not found: {0}")]
  AuditNotFound(i64),

  /// An attempt to move an audit record out of a state that does not permit
  /// it. Indicates a bug in the calling pipeline, not bad data.
  #[error("invalid audit transition for record {audit_id}: {from} -> {to}")]
  InvalidTransition {
    audit_id: i64,
    from:     ExtractionStatus,
    to:       ExtractionStatus,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
