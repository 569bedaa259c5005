//! Error type for `ridings-pipeline`.

use thiserror::Error;

/// Boxed failure from an external collaborator or a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown pipeline: {0:?}")]
  UnknownPipeline(String),

  /// The extraction collaborator failed after its bounded retries.
  #[error("extraction failed: {0}")]
  Extract(#[source] BoxError),

  /// A data defect found by validation or normalisation. Never retried.
  #[error(transparent)]
  Transform(#[from] ridings_transform::Error),

  #[error("warehouse error: {0}")]
  Store(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
