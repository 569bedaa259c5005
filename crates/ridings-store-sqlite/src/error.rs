//! Error type for `ridings-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain-contract failure: invalid record, invalid audit transition,
  /// unknown audit id. Never retried.
  #[error(transparent)]
  Core(#[from] ridings_core::Error),

  /// The database thread is gone or the connection could not be used.
  /// Transient — the whole batch is safe to retry because upsert is
  /// idempotent.
  #[error("storage unavailable: {0}")]
  Unavailable(#[source] tokio_rusqlite::Error),

  /// A statement failed inside the database (SQL, constraint, or type
  /// error). Not transient; retrying the same batch fails the same way.
  #[error("statement failed: {0}")]
  Sql(#[from] rusqlite::Error),

  /// A stored value could not be decoded back into its domain type.
  #[error("stored data undecodable: {0}")]
  Corrupt(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(error: tokio_rusqlite::Error) -> Self {
    match error {
      tokio_rusqlite::Error::Rusqlite(e) => Self::Sql(e),
      other => Self::Unavailable(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
