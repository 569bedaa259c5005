//! The extraction collaborator seam.
//!
//! Source-specific HTTP clients (NOMIS, DWP Stat-Xplore, DEFRA, Ofcom, ONS,
//! Fingertips, Sport England, BEIS) live outside this codebase. The runner
//! only needs `extract() -> raw table`, fallible and bounded-time; retries
//! with backoff are applied here, around the whole call.

use std::{future::Future, path::PathBuf, time::Duration};

use ridings_core::table::RawTable;

use crate::error::BoxError;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// One raw extract handed over by a collaborator.
#[derive(Debug, Clone)]
pub struct Extracted {
  pub table:      RawTable,
  /// The endpoint or file actually fetched, recorded for provenance.
  pub source_url: Option<String>,
}

/// A configured extraction collaborator for one dataset.
///
/// `Ok(None)` means the source has no new data for the requested period; the
/// run is recorded as skipped, which is not an error.
pub trait Extractor: Send + Sync {
  fn extract(
    &self,
  ) -> impl Future<Output = Result<Option<Extracted>, BoxError>> + Send + '_;
}

// ─── Retry ───────────────────────────────────────────────────────────────────

/// Run `op` up to `attempts` times, sleeping `base_delay × attempt` between
/// tries. Only extraction goes through this: data defects downstream are
/// deterministic and must never be retried.
pub async fn with_retry<T, F, Fut>(
  attempts: u32,
  base_delay: Duration,
  mut op: F,
) -> Result<T, BoxError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, BoxError>>,
{
  let attempts = attempts.max(1);
  let mut attempt = 0u32;

  loop {
    attempt += 1;
    match op().await {
      Ok(value) => return Ok(value),
      Err(error) => {
        if attempt >= attempts {
          return Err(error);
        }
        tracing::warn!(attempt, %error, "extract attempt failed; retrying");
        tokio::time::sleep(base_delay * attempt).await;
      }
    }
  }
}

// ─── File replay ─────────────────────────────────────────────────────────────

/// Replays a raw extract saved to disk as a JSON array of row objects.
///
/// This is what the CLI binds: operators download or archive a source
/// response, then run the pipeline over the file. Behaves exactly like a live
/// collaborator from the runner's point of view.
pub struct FileExtractor {
  path: PathBuf,
}

impl FileExtractor {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }
}

impl Extractor for FileExtractor {
  async fn extract(&self) -> Result<Option<Extracted>, BoxError> {
    let raw = tokio::fs::read_to_string(&self.path).await?;
    let table: RawTable = serde_json::from_str(&raw)?;
    Ok(Some(Extracted {
      table,
      source_url: Some(format!("file://{}", self.path.display())),
    }))
  }
}
