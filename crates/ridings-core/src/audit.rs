//! Extraction audit types — one `DatasetMetadata` row per extraction attempt.
//!
//! The audit trail is append-heavy: a row is created in `Pending` state when
//! an attempt starts, moves to `Running` when the extract call is dispatched,
//! and receives exactly one terminal write. Rows are immutable once terminal
//! and never deleted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state of a dataset extraction attempt.
///
/// Valid transitions: `Pending → Running → {Success, Failed, Skipped}`.
/// `Pending` may also jump straight to a terminal state (an attempt can fail
/// before its extract call is ever dispatched). Nothing leaves a terminal
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
  Pending,
  Running,
  Success,
  Failed,
  /// The run was deliberately bypassed (e.g. no new data for the period).
  /// Not an error.
  Skipped,
}

impl ExtractionStatus {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Success | Self::Failed | Self::Skipped)
  }

  /// Whether a record in state `self` may move to `next`.
  /// `Pending` is creation-only and is never a transition target.
  pub fn can_become(self, next: Self) -> bool {
    match (self, next) {
      (Self::Pending, Self::Running) => true,
      (from, to) if to.is_terminal() && !from.is_terminal() => true,
      _ => false,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Running => "running",
      Self::Success => "success",
      Self::Failed => "failed",
      Self::Skipped => "skipped",
    }
  }
}

impl fmt::Display for ExtractionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Error truncation ────────────────────────────────────────────────────────

/// Upper bound on a stored error message. Keeps the audit table bounded even
/// when a collaborator produces a pathological message.
pub const ERROR_MESSAGE_MAX: usize = 2000;

/// Truncate `message` to [`ERROR_MESSAGE_MAX`] bytes on a char boundary.
pub fn truncate_error(message: &str) -> String {
  if message.len() <= ERROR_MESSAGE_MAX {
    return message.to_string();
  }
  let mut end = ERROR_MESSAGE_MAX;
  while !message.is_char_boundary(end) {
    end -= 1;
  }
  message[..end].to_string()
}

// ─── Terminal outcome ────────────────────────────────────────────────────────

/// The single terminal write applied to an audit record. Modelling the three
/// terminal states as variants keeps the counts/message fields attached to
/// the state that defines them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  Success {
    rows_extracted: i64,
    rows_loaded:    i64,
    source_url:     Option<String>,
  },
  Failed {
    /// Truncated by the store on write; callers may pass the full message.
    error:      String,
    source_url: Option<String>,
  },
  Skipped { source_url: Option<String> },
}

impl Outcome {
  pub fn status(&self) -> ExtractionStatus {
    match self {
      Self::Success { .. } => ExtractionStatus::Success,
      Self::Failed { .. } => ExtractionStatus::Failed,
      Self::Skipped { .. } => ExtractionStatus::Skipped,
    }
  }
}

// ─── Audit row ───────────────────────────────────────────────────────────────

/// Provenance record for one extraction attempt. `dataset_code` loosely
/// correlates to `Indicator::dataset_code` values but is not a foreign key —
/// audit is per-run, not per-row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
  pub id:                i64,
  pub dataset_code:      String,
  pub source:            String,
  pub extraction_status: ExtractionStatus,
  /// Run identifier from the external orchestrator, for cross-referencing.
  pub flow_run_id:       Option<String>,
  pub rows_extracted:    Option<i64>,
  pub rows_loaded:       Option<i64>,
  pub error_message:     Option<String>,
  /// API endpoint or file URL that was fetched.
  pub source_url:        Option<String>,
  pub extracted_at:      Option<DateTime<Utc>>,
  pub loaded_at:         Option<DateTime<Utc>>,
  pub created_at:        DateTime<Utc>,
}

impl DatasetMetadata {
  pub fn is_terminal(&self) -> bool { self.extraction_status.is_terminal() }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
