//! The shared five-stage run sequence with the audit lifecycle woven in.
//!
//! Every pipeline run opens an audit record first, then executes
//! extract → validate → normalise → [aggregate] → upsert, and finishes with
//! exactly one terminal audit write on every exit path, success or failure.

use std::time::Duration;

use chrono::NaiveDate;
use ridings_core::{
  audit::{ExtractionStatus, Outcome},
  geo::YORKSHIRE_LAD_CODES,
  store::Warehouse,
};
use ridings_transform::{
  aggregate::aggregate_to_lad,
  normalise::{normalise_to_indicator, records_from_aggregates},
  validate::{LadCoverage, validate_schema, validate_yorkshire_lads},
};
use uuid::Uuid;

use crate::{
  Error, Result,
  def::{PipelineDef, Shape},
  extract::{Extractor, with_retry},
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Per-run parameters shared by every pipeline.
#[derive(Debug, Clone)]
pub struct RunOptions {
  /// The period the loaded records describe; part of the upsert key.
  pub reference_period: NaiveDate,
  /// Orchestrator correlation id. Generated when absent.
  pub flow_run_id:      Option<String>,
  /// LAD codes the completeness check expects to see.
  pub expected_lads:    Vec<String>,
  /// Extraction attempts before giving up. Minimum 1.
  pub retry_attempts:   u32,
  pub retry_delay:      Duration,
}

impl RunOptions {
  pub fn for_period(reference_period: NaiveDate) -> Self {
    Self {
      reference_period,
      flow_run_id: None,
      expected_lads: YORKSHIRE_LAD_CODES.iter().map(|s| s.to_string()).collect(),
      retry_attempts: 3,
      retry_delay: Duration::from_secs(2),
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// What one run did, for operators and the CLI.
#[derive(Debug, Clone)]
pub struct RunReport {
  pub audit_id:       i64,
  pub status:         ExtractionStatus,
  pub rows_extracted: u64,
  pub rows_loaded:    u64,
  /// District completeness, for LAD-level extracts only.
  pub coverage:       Option<LadCoverage>,
  /// Sub-LAD rows dropped because their geography was not in the lookup.
  pub unmatched_geo:  usize,
  /// Sub-LAD rows dropped because their value or weight was suppressed.
  pub suppressed:     usize,
}

// ─── Runner ──────────────────────────────────────────────────────────────────

enum StageOutcome {
  Skipped {
    source_url: Option<String>,
  },
  Loaded {
    rows_extracted: u64,
    rows_loaded:    u64,
    coverage:       Option<LadCoverage>,
    unmatched_geo:  usize,
    suppressed:     usize,
    source_url:     Option<String>,
  },
}

/// Closes the audit record if the run future is dropped mid-flight.
///
/// A normal exit defuses the guard once its terminal write has been
/// attempted. An abort (orchestrator cancellation, task drop at an await
/// point) leaves it armed, and `Drop` spawns a best-effort `Failed` write so
/// the record does not sit in `Running` forever.
struct AuditGuard<W: Warehouse + Clone + 'static> {
  store:    W,
  audit_id: i64,
  armed:    bool,
}

impl<W: Warehouse + Clone + 'static> AuditGuard<W> {
  fn new(store: W, audit_id: i64) -> Self {
    Self { store, audit_id, armed: true }
  }

  fn defuse(&mut self) { self.armed = false; }
}

impl<W: Warehouse + Clone + 'static> Drop for AuditGuard<W> {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    let store = self.store.clone();
    let audit_id = self.audit_id;
    // Drop runs synchronously, so the write has to happen on a task. With
    // the runtime itself already gone there is nowhere to run it, and the
    // record surfaces through the stuck-run query instead.
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
      tracing::error!(audit_id, "no runtime for terminal audit write after abort");
      return;
    };
    handle.spawn(async move {
      let outcome = Outcome::Failed {
        error:      "run aborted before completion".to_string(),
        source_url: None,
      };
      match store.mark_terminal(audit_id, outcome).await {
        Ok(()) => tracing::warn!(audit_id, "run aborted; audit closed as failed"),
        Err(error) => {
          tracing::error!(audit_id, %error, "terminal audit write failed after abort");
        }
      }
    });
  }
}

fn store_err<E>(error: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(error))
}

/// Run one pipeline end to end.
///
/// The audit record is opened before the stages start and closed with exactly
/// one terminal write regardless of how the stages end. If this future is
/// dropped mid-flight, [`AuditGuard`] spawns the `Failed` write instead. If a
/// terminal write fails on the failure path, the stage error still wins; the
/// audit defect is logged and the record surfaces later through the stuck-run
/// query.
pub async fn run_pipeline<W, E>(
  store: &W,
  def: &PipelineDef,
  extractor: &E,
  opts: &RunOptions,
) -> Result<RunReport>
where
  W: Warehouse + Clone + 'static,
  E: Extractor,
{
  let flow_run_id = opts
    .flow_run_id
    .clone()
    .unwrap_or_else(|| Uuid::new_v4().to_string());

  tracing::info!(
    pipeline = def.name,
    dataset = def.dataset_code,
    source = def.source,
    period = %opts.reference_period,
    flow_run_id,
    "pipeline run starting"
  );

  let audit_id = store
    .create_audit(def.dataset_code, def.source, Some(flow_run_id))
    .await
    .map_err(store_err)?;
  let mut guard = AuditGuard::new(store.clone(), audit_id);

  match execute_stages(store, def, extractor, opts, audit_id).await {
    Ok(StageOutcome::Skipped { source_url }) => {
      store
        .mark_terminal(audit_id, Outcome::Skipped { source_url })
        .await
        .map_err(store_err)?;
      guard.defuse();
      tracing::info!(pipeline = def.name, audit_id, "no new data; run skipped");
      Ok(RunReport {
        audit_id,
        status: ExtractionStatus::Skipped,
        rows_extracted: 0,
        rows_loaded: 0,
        coverage: None,
        unmatched_geo: 0,
        suppressed: 0,
      })
    }
    Ok(StageOutcome::Loaded {
      rows_extracted,
      rows_loaded,
      coverage,
      unmatched_geo,
      suppressed,
      source_url,
    }) => {
      store
        .mark_terminal(
          audit_id,
          Outcome::Success {
            rows_extracted: rows_extracted as i64,
            rows_loaded: rows_loaded as i64,
            source_url,
          },
        )
        .await
        .map_err(store_err)?;
      guard.defuse();
      tracing::info!(
        pipeline = def.name,
        audit_id,
        rows_extracted,
        rows_loaded,
        "pipeline run succeeded"
      );
      Ok(RunReport {
        audit_id,
        status: ExtractionStatus::Success,
        rows_extracted,
        rows_loaded,
        coverage,
        unmatched_geo,
        suppressed,
      })
    }
    Err(error) => {
      tracing::error!(pipeline = def.name, audit_id, %error, "pipeline run failed");
      let failed = Outcome::Failed { error: error.to_string(), source_url: None };
      if let Err(audit_error) = store.mark_terminal(audit_id, failed).await {
        tracing::error!(audit_id, %audit_error, "terminal audit write failed");
      }
      guard.defuse();
      Err(error)
    }
  }
}

async fn execute_stages<W, E>(
  store: &W,
  def: &PipelineDef,
  extractor: &E,
  opts: &RunOptions,
  audit_id: i64,
) -> Result<StageOutcome>
where
  W: Warehouse,
  E: Extractor,
{
  store.mark_running(audit_id).await.map_err(store_err)?;

  let extracted =
    with_retry(opts.retry_attempts, opts.retry_delay, || extractor.extract())
      .await
      .map_err(Error::Extract)?;

  let Some(extracted) = extracted else {
    return Ok(StageOutcome::Skipped { source_url: None });
  };

  let table = extracted.table;
  let source_url = extracted.source_url;
  let rows_extracted = table.rows.len() as u64;

  validate_schema(&table, def.required_columns, def.source)?;

  let meta = def.meta(opts.reference_period);
  let (records, coverage, unmatched_geo, suppressed) = match &def.shape {
    Shape::LadLevel { columns } => {
      let coverage =
        validate_yorkshire_lads(&table, columns.lad_code, &opts.expected_lads)?;
      let records = normalise_to_indicator(&table, &meta, &columns.to_mapping())?;
      (records, Some(coverage), 0, 0)
    }
    Shape::LsoaLevel { geo_column, value_column, policy } => {
      let index = store.load_geo_index().await.map_err(store_err)?;
      let aggregation =
        aggregate_to_lad(&table, value_column, geo_column, &index, policy)?;
      let records = records_from_aggregates(&aggregation, &meta);
      (records, None, aggregation.unmatched, aggregation.suppressed)
    }
  };

  let rows_loaded = store
    .upsert_indicators(records, def.dataset_code)
    .await
    .map_err(store_err)?;

  Ok(StageOutcome::Loaded {
    rows_extracted,
    rows_loaded,
    coverage,
    unmatched_geo,
    suppressed,
    source_url,
  })
}
