//! `ridings` — operator CLI for the regional indicator warehouse.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! warehouse, and runs pipelines over saved extract files, manages the
//! geography lookup, and inspects the extraction audit trail.
//!
//! # Usage
//!
//! ```
//! ridings pipelines
//! ridings run claimant_count --input extracts/ucjsa-2024-04.json --period 2024-04-01
//! ridings geo load lookups/lsoa-lad-2021.json
//! ridings audit recent --limit 20
//! ridings audit stuck --hours 6
//! ridings show claimant_rate --lad E08000035
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ridings_core::{audit::DatasetMetadata, geo::GeoLookupRow, store::Warehouse};
use ridings_pipeline::{FileExtractor, RunOptions, catalog, find_pipeline, run_pipeline};
use ridings_store_sqlite::SqliteWarehouse;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ridings", version, about = "Regional indicator warehouse CLI")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// List the registered pipelines.
  Pipelines,

  /// Run one pipeline over a saved extract file.
  Run {
    /// Pipeline name, as shown by `pipelines`.
    pipeline: String,

    /// JSON file holding the raw extract (an array of row objects).
    #[arg(short, long)]
    input: PathBuf,

    /// Reference period of the extract, e.g. 2024-04-01.
    #[arg(short, long)]
    period: NaiveDate,

    /// Orchestrator run id to record on the audit row.
    #[arg(long)]
    run_id: Option<String>,
  },

  /// Manage the LSOA → LAD geography lookup.
  #[command(subcommand)]
  Geo(GeoCommand),

  /// Inspect the extraction audit trail.
  #[command(subcommand)]
  Audit(AuditCommand),

  /// Print loaded values for one indicator.
  Show {
    indicator_id: String,

    /// Restrict to a single district.
    #[arg(long)]
    lad: Option<String>,
  },
}

#[derive(Subcommand)]
enum GeoCommand {
  /// Replace the whole lookup from a JSON file of lookup rows.
  Load { input: PathBuf },
}

#[derive(Subcommand)]
enum AuditCommand {
  /// Most recent extraction attempts, newest first.
  Recent {
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },

  /// Non-terminal attempts older than the given age.
  Stuck {
    #[arg(long, default_value_t = 6)]
    hours: i64,
  },
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Shape of `config.toml`, overridable with `RIDINGS_`-prefixed environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
struct Settings {
  #[serde(default = "default_database_path")]
  database_path: PathBuf,

  /// Override of the canonical in-scope LAD codes, for running against a
  /// different region's data.
  #[serde(default)]
  expected_lads: Option<Vec<String>>,
}

fn default_database_path() -> PathBuf { PathBuf::from("ridings.db") }

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RIDINGS"))
    .build()
    .context("failed to read config file")?;
  let settings: Settings = settings
    .try_deserialize()
    .context("failed to deserialise settings")?;

  let db_path = expand_tilde(&settings.database_path);
  let store = SqliteWarehouse::open(&db_path)
    .await
    .with_context(|| format!("failed to open warehouse at {db_path:?}"))?;

  match cli.command {
    Command::Pipelines => list_pipelines(),
    Command::Run { pipeline, input, period, run_id } => {
      run(&store, &settings, &pipeline, input, period, run_id).await?
    }
    Command::Geo(GeoCommand::Load { input }) => geo_load(&store, input).await?,
    Command::Audit(AuditCommand::Recent { limit }) => {
      for audit in store.recent_audits(limit).await? {
        print_audit(&audit);
      }
    }
    Command::Audit(AuditCommand::Stuck { hours }) => {
      let cutoff = Utc::now() - Duration::hours(hours);
      let stuck = store.stuck_audits(cutoff).await?;
      if stuck.is_empty() {
        println!("no stuck runs older than {hours}h");
      }
      for audit in stuck {
        print_audit(&audit);
      }
    }
    Command::Show { indicator_id, lad } => {
      for row in store.list_indicators(&indicator_id, lad.as_deref()).await? {
        println!(
          "{}  {}  {}  {}",
          row.lad_code,
          row.reference_period,
          match row.value {
            Some(v) => format!("{v}"),
            None => "suppressed".to_string(),
          },
          row.lad_name,
        );
      }
    }
  }

  Ok(())
}

// ─── Subcommands ─────────────────────────────────────────────────────────────

fn list_pipelines() {
  for def in catalog() {
    println!(
      "{:<22} {:<14} {}",
      def.name, def.source, def.indicator_name
    );
  }
}

async fn run(
  store: &SqliteWarehouse,
  settings: &Settings,
  pipeline: &str,
  input: PathBuf,
  period: NaiveDate,
  run_id: Option<String>,
) -> anyhow::Result<()> {
  let def =
    find_pipeline(pipeline).context("see `ridings pipelines` for the registered names")?;

  let mut opts = RunOptions::for_period(period);
  opts.flow_run_id = run_id;
  if let Some(lads) = &settings.expected_lads {
    opts.expected_lads = lads.clone();
  }

  let extractor = FileExtractor::new(input);
  let report = run_pipeline(store, &def, &extractor, &opts)
    .await
    .with_context(|| format!("pipeline {pipeline} failed"))?;

  println!(
    "{}: {} (audit #{}) — extracted {}, loaded {}",
    def.name, report.status, report.audit_id, report.rows_extracted, report.rows_loaded,
  );
  if let Some(coverage) = &report.coverage
    && !coverage.is_complete()
  {
    println!(
      "coverage: {} district(s) missing, {} out of scope",
      coverage.missing.len(),
      coverage.unexpected.len(),
    );
  }
  if report.unmatched_geo > 0 || report.suppressed > 0 {
    println!(
      "aggregation: {} row(s) unmatched, {} suppressed",
      report.unmatched_geo, report.suppressed,
    );
  }

  Ok(())
}

async fn geo_load(store: &SqliteWarehouse, input: PathBuf) -> anyhow::Result<()> {
  let raw = tokio::fs::read_to_string(&input)
    .await
    .with_context(|| format!("reading lookup file {}", input.display()))?;
  let rows: Vec<GeoLookupRow> =
    serde_json::from_str(&raw).context("parsing lookup file")?;

  let count = store.replace_geo_lookup(rows).await?;
  println!("geography lookup replaced: {count} rows");
  Ok(())
}

fn print_audit(audit: &DatasetMetadata) {
  println!(
    "#{:<5} {:<8} {:<22} {:<12} {}  loaded={}  {}",
    audit.id,
    audit.extraction_status,
    audit.dataset_code,
    audit.source,
    audit.created_at.format("%Y-%m-%d %H:%M"),
    audit
      .rows_loaded
      .map(|n| n.to_string())
      .unwrap_or_else(|| "-".to_string()),
    audit.error_message.as_deref().unwrap_or(""),
  );
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
