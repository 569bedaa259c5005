//! SQL schema for the ridings SQLite warehouse.
//!
//! Executed once at connection startup. Future migrations are gated on
//! `PRAGMA user_version` and must be additive only — historical audit rows
//! are never rewritten.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS indicator (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    indicator_id     TEXT NOT NULL,
    indicator_name   TEXT NOT NULL,
    lad_code         TEXT NOT NULL,   -- ONS GSS code, 9 chars
    lad_name         TEXT NOT NULL,
    reference_period TEXT NOT NULL,   -- ISO 8601 date; first day of period
    value            REAL,            -- NULL = disclosure suppression
    unit             TEXT,
    source           TEXT,
    dataset_code     TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

-- The upsert key. The autoincrement id above never drives matching.
CREATE UNIQUE INDEX IF NOT EXISTS indicator_upsert_key
    ON indicator(indicator_id, lad_code, reference_period);

-- Audit trail: one row per extraction attempt, immutable once terminal.
CREATE TABLE IF NOT EXISTS dataset_metadata (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    dataset_code      TEXT NOT NULL,
    source            TEXT NOT NULL,
    extraction_status TEXT NOT NULL DEFAULT 'pending',
    flow_run_id       TEXT,            -- external orchestrator run id
    rows_extracted    INTEGER,
    rows_loaded       INTEGER,
    error_message     TEXT,            -- truncated before write
    source_url        TEXT,
    extracted_at      TEXT,
    loaded_at         TEXT,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS dataset_metadata_status_idx
    ON dataset_metadata(extraction_status);
CREATE INDEX IF NOT EXISTS dataset_metadata_created_idx
    ON dataset_metadata(created_at);

-- Geography hierarchy, read-only between full-replace refreshes.
CREATE TABLE IF NOT EXISTS geo_lookup (
    lsoa_code   TEXT PRIMARY KEY,
    lsoa_name   TEXT NOT NULL,
    msoa_code   TEXT NOT NULL,
    msoa_name   TEXT NOT NULL,
    lad_code    TEXT NOT NULL,
    lad_name    TEXT NOT NULL,
    region_code TEXT,
    region_name TEXT
);

CREATE INDEX IF NOT EXISTS geo_lookup_lad_idx  ON geo_lookup(lad_code);
CREATE INDEX IF NOT EXISTS geo_lookup_msoa_idx ON geo_lookup(msoa_code);

PRAGMA user_version = 1;
";
