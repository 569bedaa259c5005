//! Geography reference data: the LSOA → MSOA → LAD → Region hierarchy.
//!
//! Loaded once from an ONS Open Geography release and treated as read-only by
//! every other component. A refresh is a full atomic replace, never an
//! incremental patch — the hierarchy can be redefined between releases.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ─── Canonical district list ─────────────────────────────────────────────────

/// The 22 Local Authority Districts that make up the Yorkshire & Humber
/// region in scope (ONS December 2021 geography release). Overridable through
/// configuration, e.g. for tests.
pub const YORKSHIRE_LAD_CODES: [&str; 22] = [
  // West Yorkshire
  "E08000032", // Bradford
  "E08000033", // Calderdale
  "E08000034", // Kirklees
  "E08000035", // Leeds
  "E08000036", // Wakefield
  // South Yorkshire
  "E08000016", // Barnsley
  "E08000017", // Doncaster
  "E08000018", // Rotherham
  "E08000019", // Sheffield
  // East Riding / Hull
  "E06000010", // East Riding of Yorkshire
  "E06000011", // Kingston upon Hull
  // North Yorkshire / York
  "E06000065", // North Yorkshire
  "E06000014", // York
  // Humber
  "E06000012", // North East Lincolnshire
  "E06000013", // North Lincolnshire
  // Ceremonial-county districts retained for completeness
  "E07000163", // Craven
  "E07000164", // Hambleton
  "E07000165", // Harrogate
  "E07000166", // Richmondshire
  "E07000167", // Ryedale
  "E07000168", // Scarborough
  "E07000169", // Selby
];

// ─── Lookup row ──────────────────────────────────────────────────────────────

/// One row of the geography hierarchy, keyed by LSOA code. Every LSOA maps to
/// exactly one LAD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoLookupRow {
  /// Lower Super Output Area GSS code, e.g. `"E01000001"`. Primary key.
  pub lsoa_code:   String,
  pub lsoa_name:   String,
  /// Middle Super Output Area GSS code, e.g. `"E02000001"`.
  pub msoa_code:   String,
  pub msoa_name:   String,
  pub lad_code:    String,
  pub lad_name:    String,
  /// `None` for districts with no parent region in the hierarchy
  /// (e.g. unitary authorities outside standard regions).
  pub region_code: Option<String>,
  pub region_name: Option<String>,
}

// ─── In-memory index ─────────────────────────────────────────────────────────

/// Read-only in-memory view of the lookup, built once per run. Maps an LSOA
/// code to its district.
#[derive(Debug, Clone, Default)]
pub struct GeoIndex {
  by_lsoa: HashMap<String, (String, String)>,
}

impl GeoIndex {
  pub fn from_rows(rows: impl IntoIterator<Item = GeoLookupRow>) -> Self {
    let by_lsoa = rows
      .into_iter()
      .map(|row| (row.lsoa_code, (row.lad_code, row.lad_name)))
      .collect();
    Self { by_lsoa }
  }

  /// `(lad_code, lad_name)` for an LSOA code, or `None` if the code is not in
  /// the loaded release.
  pub fn lad_for(&self, lsoa_code: &str) -> Option<(&str, &str)> {
    self
      .by_lsoa
      .get(lsoa_code)
      .map(|(code, name)| (code.as_str(), name.as_str()))
  }

  pub fn len(&self) -> usize { self.by_lsoa.len() }

  pub fn is_empty(&self) -> bool { self.by_lsoa.is_empty() }
}
