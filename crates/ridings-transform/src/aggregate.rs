//! Geo aggregation: roll fine-grained (LSOA-level) rows up to LAD level.
//!
//! Every record joins to the loaded [`GeoIndex`] on its LSOA code. Records
//! with no match are dropped but counted — a rising unmatched count means the
//! geo lookup is stale against the source's geography release.

use std::collections::BTreeMap;

use ridings_core::{geo::GeoIndex, table::RawTable};

use crate::{Error, Result, cell::numeric_cell};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How values are reduced per district. Always explicit per call — sum for
/// counts, a mean for rates — because inferring the policy risks silently
/// wrong statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
  Sum,
  Mean,
  /// Population-weighted (or otherwise weighted) mean; the weight column is
  /// read per input row.
  WeightedMean { weight_column: String },
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LadAggregate {
  pub lad_code: String,
  pub lad_name: String,
  pub value:    f64,
}

/// Result of one aggregation pass. Districts with zero matched rows are
/// absent from `rows`, never present with a null or zero value.
#[derive(Debug, Clone, Default)]
pub struct LadAggregation {
  /// One row per district, sorted by LAD code.
  pub rows:       Vec<LadAggregate>,
  /// Input rows whose geography code had no entry in the lookup.
  pub unmatched:  usize,
  /// Matched rows dropped because their value (or weight) was suppressed.
  pub suppressed: usize,
}

// ─── Aggregate ───────────────────────────────────────────────────────────────

/// Join `table` to the geo lookup on `geo_column` and reduce `value_column`
/// per district under the given policy.
pub fn aggregate_to_lad(
  table: &RawTable,
  value_column: &str,
  geo_column: &str,
  index: &GeoIndex,
  policy: &Aggregation,
) -> Result<LadAggregation> {
  for column in [geo_column, value_column] {
    if !table.has_column(column) {
      return Err(Error::MissingColumn { column: column.to_string() });
    }
  }
  if let Aggregation::WeightedMean { weight_column } = policy
    && !table.has_column(weight_column)
  {
    return Err(Error::MissingColumn { column: weight_column.clone() });
  }

  // lad_code -> (lad_name, [(value, weight)])
  let mut groups: BTreeMap<String, (String, Vec<(f64, f64)>)> = BTreeMap::new();
  let mut unmatched = 0usize;
  let mut suppressed = 0usize;

  for row in &table.rows {
    let Some(lsoa_code) = row.get(geo_column).and_then(|v| v.as_str()) else {
      unmatched += 1;
      continue;
    };
    let Some((lad_code, lad_name)) = index.lad_for(lsoa_code) else {
      unmatched += 1;
      continue;
    };

    let Some(value) = numeric_cell(value_column, &row[value_column])? else {
      suppressed += 1;
      continue;
    };

    let weight = match policy {
      Aggregation::WeightedMean { weight_column } => {
        match numeric_cell(weight_column, &row[weight_column])? {
          Some(w) => w,
          None => {
            suppressed += 1;
            continue;
          }
        }
      }
      _ => 1.0,
    };

    groups
      .entry(lad_code.to_string())
      .or_insert_with(|| (lad_name.to_string(), Vec::new()))
      .1
      .push((value, weight));
  }

  if unmatched > 0 {
    tracing::warn!(
      unmatched,
      geo_column,
      "rows dropped with no geo lookup match; the lookup may be stale"
    );
  }

  let mut rows = Vec::with_capacity(groups.len());
  for (lad_code, (lad_name, samples)) in groups {
    let value = match policy {
      Aggregation::Sum => samples.iter().map(|(v, _)| v).sum(),
      Aggregation::Mean => {
        samples.iter().map(|(v, _)| v).sum::<f64>() / samples.len() as f64
      }
      Aggregation::WeightedMean { .. } => {
        let total_weight: f64 = samples.iter().map(|(_, w)| w).sum();
        if total_weight == 0.0 {
          tracing::warn!(lad_code, "district omitted: weights sum to zero");
          continue;
        }
        samples.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight
      }
    };
    rows.push(LadAggregate { lad_code, lad_name, value });
  }

  Ok(LadAggregation { rows, unmatched, suppressed })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use ridings_core::{geo::GeoLookupRow, table::RawRow};
  use serde_json::json;

  use super::*;

  fn lookup() -> GeoIndex {
    let row = |lsoa: &str, lad_code: &str, lad_name: &str| GeoLookupRow {
      lsoa_code:   lsoa.into(),
      lsoa_name:   format!("{lsoa} name"),
      msoa_code:   "E02000001".into(),
      msoa_name:   "MSOA".into(),
      lad_code:    lad_code.into(),
      lad_name:    lad_name.into(),
      region_code: Some("E12000003".into()),
      region_name: Some("Yorkshire and The Humber".into()),
    };
    GeoIndex::from_rows([
      row("E01000001", "E08000035", "Leeds"),
      row("E01000002", "E08000035", "Leeds"),
      row("E01000003", "E08000032", "Bradford"),
    ])
  }

  fn table(rows: &[serde_json::Value]) -> RawTable {
    RawTable::new(
      rows
        .iter()
        .map(|v| match v {
          serde_json::Value::Object(map) => map.clone(),
          _ => panic!("expected object"),
        })
        .collect::<Vec<RawRow>>(),
    )
  }

  #[test]
  fn sum_rolls_up_to_one_row_per_district() {
    let t = table(&[
      json!({"lsoa_code": "E01000001", "count": 10.0}),
      json!({"lsoa_code": "E01000002", "count": 20.0}),
      json!({"lsoa_code": "E01000003", "count": 5.0}),
    ]);

    let result =
      aggregate_to_lad(&t, "count", "lsoa_code", &lookup(), &Aggregation::Sum).unwrap();

    assert_eq!(result.unmatched, 0);
    assert_eq!(result.rows.len(), 2);
    // Sorted by LAD code: Bradford (E08000032) before Leeds (E08000035).
    assert_eq!(result.rows[0].lad_code, "E08000032");
    assert_eq!(result.rows[0].value, 5.0);
    assert_eq!(result.rows[1].lad_code, "E08000035");
    assert_eq!(result.rows[1].lad_name, "Leeds");
    assert_eq!(result.rows[1].value, 30.0);
  }

  #[test]
  fn unknown_lsoa_is_dropped_and_counted() {
    let t = table(&[
      json!({"lsoa_code": "E01000001", "count": 10.0}),
      json!({"lsoa_code": "E01999999", "count": 99.0}),
    ]);

    let result =
      aggregate_to_lad(&t, "count", "lsoa_code", &lookup(), &Aggregation::Sum).unwrap();

    assert_eq!(result.unmatched, 1);
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0].value, 10.0);
  }

  #[test]
  fn zero_match_district_is_absent_not_zero() {
    // Only Leeds LSOAs in the input; Bradford must not appear at all.
    let t = table(&[json!({"lsoa_code": "E01000001", "count": 1.0})]);
    let result =
      aggregate_to_lad(&t, "count", "lsoa_code", &lookup(), &Aggregation::Sum).unwrap();
    assert!(result.rows.iter().all(|r| r.lad_code != "E08000032"));
  }

  #[test]
  fn suppressed_values_are_dropped_and_counted() {
    let t = table(&[
      json!({"lsoa_code": "E01000001", "count": 10.0}),
      json!({"lsoa_code": "E01000002", "count": null}),
    ]);

    let result =
      aggregate_to_lad(&t, "count", "lsoa_code", &lookup(), &Aggregation::Sum).unwrap();
    assert_eq!(result.suppressed, 1);
    assert_eq!(result.rows[0].value, 10.0);
  }

  #[test]
  fn mean_and_weighted_mean() {
    let t = table(&[
      json!({"lsoa_code": "E01000001", "rate": 10.0, "population": 1000.0}),
      json!({"lsoa_code": "E01000002", "rate": 20.0, "population": 3000.0}),
    ]);

    let mean =
      aggregate_to_lad(&t, "rate", "lsoa_code", &lookup(), &Aggregation::Mean).unwrap();
    assert_eq!(mean.rows[0].value, 15.0);

    let weighted = aggregate_to_lad(
      &t,
      "rate",
      "lsoa_code",
      &lookup(),
      &Aggregation::WeightedMean { weight_column: "population".into() },
    )
    .unwrap();
    // (10*1000 + 20*3000) / 4000 = 17.5
    assert_eq!(weighted.rows[0].value, 17.5);
  }

  #[test]
  fn missing_weight_column_is_an_error() {
    let t = table(&[json!({"lsoa_code": "E01000001", "rate": 10.0})]);
    let err = aggregate_to_lad(
      &t,
      "rate",
      "lsoa_code",
      &lookup(),
      &Aggregation::WeightedMean { weight_column: "population".into() },
    )
    .unwrap_err();
    assert!(matches!(err, Error::MissingColumn { column } if column == "population"));
  }
}
