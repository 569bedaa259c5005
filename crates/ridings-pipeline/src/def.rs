//! The static pipeline catalog.
//!
//! Every domain pipeline is the same five-stage sequence over different data;
//! what varies is pure configuration, captured here as one [`PipelineDef`]
//! per dataset. Adding a pipeline means adding an entry, not writing code.

use ridings_transform::{
  aggregate::Aggregation,
  normalise::{ColumnMapping, IndicatorMeta},
};

use crate::{Error, Result};

// ─── Shapes ──────────────────────────────────────────────────────────────────

/// Source columns for a LAD-level extract.
#[derive(Debug, Clone, Copy)]
pub struct Columns {
  pub lad_code: &'static str,
  pub lad_name: &'static str,
  pub value:    &'static str,
}

impl Columns {
  pub fn to_mapping(self) -> ColumnMapping {
    ColumnMapping {
      lad_code: self.lad_code.to_string(),
      lad_name: self.lad_name.to_string(),
      value:    self.value.to_string(),
    }
  }
}

/// The geographic grain of a source extract, which decides whether the
/// aggregation stage runs.
#[derive(Debug, Clone)]
pub enum Shape {
  /// Rows already arrive at district level; normalisation is a plain rename.
  LadLevel { columns: Columns },
  /// Rows arrive at LSOA level and are rolled up to districts under an
  /// explicit policy before loading.
  LsoaLevel {
    geo_column:   &'static str,
    value_column: &'static str,
    policy:       Aggregation,
  },
}

// ─── Definition ──────────────────────────────────────────────────────────────

/// One dataset's pipeline, fully described by data.
#[derive(Debug, Clone)]
pub struct PipelineDef {
  /// CLI-facing name, e.g. `"claimant_count"`.
  pub name:             &'static str,
  pub dataset_code:     &'static str,
  /// Source system identifier, e.g. `"nomis"`.
  pub source:           &'static str,
  pub indicator_id:     &'static str,
  pub indicator_name:   &'static str,
  pub unit:             Option<&'static str>,
  /// Columns that must exist in the raw extract before anything else runs.
  pub required_columns: &'static [&'static str],
  pub shape:            Shape,
}

impl PipelineDef {
  /// The constant metadata stamped onto every record this pipeline loads.
  pub fn meta(
    &self,
    reference_period: chrono::NaiveDate,
  ) -> IndicatorMeta {
    IndicatorMeta {
      indicator_id: self.indicator_id.to_string(),
      indicator_name: self.indicator_name.to_string(),
      source: self.source.to_string(),
      dataset_code: self.dataset_code.to_string(),
      reference_period,
      unit: self.unit.map(str::to_string),
    }
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

fn lad(lad_code: &'static str, lad_name: &'static str, value: &'static str) -> Shape {
  Shape::LadLevel { columns: Columns { lad_code, lad_name, value } }
}

/// All registered pipelines.
pub fn catalog() -> Vec<PipelineDef> {
  vec![
    PipelineDef {
      name:             "employment_jobs",
      dataset_code:     "bres",
      source:           "nomis",
      indicator_id:     "employee_jobs",
      indicator_name:   "Employee jobs",
      unit:             Some("count"),
      required_columns: &["lad_code", "lad_name", "obs_value"],
      shape:            lad("lad_code", "lad_name", "obs_value"),
    },
    PipelineDef {
      name:             "claimant_count",
      dataset_code:     "ucjsa",
      source:           "dwp",
      indicator_id:     "claimant_rate",
      indicator_name:   "Claimant count rate",
      unit:             Some("rate"),
      required_columns: &["area_code", "area_name", "metric"],
      shape:            lad("area_code", "area_name", "metric"),
    },
    PipelineDef {
      name:             "business_demography",
      dataset_code:     "business_demography",
      source:           "ons",
      indicator_id:     "business_births",
      indicator_name:   "Business births",
      unit:             Some("count"),
      required_columns: &["lad_code", "lad_name", "births"],
      shape:            lad("lad_code", "lad_name", "births"),
    },
    PipelineDef {
      name:             "gdp_gva",
      dataset_code:     "regional_gva",
      source:           "ons",
      indicator_id:     "gva_balanced",
      indicator_name:   "Balanced gross value added",
      unit:             Some("gbp_million"),
      required_columns: &["lad_code", "lad_name", "gva"],
      shape:            lad("lad_code", "lad_name", "gva"),
    },
    PipelineDef {
      name:             "air_quality",
      dataset_code:     "aurn_no2",
      source:           "defra",
      indicator_id:     "no2_annual_mean",
      indicator_name:   "Nitrogen dioxide annual mean",
      unit:             Some("ug_m3"),
      required_columns: &["lsoa_code", "no2"],
      shape:            Shape::LsoaLevel {
        geo_column:   "lsoa_code",
        value_column: "no2",
        policy:       Aggregation::Mean,
      },
    },
    PipelineDef {
      name:             "energy_consumption",
      dataset_code:     "subnational_energy",
      source:           "beis",
      indicator_id:     "domestic_energy_gwh",
      indicator_name:   "Domestic energy consumption",
      unit:             Some("gwh"),
      required_columns: &["lad_code", "lad_name", "consumption_gwh"],
      shape:            lad("lad_code", "lad_name", "consumption_gwh"),
    },
    PipelineDef {
      name:             "crime_statistics",
      dataset_code:     "recorded_crime",
      source:           "ons",
      indicator_id:     "recorded_offences",
      indicator_name:   "Recorded offences",
      unit:             Some("count"),
      required_columns: &["lsoa_code", "offences"],
      shape:            Shape::LsoaLevel {
        geo_column:   "lsoa_code",
        value_column: "offences",
        policy:       Aggregation::Sum,
      },
    },
    PipelineDef {
      name:             "deprivation_imd",
      dataset_code:     "imd2019",
      source:           "ons",
      indicator_id:     "imd_score",
      indicator_name:   "Index of Multiple Deprivation score",
      unit:             Some("score"),
      required_columns: &["lsoa_code", "imd_score", "population"],
      shape:            Shape::LsoaLevel {
        geo_column:   "lsoa_code",
        value_column: "imd_score",
        policy:       Aggregation::WeightedMean {
          weight_column: "population".to_string(),
        },
      },
    },
    PipelineDef {
      name:             "digital_inclusion",
      dataset_code:     "connected_nations",
      source:           "ofcom",
      indicator_id:     "gigabit_availability",
      indicator_name:   "Gigabit broadband availability",
      unit:             Some("percent"),
      required_columns: &["lad_code", "lad_name", "gigabit_pct"],
      shape:            lad("lad_code", "lad_name", "gigabit_pct"),
    },
    PipelineDef {
      name:             "education_attainment",
      dataset_code:     "ks4_attainment",
      source:           "ons",
      indicator_id:     "attainment8_score",
      indicator_name:   "Average Attainment 8 score",
      unit:             Some("score"),
      required_columns: &["lad_code", "lad_name", "attainment8"],
      shape:            lad("lad_code", "lad_name", "attainment8"),
    },
    PipelineDef {
      name:             "health_outcomes",
      dataset_code:     "phof",
      source:           "fingertips",
      indicator_id:     "healthy_life_expectancy",
      indicator_name:   "Healthy life expectancy at birth",
      unit:             Some("years"),
      required_columns: &["area_code", "area_name", "value"],
      shape:            lad("area_code", "area_name", "value"),
    },
    PipelineDef {
      name:             "housing_tenure",
      dataset_code:     "census_tenure",
      source:           "ons",
      indicator_id:     "owner_occupied_pct",
      indicator_name:   "Owner-occupied households",
      unit:             Some("percent"),
      required_columns: &["lad_code", "lad_name", "owner_occupied_pct"],
      shape:            lad("lad_code", "lad_name", "owner_occupied_pct"),
    },
    PipelineDef {
      name:             "physical_activity",
      dataset_code:     "active_lives",
      source:           "sport_england",
      indicator_id:     "active_adults_pct",
      indicator_name:   "Physically active adults",
      unit:             Some("percent"),
      required_columns: &["lad_code", "lad_name", "active_pct"],
      shape:            lad("lad_code", "lad_name", "active_pct"),
    },
  ]
}

/// Look up a pipeline by its CLI-facing name.
pub fn find_pipeline(name: &str) -> Result<PipelineDef> {
  catalog()
    .into_iter()
    .find(|def| def.name == name)
    .ok_or_else(|| Error::UnknownPipeline(name.to_string()))
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeSet;

  use super::*;

  #[test]
  fn names_and_indicator_ids_are_unique() {
    let defs = catalog();
    let names: BTreeSet<_> = defs.iter().map(|d| d.name).collect();
    let indicators: BTreeSet<_> = defs.iter().map(|d| d.indicator_id).collect();
    assert_eq!(names.len(), defs.len());
    assert_eq!(indicators.len(), defs.len());
  }

  #[test]
  fn lookup_by_name() {
    let def = find_pipeline("claimant_count").unwrap();
    assert_eq!(def.source, "dwp");
    assert!(matches!(
      find_pipeline("nope"),
      Err(Error::UnknownPipeline(name)) if name == "nope"
    ));
  }

  #[test]
  fn lsoa_pipelines_require_their_aggregation_columns() {
    for def in catalog() {
      if let Shape::LsoaLevel { geo_column, value_column, policy } = &def.shape {
        assert!(def.required_columns.contains(geo_column));
        assert!(def.required_columns.contains(value_column));
        if let Aggregation::WeightedMean { weight_column } = policy {
          assert!(def.required_columns.contains(&weight_column.as_str()));
        }
      }
    }
  }
}
