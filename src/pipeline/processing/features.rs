//! Joins the cleaned datasets and produces the standardized feature matrix.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use ndarray_npy::write_npy;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::app::ports::PipelineEvent;
use crate::constants::{
    COUNTRY, LIFE_EXPECTANCY_FEMALE, LIFE_EXPECTANCY_MALE, LOST_COUNTRIES_CSV, POPULATION_DENSITY,
    SELECTED_FEATURES, TOTAL_GDP, URBAN_POPULATION_ABSOLUTE, URBAN_POPULATION_PERCENTAGE,
};
use crate::error::{PipelineError, Result};
use crate::pipeline::storage::reports::ReportWriter;
use crate::types::{CountryIndex, DemographicsRecord, GdpRecord, PopulationRecord};

/// Populations below this maximum look like they were given in millions.
pub const MIN_PLAUSIBLE_MAX_POPULATION: f64 = 1_000.0;

/// One joined country before scaling. Optional fields are still missing only
/// when the whole column was missing across the joined table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "LifeExpectancy_Both")]
    pub life_expectancy_both: f64,
    #[serde(rename = "LifeExpectancy_Female")]
    pub life_expectancy_female: Option<f64>,
    #[serde(rename = "LifeExpectancy_Male")]
    pub life_expectancy_male: Option<f64>,
    #[serde(rename = "UrbanPopulation_Percentage")]
    pub urban_population_percentage: Option<f64>,
    #[serde(rename = "UrbanPopulation_Absolute")]
    pub urban_population_absolute: Option<f64>,
    #[serde(rename = "PopulationDensity")]
    pub population_density: Option<f64>,
    #[serde(rename = "GDP_per_capita_PPP")]
    pub gdp_per_capita_ppp: f64,
    #[serde(rename = "TotalGDP")]
    pub total_gdp: Option<f64>,
    #[serde(rename = "LogGDPperCapita")]
    pub log_gdp_per_capita: f64,
    #[serde(rename = "Population")]
    pub population: f64,
    #[serde(rename = "LogPopulation")]
    pub log_population: f64,
}

impl MergedRow {
    fn selected(&self) -> [f64; 3] {
        [self.life_expectancy_both, self.log_gdp_per_capita, self.log_population]
    }
}

/// Standardized features, one labelled row per country.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub countries: Vec<String>,
    pub columns: [&'static str; 3],
    pub data: Array2<f64>,
}

impl FeatureMatrix {
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    pub fn column(&self, j: usize) -> ArrayView1<'_, f64> {
        self.data.column(j)
    }
}

/// Everything the feature stage produces.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub matrix: FeatureMatrix,
    /// Joined table sorted by country, before scaling.
    pub merged: Vec<MergedRow>,
    /// Countries present in some input but not in the join, ascending.
    pub lost: Vec<String>,
}

/// Fails fast on structural problems before anything is derived.
pub fn validate_inputs(
    demo: &CountryIndex<DemographicsRecord>,
    gdp: &CountryIndex<GdpRecord>,
    pop: &CountryIndex<PopulationRecord>,
) -> Result<()> {
    let has_empty_key = demo.keys().chain(gdp.keys()).chain(pop.keys()).any(str::is_empty);
    if has_empty_key {
        return Err(PipelineError::Validation(
            "Expected every row to be indexed by a non-empty country name".into(),
        ));
    }

    let max_pop = pop.values().map(|r| r.population).fold(f64::NEG_INFINITY, f64::max);
    if !pop.is_empty() && max_pop < MIN_PLAUSIBLE_MAX_POPULATION {
        return Err(PipelineError::Validation(format!(
            "Population values appear to be in millions (max {max_pop}), expected absolute numbers"
        )));
    }

    if let Some(bad) = gdp.values().find(|r| !(r.gdp_per_capita_ppp > 0.0 && r.gdp_per_capita_ppp.is_finite())) {
        return Err(PipelineError::Validation(format!(
            "GDP per capita contains non-positive values ({}: {})",
            bad.country, bad.gdp_per_capita_ppp
        )));
    }

    if let Some(bad) = pop.values().find(|r| !(r.population > 0.0 && r.population.is_finite())) {
        return Err(PipelineError::Validation(format!(
            "Population contains non-positive values ({}: {})",
            bad.country, bad.population
        )));
    }

    Ok(())
}

/// Derives, joins, imputes, sorts and scales. Pure: nothing is written.
pub fn build_features(
    demo: &CountryIndex<DemographicsRecord>,
    gdp: &CountryIndex<GdpRecord>,
    pop: &CountryIndex<PopulationRecord>,
) -> Result<FeatureSet> {
    validate_inputs(demo, gdp, pop)?;

    // TotalGDP and log transforms, computed per source table before the join
    let gdp_derived: BTreeMap<&str, (Option<f64>, f64)> = gdp
        .values()
        .map(|g| {
            let total = pop.get(&g.country).map(|p| g.gdp_per_capita_ppp * p.population);
            (g.country.as_str(), (total, g.gdp_per_capita_ppp.log10()))
        })
        .collect();
    let log_pop: BTreeMap<&str, f64> = pop
        .values()
        .map(|p| (p.country.as_str(), p.population.log10()))
        .collect();

    // Inner join; CountryIndex iterates in key order so rows come out sorted
    let mut merged = Vec::new();
    for d in demo.values() {
        let (Some(g), Some(p)) = (gdp.get(&d.country), pop.get(&d.country)) else {
            continue;
        };
        let (Some(&(total_gdp, log_gdp)), Some(&log_population)) =
            (gdp_derived.get(d.country.as_str()), log_pop.get(d.country.as_str()))
        else {
            continue;
        };
        merged.push(MergedRow {
            country: d.country.clone(),
            life_expectancy_both: d.life_expectancy_both,
            life_expectancy_female: d.life_expectancy_female,
            life_expectancy_male: d.life_expectancy_male,
            urban_population_percentage: d.urban_population_percentage,
            urban_population_absolute: d.urban_population_absolute,
            population_density: d.population_density,
            gdp_per_capita_ppp: g.gdp_per_capita_ppp,
            total_gdp,
            log_gdp_per_capita: log_gdp,
            population: p.population,
            log_population,
        });
    }

    let joined: BTreeSet<&str> = merged.iter().map(|r| r.country.as_str()).collect();
    let lost: Vec<String> = demo
        .keys()
        .chain(gdp.keys())
        .chain(pop.keys())
        .filter(|c| !joined.contains(c))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();

    if merged.is_empty() {
        return Err(PipelineError::Validation(format!(
            "Inner join retained no countries ({} lost)",
            lost.len()
        )));
    }

    let mut merged = impute_column_means(merged);
    // row order fixes the matrix bytes across runs
    merged.sort_by(|a, b| a.country.cmp(&b.country));

    let matrix = standardize(&merged)?;
    Ok(FeatureSet { matrix, merged, lost })
}

/// Validates, builds and then persists `lost_countries.csv` and `X.npy`.
/// Returns the feature set and the exact bytes written for the matrix.
#[instrument(skip_all, fields(demo = demo.len(), gdp = gdp.len(), pop = pop.len()))]
pub fn build_and_persist(
    demo: &CountryIndex<DemographicsRecord>,
    gdp: &CountryIndex<GdpRecord>,
    pop: &CountryIndex<PopulationRecord>,
    out: &ReportWriter<'_>,
) -> Result<(FeatureSet, Vec<u8>)> {
    let features = build_features(demo, gdp, pop)?;

    out.write_rows(LOST_COUNTRIES_CSV, &[COUNTRY], &features.lost)?;
    out.emit(PipelineEvent::JoinCompleted {
        retained: features.merged.len(),
        lost: features.lost.len(),
    });

    let path: PathBuf = out.paths().feature_matrix();
    let (rows, cols) = features.matrix.shape();
    write_npy(&path, &features.matrix.data)?;
    let bytes = fs::read(&path)?;
    out.emit(PipelineEvent::MatrixWritten { path, rows, cols });

    Ok((features, bytes))
}

type Field = fn(&mut MergedRow) -> &mut Option<f64>;

/// Optional columns filled by mean imputation.
const IMPUTED: [(&str, Field); 6] = [
    (LIFE_EXPECTANCY_FEMALE, |r| &mut r.life_expectancy_female),
    (LIFE_EXPECTANCY_MALE, |r| &mut r.life_expectancy_male),
    (URBAN_POPULATION_PERCENTAGE, |r| &mut r.urban_population_percentage),
    (URBAN_POPULATION_ABSOLUTE, |r| &mut r.urban_population_absolute),
    (POPULATION_DENSITY, |r| &mut r.population_density),
    (TOTAL_GDP, |r| &mut r.total_gdp),
];

/// Per-column fill values learned from the present entries of `rows`.
/// A column with no present entry has no fill value.
fn fit_column_means(rows: &mut [MergedRow]) -> [Option<f64>; 6] {
    IMPUTED.map(|(_, field)| {
        let present: Array1<f64> = rows.iter_mut().filter_map(|r| *field(r)).collect();
        present.mean()
    })
}

/// Replaces each missing optional value with its column mean over `rows`.
fn impute_column_means(mut rows: Vec<MergedRow>) -> Vec<MergedRow> {
    let fill_values = fit_column_means(&mut rows);
    for ((name, field), fill) in IMPUTED.iter().zip(fill_values) {
        let Some(fill) = fill else {
            continue;
        };
        let mut imputed = 0;
        for r in rows.iter_mut() {
            let cell = field(r);
            if cell.is_none() {
                *cell = Some(fill);
                imputed += 1;
            }
        }
        debug!(column = *name, imputed, fill, "Imputed missing values with column mean");
    }
    rows
}

/// Z-scores the selected columns with population statistics. A constant
/// column maps to zeros.
fn standardize(rows: &[MergedRow]) -> Result<FeatureMatrix> {
    let selected: Vec<[f64; 3]> = rows.iter().map(MergedRow::selected).collect();
    let x = Array2::from_shape_fn((selected.len(), 3), |(i, j)| selected[i][j]);

    let mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| PipelineError::Validation("Cannot standardize an empty feature table".into()))?;
    let scale = x.std_axis(Axis(0), 0.0).mapv(|s| if s > 0.0 { s } else { 1.0 });
    let data = (&x - &mean) / &scale;

    Ok(FeatureMatrix {
        countries: rows.iter().map(|r| r.country.clone()).collect(),
        columns: SELECTED_FEATURES,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputPaths;
    use crate::infra::memory_sink::MemorySink;

    fn demo(entries: &[(&str, f64)]) -> CountryIndex<DemographicsRecord> {
        CountryIndex::first_wins(entries.iter().map(|(c, le)| DemographicsRecord {
            country: c.to_string(),
            life_expectancy_both: *le,
            life_expectancy_female: None,
            life_expectancy_male: None,
            urban_population_percentage: None,
            urban_population_absolute: None,
            population_density: None,
        }))
        .0
    }

    fn gdp(entries: &[(&str, f64)]) -> CountryIndex<GdpRecord> {
        CountryIndex::first_wins(entries.iter().map(|(c, v)| GdpRecord {
            country: c.to_string(),
            gdp_per_capita_ppp: *v,
        }))
        .0
    }

    fn pop(entries: &[(&str, f64)]) -> CountryIndex<PopulationRecord> {
        CountryIndex::first_wins(entries.iter().map(|(c, v)| PopulationRecord {
            country: c.to_string(),
            population: *v,
        }))
        .0
    }

    #[test]
    fn test_inner_join_and_lost_countries() {
        let d = demo(&[("A", 70.0), ("B", 75.0), ("C", 80.0)]);
        let g = gdp(&[("A", 1_000.0), ("B", 2_000.0)]);
        let p = pop(&[("A", 5_000_000.0), ("C", 9_000.0)]);

        let set = build_features(&d, &g, &p).unwrap();
        let joined: Vec<&str> = set.merged.iter().map(|r| r.country.as_str()).collect();
        assert_eq!(joined, vec!["A"]);
        assert_eq!(set.lost, vec!["B".to_string(), "C".to_string()]);
        assert_eq!(set.merged[0].total_gdp, Some(5_000_000_000.0));
        assert!((set.merged[0].log_gdp_per_capita - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_lost_countries_report_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let d = demo(&[("A", 70.0), ("C", 80.0), ("B", 75.0)]);
        let g = gdp(&[("B", 2_000.0), ("A", 1_000.0)]);
        let p = pop(&[("C", 9_000.0), ("A", 5_000_000.0)]);
        build_and_persist(&d, &g, &p, &out).unwrap();

        let lost = std::fs::read_to_string(paths.file(LOST_COUNTRIES_CSV)).unwrap();
        assert_eq!(lost, "Country\nB\nC\n");
        assert!(paths.feature_matrix().exists());
        assert!(sink
            .events()
            .contains(&PipelineEvent::JoinCompleted { retained: 1, lost: 2 }));
    }

    #[test]
    fn test_population_in_millions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let d = demo(&[("A", 70.0)]);
        let g = gdp(&[("A", 1_000.0)]);
        let p = pop(&[("A", 38.2)]);
        let err = build_and_persist(&d, &g, &p, &out).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        // nothing is written on a fatal check
        assert!(!paths.file(LOST_COUNTRIES_CSV).exists());
        assert!(!paths.feature_matrix().exists());
    }

    #[test]
    fn test_non_positive_values_rejected() {
        let d = demo(&[("A", 70.0)]);
        let p = pop(&[("A", 5_000.0)]);
        assert!(build_features(&d, &gdp(&[("A", 0.0)]), &p).is_err());
        assert!(build_features(&d, &gdp(&[("A", 10.0)]), &pop(&[("A", -1.0), ("B", 5_000.0)])).is_err());
    }

    #[test]
    fn test_empty_join_rejected() {
        let d = demo(&[("A", 70.0)]);
        let g = gdp(&[("B", 1_000.0)]);
        let p = pop(&[("B", 5_000.0)]);
        assert!(matches!(build_features(&d, &g, &p), Err(PipelineError::Validation(_))));
    }

    #[test]
    fn test_missing_values_take_column_mean() {
        let mut d = demo(&[("A", 70.0), ("B", 75.0), ("C", 80.0)]);
        let with_density: Vec<DemographicsRecord> = d
            .values()
            .cloned()
            .map(|mut r| {
                r.population_density = match r.country.as_str() {
                    "A" => Some(10.0),
                    "B" => Some(30.0),
                    _ => None,
                };
                r
            })
            .collect();
        d = CountryIndex::first_wins(with_density).0;
        let g = gdp(&[("A", 1_000.0), ("B", 2_000.0), ("C", 3_000.0)]);
        let p = pop(&[("A", 5_000.0), ("B", 6_000.0), ("C", 7_000.0)]);

        let set = build_features(&d, &g, &p).unwrap();
        let c = set.merged.iter().find(|r| r.country == "C").unwrap();
        assert_eq!(c.population_density, Some(20.0));
        // no value anywhere: stays missing
        assert_eq!(c.life_expectancy_female, None);
    }

    #[test]
    fn test_columns_are_standardized() {
        let d = demo(&[("A", 60.0), ("B", 70.0), ("C", 75.0), ("D", 82.0)]);
        let g = gdp(&[("A", 1_500.0), ("B", 8_000.0), ("C", 20_000.0), ("D", 60_000.0)]);
        let p = pop(&[("A", 2e6), ("B", 4.5e7), ("C", 1.2e6), ("D", 3.3e8)]);

        let set = build_features(&d, &g, &p).unwrap();
        assert_eq!(set.matrix.shape(), (4, 3));
        assert_eq!(set.matrix.countries, vec!["A", "B", "C", "D"]);
        for j in 0..3 {
            let col = set.matrix.column(j);
            let m = col.iter().sum::<f64>() / col.len() as f64;
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / col.len() as f64;
            assert!(m.abs() < 1e-12, "column {j} mean {m}");
            assert!((var.sqrt() - 1.0).abs() < 1e-12, "column {j} std {}", var.sqrt());
        }
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let d = demo(&[("A", 70.0), ("B", 70.0)]);
        let g = gdp(&[("A", 100.0), ("B", 1_000.0)]);
        let p = pop(&[("A", 1_000.0), ("B", 10_000.0)]);
        let set = build_features(&d, &g, &p).unwrap();
        assert_eq!(set.matrix.column(0).to_vec(), vec![0.0, 0.0]);
        let first = set.matrix.row(0);
        assert!((first[1] + 1.0).abs() < 1e-12);
        assert!((first[2] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_file_matches_returned_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let d = demo(&[("A", 60.0), ("B", 70.0), ("C", 81.0)]);
        let g = gdp(&[("A", 1_500.0), ("B", 8_000.0), ("C", 60_000.0)]);
        let p = pop(&[("A", 2e6), ("B", 4.5e7), ("C", 3.3e8)]);
        let (set, bytes) = build_and_persist(&d, &g, &p, &out).unwrap();

        let on_disk: Array2<f64> = ndarray_npy::read_npy(paths.feature_matrix()).unwrap();
        assert_eq!(on_disk, set.matrix.data);
        assert_eq!(on_disk.dim(), (3, 3));
        assert_eq!(bytes, std::fs::read(paths.feature_matrix()).unwrap());
        assert_eq!(&bytes[..6], b"\x93NUMPY");
    }
}
