use tracing::instrument;

use super::{CleanReport, Cleaned};
use crate::app::ports::{Dataset, DropReason, PipelineEvent};
use crate::constants::{LOG_POPULATION, POPULATION};
use crate::error::Result;
use crate::pipeline::processing::names::standardize_names;
use crate::pipeline::processing::outliers::tukey_outliers;
use crate::pipeline::storage::reports::ReportWriter;
use crate::types::{CountryIndex, PopulationRecord, PopulationRow};

/// Standardizes names, drops rows without a population, logs Tukey outliers
/// on log10(population) and keeps the first row per country.
#[instrument(skip_all, fields(rows = rows.len()))]
pub fn clean_population(rows: &[PopulationRow], out: &ReportWriter<'_>) -> Result<Cleaned<PopulationRecord>> {
    let mut report = CleanReport::new(Dataset::Population, rows.len());

    let names: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
    let (standardized, corrections) = standardize_names(&names);
    if !corrections.is_empty() {
        out.emit(PipelineEvent::NamesCorrected {
            dataset: Dataset::Population,
            count: corrections.len(),
        });
    }
    report.names_corrected = corrections.len();

    let records: Vec<PopulationRecord> = rows
        .iter()
        .zip(standardized)
        .filter_map(|(row, country)| {
            Some(PopulationRecord {
                country,
                population: row.population?,
            })
        })
        .collect();
    report.dropped_missing = rows.len() - records.len();
    out.emit(PipelineEvent::RowsDropped {
        dataset: Dataset::Population,
        reason: DropReason::MissingValue { column: POPULATION },
        count: report.dropped_missing,
    });

    let log_pop: Vec<f64> = records.iter().map(|r| r.population.log10()).collect();
    report.outliers_flagged = tukey_outliers(&log_pop).into_iter().filter(|&f| f).count();
    out.emit(PipelineEvent::OutliersFlagged {
        dataset: Dataset::Population,
        column: LOG_POPULATION,
        count: report.outliers_flagged,
    });

    let (table, duplicates) = CountryIndex::first_wins(records);
    report.dropped_duplicate = duplicates;
    report.kept = table.len();
    out.emit(PipelineEvent::RowsDropped {
        dataset: Dataset::Population,
        reason: DropReason::DuplicateCountry,
        count: duplicates,
    });
    out.emit(PipelineEvent::Cleaned {
        dataset: Dataset::Population,
        kept: report.kept,
    });

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputPaths;
    use crate::infra::memory_sink::MemorySink;

    fn row(country: &str, population: Option<f64>) -> PopulationRow {
        PopulationRow {
            country: country.to_string(),
            population,
        }
    }

    #[test]
    fn test_drops_missing_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let rows = vec![
            row("india", Some(1_407_563_842.0)),
            row("India ", Some(1.0)),
            row("Tuvalu", None),
            row("Iceland", Some(372_520.0)),
        ];
        let cleaned = clean_population(&rows, &out).unwrap();

        assert_eq!(cleaned.table.keys().collect::<Vec<_>>(), vec!["Iceland", "India"]);
        assert_eq!(cleaned.table.get("India").unwrap().population, 1_407_563_842.0);
        let r = &cleaned.report;
        assert_eq!((r.dropped_missing, r.dropped_duplicate, r.kept), (1, 1, 2));
        assert_eq!(r.names_corrected, 2);
    }

    #[test]
    fn test_outliers_use_log_scale() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        // evenly spaced on a log scale: no outlier although the raw spread is huge
        let rows: Vec<PopulationRow> = (3..=9)
            .map(|e| row(&format!("Country {e}"), Some(10f64.powi(e))))
            .collect();
        let cleaned = clean_population(&rows, &out).unwrap();
        assert_eq!(cleaned.report.outliers_flagged, 0);
        assert_eq!(cleaned.table.len(), 7);
    }
}
