use tracing::instrument;

use super::{CleanReport, Cleaned};
use crate::app::ports::{Dataset, DropReason, PipelineEvent};
use crate::constants::{COUNTRY, DROPPED_GDP_CSV, GDP_PER_CAPITA_PPP};
use crate::error::Result;
use crate::pipeline::processing::names::standardize_names;
use crate::pipeline::processing::outliers::tukey_outliers;
use crate::pipeline::storage::reports::ReportWriter;
use crate::types::{CountryIndex, GdpRecord, GdpRow};

/// Standardizes names, moves rows without a GDP value to `dropped_gdp.csv`,
/// logs Tukey outliers and keeps the first row per country.
#[instrument(skip_all, fields(rows = rows.len()))]
pub fn clean_gdp(rows: &[GdpRow], out: &ReportWriter<'_>) -> Result<Cleaned<GdpRecord>> {
    let mut report = CleanReport::new(Dataset::Gdp, rows.len());

    let names: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
    let (standardized, corrections) = standardize_names(&names);
    // the correction list is only logged for this dataset
    if !corrections.is_empty() {
        out.emit(PipelineEvent::NamesCorrected {
            dataset: Dataset::Gdp,
            count: corrections.len(),
        });
    }
    report.names_corrected = corrections.len();

    let (present, missing): (Vec<GdpRow>, Vec<GdpRow>) = rows
        .iter()
        .zip(standardized)
        .map(|(row, country)| GdpRow {
            country,
            gdp_per_capita_ppp: row.gdp_per_capita_ppp,
        })
        .partition(|row| row.gdp_per_capita_ppp.is_some());

    out.write_rows(DROPPED_GDP_CSV, &[COUNTRY, GDP_PER_CAPITA_PPP], &missing)?;
    report.dropped_missing = missing.len();
    out.emit(PipelineEvent::RowsDropped {
        dataset: Dataset::Gdp,
        reason: DropReason::MissingValue { column: GDP_PER_CAPITA_PPP },
        count: missing.len(),
    });

    let records: Vec<GdpRecord> = present
        .into_iter()
        .filter_map(|row| {
            Some(GdpRecord {
                gdp_per_capita_ppp: row.gdp_per_capita_ppp?,
                country: row.country,
            })
        })
        .collect();

    let values: Vec<f64> = records.iter().map(|r| r.gdp_per_capita_ppp).collect();
    report.outliers_flagged = tukey_outliers(&values).into_iter().filter(|&f| f).count();
    out.emit(PipelineEvent::OutliersFlagged {
        dataset: Dataset::Gdp,
        column: GDP_PER_CAPITA_PPP,
        count: report.outliers_flagged,
    });

    let (table, duplicates) = CountryIndex::first_wins(records);
    report.dropped_duplicate = duplicates;
    report.kept = table.len();
    out.emit(PipelineEvent::RowsDropped {
        dataset: Dataset::Gdp,
        reason: DropReason::DuplicateCountry,
        count: duplicates,
    });
    out.emit(PipelineEvent::Cleaned {
        dataset: Dataset::Gdp,
        kept: report.kept,
    });

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputPaths;
    use crate::infra::memory_sink::MemorySink;

    fn row(country: &str, gdp: Option<f64>) -> GdpRow {
        GdpRow {
            country: country.to_string(),
            gdp_per_capita_ppp: gdp,
        }
    }

    #[test]
    fn test_missing_rows_go_to_dropped_report() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let rows = vec![row("Chile", Some(27_000.0)), row("eritrea", None)];
        let cleaned = clean_gdp(&rows, &out).unwrap();

        assert!(cleaned.table.contains("Chile"));
        assert!(!cleaned.table.contains("Eritrea"));
        assert_eq!(cleaned.report.dropped_missing, 1);

        let dropped = std::fs::read_to_string(paths.file(DROPPED_GDP_CSV)).unwrap();
        assert_eq!(dropped, "Country,GDP_per_capita_PPP\nEritrea,\n");
        assert_eq!(sink.dropped(Dataset::Gdp, |r| matches!(r, DropReason::MissingValue { .. })), 1);
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let rows = vec![
            row("Bahamas", Some(30_000.0)),
            row("the bahamas", Some(31_000.0)),
            row("Niger", None),
            row("Mali", Some(2_300.0)),
        ];
        let cleaned = clean_gdp(&rows, &out).unwrap();

        assert_eq!(cleaned.table.len(), 2);
        assert_eq!(cleaned.table.get("Bahamas").unwrap().gdp_per_capita_ppp, 30_000.0);
        let r = &cleaned.report;
        assert_eq!((r.dropped_missing, r.dropped_duplicate, r.kept), (1, 1, 2));
        assert_eq!(r.input_rows, r.dropped_missing + r.dropped_duplicate + r.kept);
    }

    #[test]
    fn test_outliers_are_counted_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let rows: Vec<GdpRow> = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0]
            .iter()
            .enumerate()
            .map(|(i, v)| row(&format!("Country {i}"), Some(*v)))
            .collect();
        let cleaned = clean_gdp(&rows, &out).unwrap();
        assert_eq!(cleaned.report.outliers_flagged, 1);
        assert_eq!(cleaned.table.len(), 6);
    }

    #[test]
    fn test_dropped_report_written_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        clean_gdp(&[row("Chile", Some(1.0))], &out).unwrap();
        let dropped = std::fs::read_to_string(paths.file(DROPPED_GDP_CSV)).unwrap();
        assert_eq!(dropped, "Country,GDP_per_capita_PPP\n");
    }
}
