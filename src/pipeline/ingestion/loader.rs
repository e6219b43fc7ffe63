//! Loaders for the provided GDP and population files and the cached
//! demographics table. GDP/population loads also write previews and
//! descriptive statistics.

use std::path::Path;
use tracing::{debug, instrument};

use crate::app::ports::{Dataset, PipelineEvent};
use crate::constants::{
    COUNTRY, DEMOGRAPHICS_FIELDS, GDP_AFTER_SORT_CSV, GDP_BEFORE_SORT_CSV, GDP_DESCRIBE_CSV,
    GDP_PER_CAPITA_PPP, POPULATION, POP_AFTER_SORT_CSV, POP_BEFORE_SORT_CSV, POP_DESCRIBE_CSV,
};
use crate::error::Result;
use crate::pipeline::stats::{column_stats, ColumnStats, STATS_HEADERS};
use crate::pipeline::storage::reports::ReportWriter;
use crate::types::{coerce_column, GdpRow, PopulationRow, RawTable};

/// Output file names for one single-value dataset.
struct SingleValueFiles {
    before: &'static str,
    after: &'static str,
    describe: &'static str,
}

/// Reads a file holding `Country` plus a numeric `column`, tolerating
/// thousands separators. Other columns are carried into the previews and,
/// when fully numeric, into the describe table.
fn load_single_value<T, F>(
    path: &Path,
    dataset: Dataset,
    column: &'static str,
    files: SingleValueFiles,
    preview_rows: usize,
    out: &ReportWriter<'_>,
    make_row: F,
) -> Result<Vec<T>>
where
    F: Fn(String, Option<f64>) -> T,
{
    debug!("Reading {} file", path.display());
    let raw = RawTable::from_csv_path(path)?;
    raw.verify_columns(&[COUNTRY, column])?;
    out.emit(PipelineEvent::TableLoaded {
        dataset,
        rows: raw.len(),
        columns: raw.headers.clone(),
    });
    out.write_previews(&raw, preview_rows, COUNTRY, files.before, files.after)?;
    out.write_rows(files.describe, &STATS_HEADERS, &describe(&raw, column)?)?;

    let (values, tally) = coerce_column(column, raw.column(column)?, true);
    if tally.missing > 0 {
        out.emit(PipelineEvent::CoercionFailures {
            dataset,
            column: tally.column.clone(),
            missing: tally.missing,
            invalid: tally.invalid,
        });
    }

    let rows = raw
        .column(COUNTRY)?
        .zip(values)
        .map(|(country, value)| make_row(country.to_string(), value))
        .collect();
    Ok(rows)
}

/// Statistics for `target` and for every other non-country column whose
/// present cells all parse as numbers.
fn describe(raw: &RawTable, target: &str) -> Result<Vec<ColumnStats>> {
    let mut stats = Vec::new();
    for header in raw.headers.iter().filter(|h| h.as_str() != COUNTRY) {
        let (values, tally) = coerce_column(header, raw.column(header)?, true);
        let numeric = tally.invalid == 0 && tally.missing < values.len();
        if header == target || numeric {
            stats.push(column_stats(header, &values));
        }
    }
    Ok(stats)
}

#[instrument(skip(out))]
pub fn load_gdp(path: &Path, preview_rows: usize, out: &ReportWriter<'_>) -> Result<Vec<GdpRow>> {
    let files = SingleValueFiles {
        before: GDP_BEFORE_SORT_CSV,
        after: GDP_AFTER_SORT_CSV,
        describe: GDP_DESCRIBE_CSV,
    };
    load_single_value(path, Dataset::Gdp, GDP_PER_CAPITA_PPP, files, preview_rows, out, |country, gdp_per_capita_ppp| {
        GdpRow {
            country,
            gdp_per_capita_ppp,
        }
    })
}

#[instrument(skip(out))]
pub fn load_population(path: &Path, preview_rows: usize, out: &ReportWriter<'_>) -> Result<Vec<PopulationRow>> {
    let files = SingleValueFiles {
        before: POP_BEFORE_SORT_CSV,
        after: POP_AFTER_SORT_CSV,
        describe: POP_DESCRIBE_CSV,
    };
    load_single_value(path, Dataset::Population, POPULATION, files, preview_rows, out, |country, population| {
        PopulationRow { country, population }
    })
}

/// Reloads a previously scraped demographics table.
#[instrument(skip(out))]
pub fn load_demographics(path: &Path, out: &ReportWriter<'_>) -> Result<RawTable> {
    debug!("Reading already crawled data from {}", path.display());
    let raw = RawTable::from_csv_path(path)?;
    let mut wanted = vec![COUNTRY];
    wanted.extend(DEMOGRAPHICS_FIELDS);
    raw.verify_columns(&wanted)?;
    out.emit(PipelineEvent::TableLoaded {
        dataset: Dataset::Demographics,
        rows: raw.len(),
        columns: raw.headers.clone(),
    });
    Ok(raw)
}
