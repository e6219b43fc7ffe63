use tracing::instrument;

use super::{CleanReport, Cleaned};
use crate::app::ports::{Dataset, DropReason, PipelineEvent};
use crate::constants::{
    COUNTRY, DEMOGRAPHICS_FIELDS, LIFE_EXPECTANCY_BOTH, LIFE_EXPECTANCY_FEMALE, LIFE_EXPECTANCY_MALE,
    NAME_MISMATCHES_CSV, POPULATION_DENSITY, URBAN_POPULATION_ABSOLUTE, URBAN_POPULATION_PERCENTAGE,
};
use crate::error::Result;
use crate::pipeline::processing::names::standardize_names;
use crate::pipeline::storage::reports::ReportWriter;
use crate::types::{coerce_column, CountryIndex, DemographicsRecord, DemographicsRow, RawTable};

pub const MIN_LIFE_EXPECTANCY: f64 = 40.0;
pub const MAX_LIFE_EXPECTANCY: f64 = 100.0;

/// Parses every non-country column of a raw demographics table.
pub fn coerce_demographics(raw: &RawTable, out: &ReportWriter<'_>) -> Result<(Vec<DemographicsRow>, CleanReport)> {
    let mut wanted = vec![COUNTRY];
    wanted.extend(DEMOGRAPHICS_FIELDS);
    raw.verify_columns(&wanted)?;

    let mut report = CleanReport::new(Dataset::Demographics, raw.len());
    let mut parsed: Vec<(&str, Vec<Option<f64>>)> = Vec::new();
    for header in raw.headers.iter().filter(|h| h.as_str() != COUNTRY) {
        let (values, tally) = coerce_column(header, raw.column(header)?, false);
        if tally.missing > 0 {
            out.emit(PipelineEvent::CoercionFailures {
                dataset: Dataset::Demographics,
                column: tally.column.clone(),
                missing: tally.missing,
                invalid: tally.invalid,
            });
        }
        report.coercion.push(tally);
        parsed.push((header.as_str(), values));
    }

    let field = |name: &str, row: usize| -> Option<f64> {
        parsed
            .iter()
            .find(|(h, _)| *h == name)
            .and_then(|(_, values)| values[row])
    };

    let rows = raw
        .column(COUNTRY)?
        .enumerate()
        .map(|(i, country)| DemographicsRow {
            country: country.to_string(),
            life_expectancy_both: field(LIFE_EXPECTANCY_BOTH, i),
            life_expectancy_female: field(LIFE_EXPECTANCY_FEMALE, i),
            life_expectancy_male: field(LIFE_EXPECTANCY_MALE, i),
            urban_population_percentage: field(URBAN_POPULATION_PERCENTAGE, i),
            urban_population_absolute: field(URBAN_POPULATION_ABSOLUTE, i),
            population_density: field(POPULATION_DENSITY, i),
        })
        .collect();

    Ok((rows, report))
}

/// Coerces, standardizes names, keeps rows whose life expectancy lies in
/// [40, 100] and keys the result by country.
#[instrument(skip_all, fields(rows = raw.len()))]
pub fn clean_demographics(raw: &RawTable, out: &ReportWriter<'_>) -> Result<Cleaned<DemographicsRecord>> {
    let (rows, mut report) = coerce_demographics(raw, out)?;

    let names: Vec<&str> = rows.iter().map(|r| r.country.as_str()).collect();
    let (standardized, corrections) = standardize_names(&names);
    if !corrections.is_empty() {
        out.write_rows(NAME_MISMATCHES_CSV, &["Original", "Standardized"], &corrections)?;
        out.emit(PipelineEvent::NamesCorrected {
            dataset: Dataset::Demographics,
            count: corrections.len(),
        });
    }
    report.names_corrected = corrections.len();

    let mut kept = Vec::with_capacity(rows.len());
    for (row, country) in rows.into_iter().zip(standardized) {
        match row.life_expectancy_both {
            None => report.dropped_missing += 1,
            Some(le) if !(MIN_LIFE_EXPECTANCY..=MAX_LIFE_EXPECTANCY).contains(&le) => {
                report.dropped_out_of_range += 1;
            }
            Some(le) => kept.push(DemographicsRecord {
                country,
                life_expectancy_both: le,
                life_expectancy_female: row.life_expectancy_female,
                life_expectancy_male: row.life_expectancy_male,
                urban_population_percentage: row.urban_population_percentage,
                urban_population_absolute: row.urban_population_absolute,
                population_density: row.population_density,
            }),
        }
    }

    out.emit(PipelineEvent::RowsDropped {
        dataset: Dataset::Demographics,
        reason: DropReason::MissingValue { column: LIFE_EXPECTANCY_BOTH },
        count: report.dropped_missing,
    });
    out.emit(PipelineEvent::RowsDropped {
        dataset: Dataset::Demographics,
        reason: DropReason::OutOfRange {
            column: LIFE_EXPECTANCY_BOTH,
            min: MIN_LIFE_EXPECTANCY,
            max: MAX_LIFE_EXPECTANCY,
        },
        count: report.dropped_out_of_range,
    });

    // One row per country is expected; a repeat after standardization keeps the first
    let (table, duplicates) = CountryIndex::first_wins(kept);
    if duplicates > 0 {
        tracing::warn!(duplicates, "Demographics contained repeated countries after standardization");
        out.emit(PipelineEvent::RowsDropped {
            dataset: Dataset::Demographics,
            reason: DropReason::DuplicateCountry,
            count: duplicates,
        });
    }
    report.dropped_duplicate = duplicates;
    report.kept = table.len();
    out.emit(PipelineEvent::Cleaned {
        dataset: Dataset::Demographics,
        kept: report.kept,
    });

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputPaths;
    use crate::infra::memory_sink::MemorySink;

    const HEADER: &str = "Country,LifeExpectancy_Both,LifeExpectancy_Female,LifeExpectancy_Male,UrbanPopulation_Percentage,UrbanPopulation_Absolute,PopulationDensity\n";

    fn table(body: &str) -> RawTable {
        RawTable::from_reader("demographics_data.csv", format!("{HEADER}{body}").as_bytes()).unwrap()
    }

    #[test]
    fn test_life_expectancy_bounds_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let raw = table(
            "Low,39.9,,,,,\nEdge Low,40.0,,,,,\nEdge High,100.0,,,,,\nHigh,100.1,,,,,\nBlank,,,,,,\n",
        );
        let cleaned = clean_demographics(&raw, &out).unwrap();

        let kept: Vec<&str> = cleaned.table.keys().collect();
        assert_eq!(kept, vec!["Edge High", "Edge Low"]);
        assert_eq!(cleaned.report.dropped_out_of_range, 2);
        assert_eq!(cleaned.report.dropped_missing, 1);
        assert_eq!(cleaned.report.kept, 2);
    }

    #[test]
    fn test_coercion_failures_become_missing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let raw = table("France,82.5,85.0,79.9,81,\"55,000,000\",122\nPeru,77,n.a.,None,78,26000000,26\n");
        let cleaned = clean_demographics(&raw, &out).unwrap();

        let france = cleaned.table.get("France").unwrap();
        // demographics cells are parsed strictly, thousands separators are not stripped
        assert_eq!(france.urban_population_absolute, None);
        let peru = cleaned.table.get("Peru").unwrap();
        assert_eq!(peru.life_expectancy_female, None);
        assert_eq!(peru.population_density, Some(26.0));

        let female = cleaned
            .report
            .coercion
            .iter()
            .find(|c| c.column == LIFE_EXPECTANCY_FEMALE)
            .unwrap();
        assert_eq!((female.missing, female.invalid), (1, 1));
        let male = cleaned
            .report
            .coercion
            .iter()
            .find(|c| c.column == LIFE_EXPECTANCY_MALE)
            .unwrap();
        assert_eq!((male.missing, male.invalid), (1, 0));
    }

    #[test]
    fn test_name_mismatches_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let raw = table("the gambia,62,,,,,\nChile,80,,,,,\n");
        let cleaned = clean_demographics(&raw, &out).unwrap();
        assert!(cleaned.table.contains("Gambia"));
        assert_eq!(cleaned.report.names_corrected, 1);

        let report = std::fs::read_to_string(paths.file(NAME_MISMATCHES_CSV)).unwrap();
        assert_eq!(report, "Original,Standardized\nthe gambia,Gambia\n");
    }

    #[test]
    fn test_no_mismatch_file_when_names_are_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        clean_demographics(&table("Chile,80,,,,,\n"), &out).unwrap();
        assert!(!paths.file(NAME_MISMATCHES_CSV).exists());
    }

    #[test]
    fn test_repeated_country_keeps_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        // both spellings standardize to "Chile"
        let raw = table("Chile,80.7,,,,,26\nchile,79.0,,,,,30\nPeru,77,,,,,\n");
        let cleaned = clean_demographics(&raw, &out).unwrap();

        let chile = cleaned.table.get("Chile").unwrap();
        assert_eq!(chile.life_expectancy_both, 80.7);
        assert_eq!(chile.population_density, Some(26.0));
        assert_eq!(cleaned.report.dropped_duplicate, 1);
        assert_eq!(cleaned.report.kept, 2);
        assert_eq!(sink.dropped(Dataset::Demographics, |r| *r == DropReason::DuplicateCountry), 1);
    }

    #[test]
    fn test_missing_column_is_a_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path());
        let sink = MemorySink::new();
        let out = ReportWriter::new(&paths, &sink);

        let raw = RawTable::from_reader("d.csv", "Country,LifeExpectancy_Both\nChile,80\n".as_bytes()).unwrap();
        let err = clean_demographics(&raw, &out).unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::Schema { .. }));
    }
}
