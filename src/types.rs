use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::constants::NA_VALUES;
use crate::error::{PipelineError, Result};

/// A header row plus string cells, exactly as read from (or written to) a CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Name used in error messages, usually the file name.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            source: source.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = File::open(path)?;
        Self::from_reader(source, file)
    }

    pub fn from_reader<R: std::io::Read>(source: impl Into<String>, reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            // short rows are padded so every column lookup is in bounds
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            source: source.into(),
            headers,
            rows,
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Fails with a schema error naming every wanted column that is absent.
    pub fn verify_columns(&self, wanted: &[&str]) -> Result<()> {
        let missing: Vec<String> = wanted
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Schema {
                file: self.source.clone(),
                missing,
            })
        }
    }

    /// Cells of one column, in row order.
    pub fn column<'a>(&'a self, name: &str) -> Result<impl Iterator<Item = &'a str> + 'a> {
        let idx = self.column_index(name).ok_or_else(|| PipelineError::Schema {
            file: self.source.clone(),
            missing: vec![name.to_string()],
        })?;
        Ok(self.rows.iter().map(move |row| row[idx].as_str()))
    }

    /// First `n` rows, optionally stably sorted by a column first.
    pub fn head(&self, n: usize, sort_by: Option<&str>) -> RawTable {
        let mut rows = self.rows.clone();
        if let Some(idx) = sort_by.and_then(|c| self.column_index(c)) {
            rows.sort_by(|a, b| a[idx].cmp(&b[idx]));
        }
        rows.truncate(n);
        RawTable {
            source: self.source.clone(),
            headers: self.headers.clone(),
            rows,
        }
    }
}

/// Outcome of parsing one cell as a number.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Empty or an explicit NA marker.
    Missing,
    Value(f64),
    /// Present but not a number; the original text is kept for reporting.
    Invalid(String),
}

impl Cell {
    /// Parses a cell, optionally tolerating `,` thousands separators.
    pub fn parse(raw: &str, thousands: bool) -> Cell {
        let trimmed = raw.trim();
        if NA_VALUES.contains(&trimmed) {
            return Cell::Missing;
        }
        let parsed = if thousands {
            trimmed.replace(',', "").parse::<f64>()
        } else {
            trimmed.parse::<f64>()
        };
        match parsed {
            Ok(v) if v.is_nan() => Cell::Missing,
            Ok(v) => Cell::Value(v),
            Err(_) => Cell::Invalid(trimmed.to_string()),
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// Per-column tally of a numeric coercion pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCoercion {
    pub column: String,
    /// Cells without a value after coercion, including `invalid`.
    pub missing: usize,
    /// Cells that held text which failed to parse.
    pub invalid: usize,
}

/// Coerces one column, returning the parsed values and their tally.
pub fn coerce_column<'a>(
    column: &str,
    cells: impl Iterator<Item = &'a str>,
    thousands: bool,
) -> (Vec<Option<f64>>, ColumnCoercion) {
    let mut report = ColumnCoercion {
        column: column.to_string(),
        missing: 0,
        invalid: 0,
    };
    let values = cells
        .map(|raw| match Cell::parse(raw, thousands) {
            Cell::Value(v) => Some(v),
            Cell::Missing => {
                report.missing += 1;
                None
            }
            Cell::Invalid(_) => {
                report.missing += 1;
                report.invalid += 1;
                None
            }
        })
        .collect();
    (values, report)
}

/// Records that carry a country name usable as a join key.
pub trait Keyed {
    fn country(&self) -> &str;
}

/// Demographics row as scraped, with every numeric field optional.
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicsRow {
    pub country: String,
    pub life_expectancy_both: Option<f64>,
    pub life_expectancy_female: Option<f64>,
    pub life_expectancy_male: Option<f64>,
    pub urban_population_percentage: Option<f64>,
    pub urban_population_absolute: Option<f64>,
    pub population_density: Option<f64>,
}

/// Cleaned demographics: life expectancy is present and plausible.
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicsRecord {
    pub country: String,
    pub life_expectancy_both: f64,
    pub life_expectancy_female: Option<f64>,
    pub life_expectancy_male: Option<f64>,
    pub urban_population_percentage: Option<f64>,
    pub urban_population_absolute: Option<f64>,
    pub population_density: Option<f64>,
}

/// Also the row format of `dropped_gdp.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GdpRow {
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "GDP_per_capita_PPP")]
    pub gdp_per_capita_ppp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GdpRecord {
    pub country: String,
    pub gdp_per_capita_ppp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRow {
    pub country: String,
    pub population: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRecord {
    pub country: String,
    pub population: f64,
}

impl Keyed for DemographicsRecord {
    fn country(&self) -> &str {
        &self.country
    }
}

impl Keyed for GdpRecord {
    fn country(&self) -> &str {
        &self.country
    }
}

impl Keyed for PopulationRecord {
    fn country(&self) -> &str {
        &self.country
    }
}

/// A table with unique country keys, iterated in ascending key order.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryIndex<R> {
    rows: BTreeMap<String, R>,
}

impl<R: Keyed> CountryIndex<R> {
    /// Builds the index keeping the first row seen for each country.
    /// Returns the index and the number of later duplicates discarded.
    pub fn first_wins(rows: impl IntoIterator<Item = R>) -> (Self, usize) {
        let mut map = BTreeMap::new();
        let mut duplicates = 0;
        for row in rows {
            if map.contains_key(row.country()) {
                duplicates += 1;
                continue;
            }
            map.insert(row.country().to_string(), row);
        }
        (Self { rows: map }, duplicates)
    }
}

impl<R> CountryIndex<R> {
    pub fn get(&self, country: &str) -> Option<&R> {
        self.rows.get(country)
    }

    pub fn contains(&self, country: &str) -> bool {
        self.rows.contains_key(country)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
