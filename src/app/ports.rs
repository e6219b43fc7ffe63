use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// The three independently sourced datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Demographics,
    Gdp,
    Population,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dataset::Demographics => "demographics",
            Dataset::Gdp => "gdp",
            Dataset::Population => "population",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    MissingValue { column: &'static str },
    OutOfRange { column: &'static str, min: f64, max: f64 },
    DuplicateCountry,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingValue { column } => write!(f, "missing {column}"),
            DropReason::OutOfRange { column, min, max } => {
                write!(f, "{column} outside [{min}, {max}]")
            }
            DropReason::DuplicateCountry => f.write_str("duplicate country"),
        }
    }
}

/// Structured record of a decision taken while the pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    TableLoaded { dataset: Dataset, rows: usize, columns: Vec<String> },
    CoercionFailures { dataset: Dataset, column: String, missing: usize, invalid: usize },
    NamesCorrected { dataset: Dataset, count: usize },
    RowsDropped { dataset: Dataset, reason: DropReason, count: usize },
    OutliersFlagged { dataset: Dataset, column: &'static str, count: usize },
    Cleaned { dataset: Dataset, kept: usize },
    JoinCompleted { retained: usize, lost: usize },
    ReportWritten { path: PathBuf, rows: usize },
    MatrixWritten { path: PathBuf, rows: usize, cols: usize },
    CountryLinksFound { count: usize },
    CountryFetchFailed { country: String, error: String },
}

/// Receives pipeline events; injected into every stage by the driver.
pub trait EventSink {
    fn emit(&self, event: PipelineEvent);
}

/// Blocking page fetcher used by the crawler.
pub trait HttpClientPort {
    fn get_text(&self, url: &str) -> Result<String>;
}
