//! Per-dataset cleaning: coercion, name standardization, filtering and dedup.

pub mod demographics;
pub mod gdp;
pub mod population;

pub use demographics::clean_demographics;
pub use gdp::clean_gdp;
pub use population::clean_population;

use serde::Serialize;

use crate::app::ports::Dataset;
use crate::types::{ColumnCoercion, CountryIndex};

/// Independent raw counts for one cleaning pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanReport {
    #[serde(serialize_with = "serialize_dataset")]
    pub dataset: Dataset,
    pub input_rows: usize,
    pub names_corrected: usize,
    pub dropped_missing: usize,
    pub dropped_out_of_range: usize,
    pub dropped_duplicate: usize,
    pub outliers_flagged: usize,
    pub kept: usize,
    pub coercion: Vec<ColumnCoercion>,
}

impl CleanReport {
    fn new(dataset: Dataset, input_rows: usize) -> Self {
        Self {
            dataset,
            input_rows,
            names_corrected: 0,
            dropped_missing: 0,
            dropped_out_of_range: 0,
            dropped_duplicate: 0,
            outliers_flagged: 0,
            kept: 0,
            coercion: Vec::new(),
        }
    }
}

fn serialize_dataset<S: serde::Serializer>(dataset: &Dataset, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(dataset)
}

/// A cleaned table keyed by standardized country name, plus what was done to it.
#[derive(Debug, Clone)]
pub struct Cleaned<R> {
    pub table: CountryIndex<R>,
    pub report: CleanReport,
}
