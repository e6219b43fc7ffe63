//! Descriptive statistics over optional numeric columns.

use serde::Serialize;

use super::processing::outliers::quantile_sorted;
use crate::constants::COUNTRY;
use crate::error::Result;
use crate::types::{coerce_column, RawTable};

pub const STATS_HEADERS: [&str; 8] = ["field", "count", "mean", "std", "min", "max", "median", "missing"];

/// Summary of one numeric column. `std` is the sample standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub field: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub missing: usize,
}

pub fn column_stats(field: &str, values: &[Option<f64>]) -> ColumnStats {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(f64::total_cmp);
    let count = present.len();

    let mean = mean(&present);
    let std = match (mean, count) {
        (Some(m), n) if n > 1 => {
            let ss: f64 = present.iter().map(|v| (v - m).powi(2)).sum();
            Some((ss / (n - 1) as f64).sqrt())
        }
        _ => None,
    };

    ColumnStats {
        field: field.to_string(),
        count,
        mean,
        std,
        min: present.first().copied(),
        max: present.last().copied(),
        median: quantile_sorted(&present, 0.5),
        missing: values.len() - count,
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Pearson correlation over rows where both values are present.
/// `None` when fewer than two complete pairs exist or a side is constant.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Statistics for every column of `table` except the country column.
pub fn table_field_stats(table: &RawTable) -> Result<Vec<ColumnStats>> {
    table
        .headers
        .iter()
        .filter(|h| h.as_str() != COUNTRY)
        .map(|h| -> Result<ColumnStats> {
            let (values, _) = coerce_column(h, table.column(h)?, false);
            Ok(column_stats(h, &values))
        })
        .collect()
}

/// Pearson correlation between two columns of a raw table.
pub fn table_correlation(table: &RawTable, a: &str, b: &str) -> Result<Option<f64>> {
    let (xs, _) = coerce_column(a, table.column(a)?, false);
    let (ys, _) = coerce_column(b, table.column(b)?, false);
    Ok(pearson(&xs, &ys))
}
