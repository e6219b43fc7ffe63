/// Linear-interpolation quantile of an ascending, NaN-free slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Tukey fence bounds `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`, ignoring NaN values.
pub fn tukey_bounds(values: &[f64]) -> Option<(f64, f64)> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile_sorted(&sorted, 0.25)?;
    let q3 = quantile_sorted(&sorted, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Flags values strictly outside the Tukey fence. Same length as `values`;
/// NaN is never flagged.
pub fn tukey_outliers(values: &[f64]) -> Vec<bool> {
    match tukey_bounds(values) {
        Some((lower, upper)) => values.iter().map(|&v| v < lower || v > upper).collect(),
        None => vec![false; values.len()],
    }
}
