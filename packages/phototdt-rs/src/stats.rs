//! Summary statistics used for standardization

/// Median; the mean of the two middle values for even lengths. `NaN` when empty.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        0.5 * (sorted[mid - 1] + sorted[mid])
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by `n`)
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `(x - median) / std`; a zero spread leaves the centered values.
pub fn standardize(values: &[f64]) -> Vec<f64> {
    let center = median(values);
    let spread = std_dev(values);
    if spread > 0.0 && spread.is_finite() {
        values.iter().map(|v| (v - center) / spread).collect()
    } else {
        values.iter().map(|v| v - center).collect()
    }
}
