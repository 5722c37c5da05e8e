//! Smoothed Moving Average (SMMA, also Wilder's RMA).
//!
//! Seed: SMMA[period-1] = SMA of the first `period` values.
//! Recursive: SMMA[t] = (SMMA[t-1] * (period - 1) + x[t]) / period.

/// Smoothed moving average; `NaN` until `period` values are available.
pub fn smma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let p = period as f64;
    let mut prev = values[..period].iter().sum::<f64>() / p;
    result[period - 1] = prev;
    for i in period..n {
        prev = (prev * (p - 1.0) + values[i]) / p;
        result[i] = prev;
    }
    result
}
