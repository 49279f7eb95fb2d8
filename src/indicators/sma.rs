// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
//   SMA_t = (x_{t-period+1} + ... + x_t) / period
// =============================================================================

/// Rolling mean over `period` values, aligned with `values`.
///
/// # Edge cases
/// - `period == 0` => all `None`
/// - The first `period - 1` elements are `None` (warm-up).
/// - A window containing a non-finite value yields `None`.
pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let period_f = period as f64;
    for (i, window) in values.windows(period).enumerate() {
        let mean = window.iter().sum::<f64>() / period_f;
        if mean.is_finite() {
            out[i + period - 1] = Some(mean);
        }
    }
    out
}
