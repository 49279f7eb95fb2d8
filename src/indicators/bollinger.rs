// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ). The Band Width (BBW) is the normalised
// distance: BBW = (upper - lower) / middle * 100.

/// Result of a Bollinger Band calculation at one index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// Calculate Bollinger Bands for every index of `closes`.
///
/// Element `i` uses the window `closes[i + 1 - period ..= i]` (population
/// standard deviation) and holds:
/// - `upper`  = SMA + `num_std` * σ
/// - `middle` = SMA
/// - `lower`  = SMA - `num_std` * σ
/// - `width`  = (upper - lower) / middle * 100
///
/// Element `i` is `None` when:
/// - `i < period - 1` (warm-up) or `period == 0`.
/// - Middle band is zero (degenerate input).
/// - Any result is non-finite.
pub fn calculate_bollinger(
    closes: &[f64],
    period: usize,
    num_std: f64,
) -> Vec<Option<BollingerResult>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period {
        return out;
    }

    let period_f = period as f64;
    for (i, window) in closes.windows(period).enumerate() {
        let middle = window.iter().sum::<f64>() / period_f;
        if middle == 0.0 {
            continue;
        }

        let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period_f;
        let std_dev = variance.sqrt();

        let upper = middle + num_std * std_dev;
        let lower = middle - num_std * std_dev;
        let width = (upper - lower) / middle * 100.0;

        if width.is_finite() && upper.is_finite() && lower.is_finite() {
            out[i + period - 1] = Some(BollingerResult {
                upper,
                middle,
                lower,
                width,
            });
        }
    }
    out
}
