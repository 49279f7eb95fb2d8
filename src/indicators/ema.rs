// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value is seeded with the SMA of the first `period` closes.
//
// `calculate_ewm` is the span-adjusted variant (no seed, defined from the
// first sample) used for the volume baseline.
// =============================================================================

/// Compute the EMA series for `values` and look-back `period`, aligned with
/// the input.
///
/// # Edge cases
/// - `period == 0` => all `None` (division by zero guard)
/// - `values.len() < period` => all `None`
/// - The first `period - 1` elements are `None`; the seed sits at `period - 1`.
/// - A non-finite intermediate value ends the series: every later element is
///   `None`, since downstream consumers should not trust a broken series.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let sma: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !sma.is_finite() {
        return out;
    }
    out[period - 1] = Some(sma);

    let mut prev_ema = sma;
    for (i, &value) in values.iter().enumerate().skip(period) {
        let ema = value * multiplier + prev_ema * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        out[i] = Some(ema);
        prev_ema = ema;
    }

    out
}

/// Span-adjusted exponentially weighted mean, aligned with `values`.
///
///   alpha  = 2 / (span + 1)
///   EWM_t  = sum_k (1-alpha)^k * x_{t-k} / sum_k (1-alpha)^k
///
/// Defined from the first element.  A non-finite input ends the series.
pub fn calculate_ewm(values: &[f64], span: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if span == 0 {
        return out;
    }

    let decay = 1.0 - 2.0 / (span + 1) as f64;
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (i, &value) in values.iter().enumerate() {
        numerator = value + decay * numerator;
        denominator = 1.0 + decay * denominator;
        let ewm = numerator / denominator;
        if !ewm.is_finite() {
            break;
        }
        out[i] = Some(ewm);
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    // ---- calculate_ema ---------------------------------------------------

    #[test]
    fn ema_empty_input() {
        assert!(calculate_ema(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        assert_eq!(calculate_ema(&[1.0, 2.0, 3.0], 0), vec![None, None, None]);
    }

    #[test]
    fn ema_insufficient_data() {
        assert_eq!(calculate_ema(&[1.0, 2.0], 5), vec![None, None]);
    }

    #[test]
    fn ema_period_equals_length() {
        let ema = calculate_ema(&[2.0, 4.0, 6.0], 3);
        // Only the seed: SMA = (2+4+6)/3 = 4.0
        assert_eq!(ema[..2], [None, None]);
        assert!((ema[2].unwrap() - 4.0).abs() < 1e-10);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of [1..10]: SMA seed of first 5 = 3.0, multiplier = 1/3
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = calculate_ema(&closes, 5);
        assert_eq!(ema.len(), 10);
        assert!(ema[..4].iter().all(Option::is_none));

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        assert!((ema[4].unwrap() - expected).abs() < 1e-10);
        for i in 5..10 {
            expected = closes[i] * mult + expected * (1.0 - mult);
            assert!((ema[i].unwrap() - expected).abs() < 1e-10, "index {i}");
        }
    }

    #[test]
    fn ema_handles_nan_in_input() {
        let ema = calculate_ema(&[1.0, 2.0, 3.0, f64::NAN, 5.0], 3);
        // Seed at index 2, then NaN breaks the series.
        assert!(ema[2].is_some());
        assert!(ema[3].is_none());
        assert!(ema[4].is_none());
    }

    // ---- calculate_ewm ---------------------------------------------------

    #[test]
    fn ewm_constant_series_is_constant() {
        let ewm = calculate_ewm(&[7.0; 30], 20);
        for v in ewm {
            assert!((v.unwrap() - 7.0).abs() < 1e-10);
        }
    }

    #[test]
    fn ewm_first_value_is_input() {
        let ewm = calculate_ewm(&[3.0, 5.0], 3);
        assert!((ewm[0].unwrap() - 3.0).abs() < 1e-10);
        // alpha = 0.5 => (5 + 0.5*3) / (1 + 0.5) = 4.333..
        assert!((ewm[1].unwrap() - 6.5 / 1.5).abs() < 1e-10);
    }
}
