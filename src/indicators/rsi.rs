// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing, plus Stochastic RSI
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Stochastic RSI places the current RSI inside its own recent range:
//   StochRSI = (RSI - min(RSI, n)) / (max(RSI, n) - min(RSI, n))
//   %K       = SMA(StochRSI, k)
//   %D       = SMA(%K, d)
// =============================================================================

use super::over_defined;
use super::sma::calculate_sma;

/// Compute the RSI series for `closes`, aligned with the input.
///
/// The first RSI value sits at index `period` (the first `period` deltas seed
/// the averages).
///
/// # Edge cases
/// - `period == 0` or `closes.len() < period + 1` => all `None`
/// - If average loss is zero (no down moves), RSI is clamped to 100.0.
/// - A non-finite result ends the series.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    // --- Compute price deltas ------------------------------------------------
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // --- Seed averages with SMA of first `period` deltas ---------------------
    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let Some(first) = rsi_from_averages(avg_gain, avg_loss) else {
        return out;
    };
    out[period] = Some(first);

    // --- Wilder's smoothing for subsequent values ----------------------------
    // deltas[j] is the move into closes[j + 1].
    for (j, &delta) in deltas.iter().enumerate().skip(period) {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => out[j + 1] = Some(rsi),
            None => break,
        }
    }

    out
}

/// Stochastic RSI components, each aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct StochRsiSeries {
    pub value: Vec<Option<f64>>,
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// Compute Stochastic RSI (value in [0, 1]) with %K / %D smoothing.
///
/// A window where RSI did not move at all (max == min) has no defined
/// position and yields `None`, which propagates into %K / %D.
pub fn calculate_stoch_rsi(
    closes: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_period: usize,
    d_period: usize,
) -> StochRsiSeries {
    let rsi = calculate_rsi(closes, rsi_period);
    let mut value = vec![None; closes.len()];

    if stoch_period > 0 {
        for i in 0..rsi.len() {
            if i + 1 < stoch_period {
                continue;
            }
            let window = &rsi[i + 1 - stoch_period..=i];
            let Some(vals) = window.iter().copied().collect::<Option<Vec<f64>>>() else {
                continue;
            };
            let lo = vals.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = hi - lo;
            if range > 0.0 {
                value[i] = Some((vals[vals.len() - 1] - lo) / range);
            }
        }
    }

    let k = over_defined(&value, |xs| calculate_sma(xs, k_period));
    let d = over_defined(&k, |xs| calculate_sma(xs, d_period));

    StochRsiSeries { value, k, d }
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - If average loss is zero (only gains), RSI is 100.0.
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    if rsi.is_finite() {
        Some(rsi)
    } else {
        None
    }
}
