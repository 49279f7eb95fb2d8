// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// ADX quantifies trend **strength** regardless of direction.
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.
//   2. Compute True Range (TR) per bar.
//   3. Apply Wilder's smoothing (period) to +DM, -DM, and TR.
//   4. Derive +DI = smoothed(+DM) / smoothed(TR) * 100
//            -DI = smoothed(-DM) / smoothed(TR) * 100
//   5. DX  = |+DI - -DI| / (+DI + -DI) * 100
//   6. ADX = Wilder's smoothed average of DX over `period` bars.
//
// Interpretation:
//   ADX > 25  => trending market
//   ADX < 20  => ranging / choppy market
// =============================================================================

use super::atr::true_range;
use crate::market_data::Candle;

/// Compute the ADX series for `candles`, aligned with the input.
///
/// The first DX value belongs to index `period` (after `period` bar-to-bar
/// transitions); the seeded ADX therefore sits at index `2 * period - 1`.
///
/// # Edge cases
/// - `period == 0` or fewer than `2 * period` candles => all `None`.
/// - A bar window with zero total range has no defined DX; the series ends
///   there.
pub fn calculate_adx(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < 2 * period {
        return out;
    }

    let period_f = period as f64;

    // ------------------------------------------------------------------
    // Step 1 & 2: Raw +DM, -DM, and True Range for each consecutive pair
    // ------------------------------------------------------------------
    let bar_count = candles.len() - 1;
    let mut plus_dm = Vec::with_capacity(bar_count);
    let mut minus_dm = Vec::with_capacity(bar_count);
    let mut tr_vals = Vec::with_capacity(bar_count);

    for w in candles.windows(2) {
        let (prev, cur) = (&w[0], &w[1]);
        let up_move = cur.high - prev.high;
        let down_move = prev.low - cur.low;

        plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
        minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
        tr_vals.push(true_range(cur, prev.close));
    }

    // ------------------------------------------------------------------
    // Step 3-5: Wilder's smoothing, DI and DX per bar
    // ------------------------------------------------------------------
    let mut smooth_plus_dm: f64 = plus_dm[..period].iter().sum();
    let mut smooth_minus_dm: f64 = minus_dm[..period].iter().sum();
    let mut smooth_tr: f64 = tr_vals[..period].iter().sum();

    // dx_values[j] belongs to candle index period + j.
    let mut dx_values: Vec<f64> = Vec::with_capacity(bar_count - period + 1);
    match compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr) {
        Some(dx) => dx_values.push(dx),
        None => return out,
    }

    for i in period..bar_count {
        smooth_plus_dm = smooth_plus_dm - smooth_plus_dm / period_f + plus_dm[i];
        smooth_minus_dm = smooth_minus_dm - smooth_minus_dm / period_f + minus_dm[i];
        smooth_tr = smooth_tr - smooth_tr / period_f + tr_vals[i];

        match compute_dx(smooth_plus_dm, smooth_minus_dm, smooth_tr) {
            Some(dx) => dx_values.push(dx),
            None => break,
        }
    }

    // ------------------------------------------------------------------
    // Step 6: ADX = Wilder's smoothed average of DX
    // ------------------------------------------------------------------
    if dx_values.len() < period {
        return out;
    }

    let mut adx: f64 = dx_values[..period].iter().sum::<f64>() / period_f;
    if !adx.is_finite() {
        return out;
    }
    out[2 * period - 1] = Some(adx);

    for (j, &dx) in dx_values.iter().enumerate().skip(period) {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
        if !adx.is_finite() {
            break;
        }
        out[period + j] = Some(adx);
    }

    out
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Compute DX from smoothed +DM, -DM, and TR values.
///
/// Returns `None` if the divisor is zero or the result is non-finite.
fn compute_dx(smooth_plus_dm: f64, smooth_minus_dm: f64, smooth_tr: f64) -> Option<f64> {
    if smooth_tr == 0.0 {
        return None;
    }

    let plus_di = (smooth_plus_dm / smooth_tr) * 100.0;
    let minus_di = (smooth_minus_dm / smooth_tr) * 100.0;

    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        // Both +DI and -DI are zero — no directional movement.
        return Some(0.0);
    }

    let dx = ((plus_di - minus_di).abs() / di_sum) * 100.0;
    dx.is_finite().then_some(dx)
}
