// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_0   = SMA of first `period` TR values
//   ATR_t   = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// Default period: 14
// =============================================================================

use crate::market_data::Candle;

/// True Range of `candle` given the previous bar's close.
///
/// NaN when any input is non-finite; `f64::max` would otherwise skip it.
pub(crate) fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    if !(candle.high.is_finite() && candle.low.is_finite() && prev_close.is_finite()) {
        return f64::NAN;
    }
    let hl = candle.high - candle.low;
    let hc = (candle.high - prev_close).abs();
    let lc = (candle.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Compute the ATR series for `candles` (oldest first), aligned with the
/// input.
///
/// TR needs a previous close, so the first TR belongs to index 1 and the
/// seeded ATR sits at index `period`.
///
/// # Edge cases
/// - `period == 0` or fewer than `period + 1` candles => all `None`.
/// - A non-finite intermediate value ends the series.
pub fn calculate_atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    if period == 0 || candles.len() < period + 1 {
        return out;
    }

    // --- Step 1: True Range for each consecutive pair ------------------------
    // tr_values[j] belongs to candle index j + 1.
    let tr_values: Vec<f64> = candles
        .windows(2)
        .map(|w| true_range(&w[1], w[0].close))
        .collect();

    // --- Step 2: Seed ATR with SMA of first `period` TR values ---------------
    let period_f = period as f64;
    let seed: f64 = tr_values[..period].iter().sum::<f64>() / period_f;
    if !seed.is_finite() {
        return out;
    }
    out[period] = Some(seed);

    // --- Step 3: Wilder's smoothing for remaining TR values ------------------
    let mut atr = seed;
    for (j, &tr) in tr_values.iter().enumerate().skip(period) {
        atr = (atr * (period_f - 1.0) + tr) / period_f;
        if !atr.is_finite() {
            break;
        }
        out[j + 1] = Some(atr);
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Build a test candle with the given OHLC values.
    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 100.0, 0)
    }

    fn last(series: &[Option<f64>]) -> Option<f64> {
        series.last().copied().flatten()
    }

    #[test]
    fn atr_period_zero() {
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 20];
        assert!(calculate_atr(&candles, 0).iter().all(Option::is_none));
    }

    #[test]
    fn atr_insufficient_data() {
        // Need period + 1 = 15 candles for period=14, only have 10.
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 10];
        assert!(calculate_atr(&candles, 14).iter().all(Option::is_none));
    }

    #[test]
    fn atr_exact_minimum_data() {
        // period=3, need 4 candles to get 3 TR values.
        let candles = vec![
            candle(100.0, 102.0, 98.0, 101.0),
            candle(101.0, 104.0, 99.0, 103.0),
            candle(103.0, 106.0, 100.0, 105.0),
            candle(105.0, 108.0, 102.0, 107.0),
        ];
        let atr = calculate_atr(&candles, 3);
        assert!(atr[..3].iter().all(Option::is_none));
        let val = atr[3].unwrap();
        assert!(val > 0.0);
        assert!(val.is_finite());
    }

    #[test]
    fn atr_constant_range() {
        // All candles have the same range (H-L=10), close at midpoint.
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                candle(base, base + 5.0, base - 5.0, base)
            })
            .collect();
        let atr = last(&calculate_atr(&candles, 14)).unwrap();
        assert!((atr - 10.0).abs() < 1.0, "expected ATR near 10.0, got {atr}");
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        // Gap scenario: |H - prevClose| > H - L
        let candles = vec![
            candle(100.0, 105.0, 95.0, 95.0),
            candle(110.0, 115.0, 108.0, 112.0), // |115-95|=20 > 115-108=7
            candle(112.0, 118.0, 110.0, 115.0),
            candle(115.0, 120.0, 113.0, 118.0),
        ];
        let atr = last(&calculate_atr(&candles, 3)).unwrap();
        assert!(atr > 7.0, "ATR should reflect the gap, got {atr}");
    }

    #[test]
    fn atr_nan_ends_series() {
        let candles = vec![
            candle(100.0, 105.0, 95.0, 100.0),
            candle(100.0, f64::NAN, 95.0, 100.0),
            candle(100.0, 105.0, 95.0, 100.0),
            candle(100.0, 105.0, 95.0, 100.0),
        ];
        assert!(calculate_atr(&candles, 3).iter().all(Option::is_none));
    }

    #[test]
    fn atr_nan_after_seed_truncates() {
        let mut candles = vec![candle(100.0, 105.0, 95.0, 100.0); 6];
        candles[5].low = f64::NAN;
        let atr = calculate_atr(&candles, 3);
        assert!(atr[3].is_some() && atr[4].is_some());
        assert!(atr[5].is_none());
    }

    #[test]
    fn true_range_propagates_nan() {
        let c = candle(100.0, 105.0, 95.0, 100.0);
        assert!(true_range(&c, f64::NAN).is_nan());
        assert!(true_range(&candle(100.0, f64::INFINITY, 95.0, 100.0), 100.0).is_nan());
        assert_eq!(true_range(&c, 100.0), 10.0);
    }
}
