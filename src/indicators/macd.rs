// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD   = EMA(fast) - EMA(slow)
//   Signal = EMA(MACD, signal)
//   Diff   = MACD - Signal            (the histogram)
//
// Standard parameters: 12 / 26 / 9.
// =============================================================================

use super::ema::calculate_ema;
use super::over_defined;

/// MACD line, signal line and histogram, each aligned with the input closes.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub diff: Vec<Option<f64>>,
}

/// Compute MACD for `closes`.
///
/// The MACD line is defined from index `slow - 1`; the signal line needs a
/// further `signal - 1` MACD values on top of that.
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let fast_ema = calculate_ema(closes, fast);
    let slow_ema = calculate_ema(closes, slow);

    let macd: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal_line = over_defined(&macd, |xs| calculate_ema(xs, signal));

    let diff = macd
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        macd,
        signal: signal_line,
        diff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_warmup_indices() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let m = calculate_macd(&closes, 12, 26, 9);
        let first = |s: &[Option<f64>]| s.iter().position(Option::is_some).unwrap();
        assert_eq!(first(&m.macd), 25);
        assert_eq!(first(&m.signal), 33);
        assert_eq!(first(&m.diff), 33);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64 * 2.0).collect();
        let m = calculate_macd(&closes, 12, 26, 9);
        assert!(m.macd.last().unwrap().unwrap() > 0.0);
    }

    #[test]
    fn macd_flat_is_zero() {
        let m = calculate_macd(&[50.0; 60], 12, 26, 9);
        assert!(m.macd[59].unwrap().abs() < 1e-10);
        assert!(m.diff[59].unwrap().abs() < 1e-10);
    }

    #[test]
    fn macd_insufficient_data() {
        let m = calculate_macd(&[1.0; 20], 12, 26, 9);
        assert!(m.macd.iter().all(Option::is_none));
        assert!(m.signal.iter().all(Option::is_none));
    }
}
