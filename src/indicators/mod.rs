// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the technical indicators used by
// the feature enricher.  Every series function returns a `Vec<Option<f64>>`
// aligned index-for-index with its input: element `i` depends only on inputs
// `0..=i`, and is `None` during the look-back warm-up or when the value is
// numerically undefined.  Callers never see a warm-up value disguised as zero.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod roc;
pub mod rsi;
pub mod sma;

/// Apply a compact series function to the defined tail of an aligned series
/// and re-align the result.
///
/// `f` receives the contiguous run of values starting at the first `Some`
/// and must return one output per input (its own warm-up as `None`).  A gap
/// after the first defined value ends the run; everything after it is `None`.
pub(crate) fn over_defined<F>(series: &[Option<f64>], f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Vec<Option<f64>>,
{
    let mut out = vec![None; series.len()];
    let Some(start) = series.iter().position(Option::is_some) else {
        return out;
    };

    let run: Vec<f64> = series[start..].iter().map_while(|v| *v).collect();
    for (offset, value) in f(&run).into_iter().enumerate() {
        out[start + offset] = value;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_defined_realigns_output() {
        let series = vec![None, None, Some(1.0), Some(2.0), Some(3.0)];
        let doubled = over_defined(&series, |xs| xs.iter().map(|x| Some(x * 2.0)).collect());
        assert_eq!(doubled, vec![None, None, Some(2.0), Some(4.0), Some(6.0)]);
    }

    #[test]
    fn over_defined_stops_at_gap() {
        let series = vec![Some(1.0), None, Some(3.0)];
        let same = over_defined(&series, |xs| xs.iter().map(|x| Some(*x)).collect());
        assert_eq!(same, vec![Some(1.0), None, None]);
    }

    #[test]
    fn over_defined_all_none() {
        let series = vec![None; 4];
        assert_eq!(over_defined(&series, |xs| xs.iter().map(|x| Some(*x)).collect()), series);
    }
}
