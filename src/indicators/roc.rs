// =============================================================================
// Rate of Change (ROC) — Momentum Indicator
// =============================================================================
//
// ROC measures the percentage change in price over a look-back period:
//   ROC = ((close - close_n) / close_n) * 100
//
// Positive ROC indicates upward momentum; negative indicates downward.  The
// same formula gives the multi-horizon variations (10m / 1h / 24h) once the
// horizon is converted to a sample count.

/// Calculate the Rate of Change for `closes` and `period`, aligned with the
/// input: element `i` compares `closes[i]` with `closes[i - period]`.
///
/// Element `i` is `None` for `i < period`, when the reference close is zero,
/// or when the result is non-finite.
pub fn calculate_roc(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 {
        return out;
    }

    for i in period..closes.len() {
        let prev = closes[i - period];
        if prev == 0.0 {
            continue;
        }
        let roc = ((closes[i] - prev) / prev) * 100.0;
        if roc.is_finite() {
            out[i] = Some(roc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roc_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let roc = calculate_roc(&closes, 14);
        assert!(roc[13].is_none());
        // From 1 to 15: ROC = (15-1)/1 * 100 = 1400%
        assert!((roc[14].unwrap() - 1400.0).abs() < 1e-10);
    }

    #[test]
    fn roc_insufficient_data() {
        assert!(calculate_roc(&[1.0, 2.0, 3.0], 14).iter().all(Option::is_none));
    }

    #[test]
    fn roc_zero_reference_is_absent() {
        let roc = calculate_roc(&[0.0, 5.0, 10.0], 1);
        assert_eq!(roc[1], None);
        assert!((roc[2].unwrap() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn roc_period_zero() {
        assert!(calculate_roc(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }
}
