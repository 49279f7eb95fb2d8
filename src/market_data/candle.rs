use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle from the Binance klines endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// All price and volume fields are finite numbers.
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

// ---------------------------------------------------------------------------
// CandleSeries -- ordered, de-duplicated candles for one symbol
// ---------------------------------------------------------------------------

/// Candles ordered by ascending `open_time` with no duplicate timestamps.
///
/// The invariant is established once in [`CandleSeries::new`]; the series is
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series from candles in any order.
    ///
    /// * Rows are sorted by `open_time` (stable, so arrival order breaks ties).
    /// * When several rows share an `open_time` the last one received wins,
    ///   matching how an exchange revises an in-progress candle.
    /// * Rows with a non-finite price or volume are dropped.
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.retain(Candle::is_finite);
        candles.sort_by_key(|c| c.open_time);

        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for candle in candles {
            match deduped.last_mut() {
                Some(last) if last.open_time == candle.open_time => *last = candle,
                _ => deduped.push(candle),
            }
        }

        Self { candles: deduped }
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Volumes, oldest first.
    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

impl From<Vec<Candle>> for CandleSeries {
    fn from(candles: Vec<Candle>) -> Self {
        Self::new(candles)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle(open_time: i64, close: f64) -> Candle {
        Candle::new(open_time, close, close + 1.0, close - 1.0, close, 100.0, open_time + 59_999)
    }

    #[test]
    fn series_sorts_by_open_time() {
        let series = CandleSeries::new(vec![
            sample_candle(120_000, 3.0),
            sample_candle(0, 1.0),
            sample_candle(60_000, 2.0),
        ]);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duplicate_timestamps_keep_latest_revision() {
        let series = CandleSeries::new(vec![
            sample_candle(0, 1.0),
            sample_candle(60_000, 2.0),
            sample_candle(60_000, 2.5),
        ]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().map(|c| c.close), Some(2.5));
    }

    #[test]
    fn empty_series() {
        let series = CandleSeries::default();
        assert!(series.is_empty());
        assert!(series.last().is_none());
    }

    #[test]
    fn nan_candle_is_not_finite() {
        let mut c = sample_candle(0, 1.0);
        assert!(c.is_finite());
        c.high = f64::NAN;
        assert!(!c.is_finite());
    }

    #[test]
    fn non_finite_rows_are_dropped() {
        let mut bad = sample_candle(60_000, 2.0);
        bad.volume = f64::INFINITY;
        let mut bad_revision = sample_candle(0, 9.0);
        bad_revision.close = f64::NAN;

        let series = CandleSeries::new(vec![
            sample_candle(0, 1.0),
            bad,
            bad_revision,
            sample_candle(120_000, 3.0),
        ]);
        assert_eq!(series.closes(), vec![1.0, 3.0]);
    }
}
