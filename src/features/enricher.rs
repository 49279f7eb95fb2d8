// =============================================================================
// Feature Enricher — candle series => per-row feature vectors
// =============================================================================
//
// Pipeline:
//   1. Reject series shorter than the slowest look-back window.
//   2. Compute every indicator as a full aligned series (no lookahead: value
//      `i` only reads candles `0..=i`).
//   3. Assemble one `FeatureVector` per candle.
//   4. Trim the warm-up rows whose slow indicators are undefined.
//
// Multi-horizon variations are specified in minutes and converted to sample
// counts for the candle interval; a horizon longer than the series (or
// shorter than one candle) stays absent and lowers completeness.
// =============================================================================

use tracing::debug;

use super::{Feature, FeatureVector};
use crate::error::EnrichmentError;
use crate::indicators::adx::calculate_adx;
use crate::indicators::atr::calculate_atr;
use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::ema::{calculate_ema, calculate_ewm};
use crate::indicators::macd::calculate_macd;
use crate::indicators::roc::calculate_roc;
use crate::indicators::rsi::{calculate_rsi, calculate_stoch_rsi};
use crate::indicators::sma::calculate_sma;
use crate::market_data::CandleSeries;

// ── Canonical parameters (schema v1) ────────────────────────────────────────
const RSI_PERIOD: usize = 14;
const STOCH_PERIOD: usize = 14;
const STOCH_K: usize = 3;
const STOCH_D: usize = 3;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
const SMA_FAST: usize = 10;
const SMA_SLOW: usize = 50;
const EMA_PERIOD: usize = 20;
const BB_PERIOD: usize = 20;
const BB_STD: f64 = 2.0;
const ADX_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const ROC_PERIOD: usize = 12;
const VOLUME_EWM_SPAN: usize = 20;

/// Minimum number of candles: the slowest window (SMA-50).  The first
/// `WARMUP_ROWS - 1` rows are trimmed from the output.
pub const WARMUP_ROWS: usize = SMA_SLOW;

/// Horizons (minutes) of the multi-horizon variation features.
const HORIZON_10M: u32 = 10;
const HORIZON_1H: u32 = 60;
const HORIZON_24H: u32 = 1440;

/// Parse a Binance-style interval (`1m`, `5m`, `1h`, `1d`, ...) into minutes.
pub fn interval_minutes(interval: &str) -> Option<u32> {
    let (unit_at, unit) = interval.char_indices().last()?;
    let n: u32 = interval[..unit_at].parse().ok().filter(|n| *n > 0)?;
    let per_unit = match unit {
        'm' => 1,
        'h' => 60,
        'd' => 1440,
        'w' => 10_080,
        _ => return None,
    };
    n.checked_mul(per_unit)
}

/// Sample counts for the three variation horizons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnricherConfig {
    /// `None` when the horizon is shorter than one candle.
    pub short_samples: Option<usize>,
    pub medium_samples: Option<usize>,
    pub long_samples: Option<usize>,
}

impl EnricherConfig {
    /// Derive horizon sample counts for a candle `interval` (e.g. `"5m"`).
    ///
    /// Returns `None` for an unparseable interval.
    pub fn for_interval(interval: &str) -> Option<Self> {
        let minutes = interval_minutes(interval)?;
        let samples = |horizon: u32| {
            (horizon >= minutes).then(|| (horizon as f64 / minutes as f64).round() as usize)
        };
        Some(Self {
            short_samples: samples(HORIZON_10M),
            medium_samples: samples(HORIZON_1H),
            long_samples: samples(HORIZON_24H),
        })
    }
}

impl Default for EnricherConfig {
    /// 5-minute candles: 2 / 12 / 288 samples.
    fn default() -> Self {
        Self {
            short_samples: Some(2),
            medium_samples: Some(12),
            long_samples: Some(288),
        }
    }
}

/// Enriched rows of one candle series, warm-up already trimmed.
///
/// Never empty: construction fails with `InsufficientData` instead.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    rows: Vec<FeatureVector>,
}

impl FeatureFrame {
    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    /// The most recent row, the one the auditor scores.
    pub fn latest(&self) -> &FeatureVector {
        // Non-empty by construction.
        &self.rows[self.rows.len() - 1]
    }

    /// Completeness of the latest row.
    pub fn completeness(&self) -> f64 {
        self.latest().completeness()
    }

    pub fn into_latest(mut self) -> FeatureVector {
        self.rows.swap_remove(self.rows.len() - 1)
    }
}

/// Stateless candle => feature transform.
#[derive(Debug, Clone, Default)]
pub struct FeatureEnricher {
    config: EnricherConfig,
}

impl FeatureEnricher {
    pub fn new(config: EnricherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnricherConfig {
        &self.config
    }

    /// Transform `series` into feature rows.
    ///
    /// Fails with [`EnrichmentError::InsufficientData`] when the series is
    /// shorter than [`WARMUP_ROWS`].
    pub fn enrich(&self, series: &CandleSeries) -> Result<FeatureFrame, EnrichmentError> {
        let n = series.len();
        if n < WARMUP_ROWS {
            return Err(EnrichmentError::InsufficientData {
                got: n,
                need: WARMUP_ROWS,
            });
        }

        let candles = series.candles();
        let closes = series.closes();
        let volumes = series.volumes();

        // ── Trend ────────────────────────────────────────────────────────
        let sma_fast = calculate_sma(&closes, SMA_FAST);
        let sma_slow = calculate_sma(&closes, SMA_SLOW);
        let ema = calculate_ema(&closes, EMA_PERIOD);
        let macd = calculate_macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
        let adx = calculate_adx(candles, ADX_PERIOD);

        // ── Momentum ─────────────────────────────────────────────────────
        let rsi = calculate_rsi(&closes, RSI_PERIOD);
        let stoch = calculate_stoch_rsi(&closes, RSI_PERIOD, STOCH_PERIOD, STOCH_K, STOCH_D);
        let roc = calculate_roc(&closes, ROC_PERIOD);

        // ── Volatility / volume ──────────────────────────────────────────
        let bands = calculate_bollinger(&closes, BB_PERIOD, BB_STD);
        let atr = calculate_atr(candles, ATR_PERIOD);
        let volume_ema = calculate_ewm(&volumes, VOLUME_EWM_SPAN);

        // ── Multi-horizon returns ────────────────────────────────────────
        let horizon = |samples: Option<usize>| match samples {
            Some(k) => calculate_roc(&closes, k),
            None => vec![None; n],
        };
        let var_short = horizon(self.config.short_samples);
        let var_medium = horizon(self.config.medium_samples);
        let var_long = horizon(self.config.long_samples);

        let mut rows = Vec::with_capacity(n - WARMUP_ROWS + 1);
        for i in (WARMUP_ROWS - 1)..n {
            let c = &candles[i];
            let mut row = FeatureVector::new(c.open_time, c.close);

            row.set(Feature::Rsi, rsi[i]);
            row.set(Feature::StochRsi, stoch.value[i]);
            row.set(Feature::StochRsiK, stoch.k[i]);
            row.set(Feature::StochRsiD, stoch.d[i]);
            row.set(Feature::Roc, roc[i]);
            row.set(Feature::Momentum, Some(c.close - candles[i - 1].close));

            row.set(Feature::Macd, macd.macd[i]);
            row.set(Feature::MacdSignal, macd.signal[i]);
            row.set(Feature::MacdDiff, macd.diff[i]);
            row.set(Feature::Sma10, sma_fast[i]);
            row.set(Feature::Sma50, sma_slow[i]);
            row.set(Feature::Ema20, ema[i]);
            row.set(Feature::Adx, adx[i]);

            row.set(Feature::BollingerHigh, bands[i].map(|b| b.upper));
            row.set(Feature::BollingerLow, bands[i].map(|b| b.lower));
            row.set(Feature::BollingerWidth, bands[i].map(|b| b.width));
            row.set(Feature::Atr, atr[i]);

            row.set(Feature::Volume, Some(c.volume));
            row.set(Feature::VolumeEma, volume_ema[i]);

            let prev_close = candles[i - 1].close;
            row.set(Feature::DeltaPct, pct_change(c.close, prev_close));
            row.set(Feature::Variation, pct_change(c.close, c.open));
            row.set(Feature::UpperShadow, Some(c.high - c.close.max(c.open)));
            row.set(Feature::LowerShadow, Some(c.close.min(c.open) - c.low));
            row.set(Feature::BodySize, Some((c.close - c.open).abs()));

            row.set(Feature::Variation10m, var_short[i]);
            row.set(Feature::Variation1h, var_medium[i]);
            row.set(Feature::Variation24h, var_long[i]);

            rows.push(row);
        }

        debug!(
            candles = n,
            rows = rows.len(),
            completeness = rows.last().map(FeatureVector::completeness),
            "feature enrichment complete"
        );

        Ok(FeatureFrame { rows })
    }
}

/// Percent change from `reference` to `value`; `None` if `reference` is zero.
fn pct_change(value: f64, reference: f64) -> Option<f64> {
    if reference == 0.0 {
        return None;
    }
    Some((value - reference) / reference * 100.0)
}
