// =============================================================================
// Feature Schema — versioned, fixed set of named indicator fields
// =============================================================================
//
// A `FeatureVector` is one row of the enriched candle series.  Every field is
// an `Option<f64>`: `None` means "not computable for this row" (look-back
// warm-up, horizon longer than the series, degenerate input) and is never
// conflated with a genuine zero.
//
// Completeness is derived from the values on every call and never stored, so
// it can not go stale when a field changes.
// =============================================================================

pub mod enricher;

pub use enricher::{EnricherConfig, FeatureEnricher};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Version tag of the canonical feature schema.  Bump whenever a field is
/// added, removed or its parameters change.
pub const FEATURE_SCHEMA_VERSION: &str = "v1";

/// Every field of the canonical schema, in column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    // Momentum
    Rsi,
    StochRsi,
    StochRsiK,
    StochRsiD,
    Roc,
    Momentum,
    // Trend
    Macd,
    MacdSignal,
    MacdDiff,
    Sma10,
    Sma50,
    Ema20,
    Adx,
    // Volatility
    BollingerHigh,
    BollingerLow,
    BollingerWidth,
    Atr,
    // Volume
    Volume,
    VolumeEma,
    // Candle geometry
    DeltaPct,
    Variation,
    UpperShadow,
    LowerShadow,
    BodySize,
    // Multi-horizon returns
    Variation10m,
    Variation1h,
    Variation24h,
}

impl Feature {
    pub const COUNT: usize = 27;

    pub const ALL: [Feature; Self::COUNT] = [
        Feature::Rsi,
        Feature::StochRsi,
        Feature::StochRsiK,
        Feature::StochRsiD,
        Feature::Roc,
        Feature::Momentum,
        Feature::Macd,
        Feature::MacdSignal,
        Feature::MacdDiff,
        Feature::Sma10,
        Feature::Sma50,
        Feature::Ema20,
        Feature::Adx,
        Feature::BollingerHigh,
        Feature::BollingerLow,
        Feature::BollingerWidth,
        Feature::Atr,
        Feature::Volume,
        Feature::VolumeEma,
        Feature::DeltaPct,
        Feature::Variation,
        Feature::UpperShadow,
        Feature::LowerShadow,
        Feature::BodySize,
        Feature::Variation10m,
        Feature::Variation1h,
        Feature::Variation24h,
    ];

    /// Column name used by the inference contract.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Rsi => "rsi",
            Feature::StochRsi => "stoch_rsi",
            Feature::StochRsiK => "stoch_rsi_k",
            Feature::StochRsiD => "stoch_rsi_d",
            Feature::Roc => "roc",
            Feature::Momentum => "momentum",
            Feature::Macd => "macd",
            Feature::MacdSignal => "macd_signal",
            Feature::MacdDiff => "macd_diff",
            Feature::Sma10 => "sma_10",
            Feature::Sma50 => "sma_50",
            Feature::Ema20 => "ema_20",
            Feature::Adx => "adx",
            Feature::BollingerHigh => "bollinger_high",
            Feature::BollingerLow => "bollinger_low",
            Feature::BollingerWidth => "bollinger_width",
            Feature::Atr => "atr",
            Feature::Volume => "volume",
            Feature::VolumeEma => "volume_ema",
            Feature::DeltaPct => "delta_pct",
            Feature::Variation => "variation",
            Feature::UpperShadow => "upper_shadow",
            Feature::LowerShadow => "lower_shadow",
            Feature::BodySize => "body_size",
            Feature::Variation10m => "variation_10m",
            Feature::Variation1h => "variation_1h",
            Feature::Variation24h => "variation_24h",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One enriched row: the value of every schema field at a single candle.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    /// Open time (ms) of the candle this row describes.
    pub open_time: i64,
    /// Close price of that candle.
    pub close: f64,
    values: [Option<f64>; Feature::COUNT],
}

impl FeatureVector {
    /// An empty row: every field absent.
    pub fn new(open_time: i64, close: f64) -> Self {
        Self {
            open_time,
            close,
            values: [None; Feature::COUNT],
        }
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values[feature.index()]
    }

    /// Set a field.  Non-finite values are stored as absent.
    pub fn set(&mut self, feature: Feature, value: Option<f64>) {
        self.values[feature.index()] = value.filter(|v| v.is_finite());
    }

    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Names of the fields that are absent in this row.
    pub fn missing(&self) -> Vec<Feature> {
        Feature::ALL.iter().copied().filter(|f| self.get(*f).is_none()).collect()
    }

    /// Fraction of schema fields present, in [0, 1].
    pub fn completeness(&self) -> f64 {
        self.present_count() as f64 / Feature::COUNT as f64
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Feature::COUNT + 3))?;
        map.serialize_entry("open_time", &self.open_time)?;
        map.serialize_entry("close", &self.close)?;
        for feature in Feature::ALL {
            map.serialize_entry(feature.name(), &self.get(feature))?;
        }
        map.serialize_entry("completeness", &self.completeness())?;
        map.end()
    }
}
