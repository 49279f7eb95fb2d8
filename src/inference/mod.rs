// =============================================================================
// Inference — classifier contract, schema alignment and graceful fallback
// =============================================================================
//
// The model is trained offline; at audit time it is only a function from an
// ordered feature row to P(up).  This module
//   - aligns a `FeatureVector` with the model's declared column list,
//     backfilling anything structurally missing with 0.0,
//   - turns every model failure into an UNKNOWN / 0.0 prediction, so a broken
//     model degrades a row instead of aborting the batch,
//   - keeps the loaded model in a store that can be swapped atomically.
// =============================================================================

pub mod logistic;

pub use logistic::LogisticModel;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::InferenceError;
use crate::features::{Feature, FeatureVector};
use crate::types::Direction;

/// Extra model input that is not part of the candle-derived schema.
pub const SENTIMENT_COLUMN: &str = "sentiment";

/// Probability above which the predicted direction is UP.
const UP_THRESHOLD: f64 = 0.5;

/// A trained binary classifier over an ordered feature row.
pub trait Classifier: Send + Sync {
    /// Column names, in the order `predict_proba` expects them.
    fn feature_names(&self) -> &[String];

    /// Probability that price moves up, in [0, 1].
    fn predict_proba(&self, row: &[f64]) -> Result<f64, InferenceError>;
}

/// Model output as reported per row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub direction: Direction,
    /// P(up) in [0, 1]; 0.0 when the direction is unknown.
    pub confidence: f64,
}

impl PredictionResult {
    pub fn unknown() -> Self {
        Self {
            direction: Direction::Unknown,
            confidence: 0.0,
        }
    }

    fn from_probability(p: f64) -> Self {
        let direction = if p > UP_THRESHOLD {
            Direction::Up
        } else {
            Direction::Down
        };
        Self {
            direction,
            confidence: p,
        }
    }
}

// =============================================================================
// Schema alignment
// =============================================================================

/// A feature row laid out in the model's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    pub values: Vec<f64>,
    /// Columns that were absent and backfilled with 0.0.
    pub backfilled: Vec<String>,
    /// How many of those columns are not part of the feature schema at all.
    pub unknown_columns: usize,
}

impl ModelInput {
    /// Align `features` (+ `sentiment`) with `columns`.
    ///
    /// Never fails: absent values and unknown names become 0.0 and are
    /// listed in `backfilled`.
    pub fn align(columns: &[String], features: &FeatureVector, sentiment: f64) -> Self {
        let mut values = Vec::with_capacity(columns.len());
        let mut backfilled = Vec::new();
        let mut unknown_columns = 0;

        for name in columns {
            let value = if name == SENTIMENT_COLUMN {
                Some(sentiment)
            } else {
                match Feature::from_name(name) {
                    Some(feature) => features.get(feature),
                    None => {
                        unknown_columns += 1;
                        None
                    }
                }
            };
            match value {
                Some(v) => values.push(v),
                None => {
                    values.push(0.0);
                    backfilled.push(name.clone());
                }
            }
        }

        Self {
            values,
            backfilled,
            unknown_columns,
        }
    }

    /// Completeness of `features` once unknown model columns are counted as
    /// missing schema fields.
    pub fn completeness(&self, features: &FeatureVector) -> f64 {
        let expected = Feature::COUNT + self.unknown_columns;
        features.present_count() as f64 / expected as f64
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Wraps one classifier snapshot and never lets a model failure escape.
#[derive(Clone)]
pub struct InferenceAdapter {
    model: Arc<dyn Classifier>,
}

impl InferenceAdapter {
    pub fn new(model: Arc<dyn Classifier>) -> Self {
        Self { model }
    }

    pub fn feature_names(&self) -> &[String] {
        self.model.feature_names()
    }

    pub fn predict(&self, symbol: &str, input: &ModelInput) -> PredictionResult {
        let expected = self.model.feature_names().len();
        if input.values.len() != expected {
            let err = InferenceError::ShapeMismatch {
                got: input.values.len(),
                expected,
            };
            warn!(symbol, error = %err, "inference failed, direction UNKNOWN");
            return PredictionResult::unknown();
        }

        match self.model.predict_proba(&input.values) {
            Ok(p) if p.is_finite() && (0.0..=1.0).contains(&p) => {
                PredictionResult::from_probability(p)
            }
            Ok(p) => {
                warn!(
                    symbol,
                    error = %InferenceError::InvalidOutput(p),
                    "inference failed, direction UNKNOWN"
                );
                PredictionResult::unknown()
            }
            Err(e) => {
                warn!(symbol, error = %e, "inference failed, direction UNKNOWN");
                PredictionResult::unknown()
            }
        }
    }
}

impl std::fmt::Debug for InferenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceAdapter")
            .field("features", &self.model.feature_names().len())
            .finish()
    }
}

// =============================================================================
// Model store
// =============================================================================

/// Holds the current classifier.  Readers clone the `Arc`; a reload swaps it
/// under a write lock held only for the assignment, so a reader sees either
/// the old or the new model, never a mix.
#[derive(Default)]
pub struct ModelStore {
    current: RwLock<Option<Arc<dyn Classifier>>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<dyn Classifier>> {
        self.current.read().clone()
    }

    pub fn install(&self, model: Arc<dyn Classifier>) {
        let columns = model.feature_names().len();
        *self.current.write() = Some(model);
        info!(columns, "classifier installed");
    }

    /// Load a [`LogisticModel`] from `path` and install it.  On error the
    /// previously installed model (if any) stays in place.
    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let model = LogisticModel::load(path)?;
        self.install(Arc::new(model));
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }
}

impl std::fmt::Debug for ModelStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStore").field("loaded", &self.is_loaded()).finish()
    }
}
