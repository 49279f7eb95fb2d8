// =============================================================================
// Logistic Model — standardise, dot product, sigmoid
// =============================================================================
//
// On-disk format (JSON):
//   {
//     "schema_version": "v1",
//     "feature_names": ["rsi", "macd", ...],
//     "means":         [..],   // per-column standard-scaler mean
//     "scales":        [..],   // per-column standard-scaler scale
//     "coefficients":  [..],
//     "intercept":     -0.12
//   }
//
//   z = intercept + sum_i coef_i * (x_i - mean_i) / scale_i
//   p = 1 / (1 + e^-z)
// =============================================================================

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Classifier;
use crate::error::InferenceError;
use crate::features::FEATURE_SCHEMA_VERSION;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub schema_version: String,
    pub feature_names: Vec<String>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    /// Read and validate a model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model from {}", path.display()))?;
        let model = Self::from_json(&content)
            .with_context(|| format!("invalid model file {}", path.display()))?;

        info!(
            path = %path.display(),
            schema_version = %model.schema_version,
            features = model.feature_names.len(),
            "logistic model loaded"
        );
        Ok(model)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(content).context("failed to parse model JSON")?;
        model.validate()?;
        Ok(model)
    }

    /// Structural checks: matching schema version, one mean / scale /
    /// coefficient per column, finite parameters.
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != FEATURE_SCHEMA_VERSION {
            bail!(
                "model schema {} does not match feature schema {}",
                self.schema_version,
                FEATURE_SCHEMA_VERSION
            );
        }
        let n = self.feature_names.len();
        if n == 0 {
            bail!("model declares no features");
        }
        for (label, len) in [
            ("means", self.means.len()),
            ("scales", self.scales.len()),
            ("coefficients", self.coefficients.len()),
        ] {
            if len != n {
                bail!("model has {n} features but {len} {label}");
            }
        }
        let all_finite = self
            .means
            .iter()
            .chain(&self.scales)
            .chain(&self.coefficients)
            .chain(std::iter::once(&self.intercept))
            .all(|v| v.is_finite());
        if !all_finite {
            bail!("model parameters contain non-finite values");
        }
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, row: &[f64]) -> Result<f64, InferenceError> {
        if row.len() != self.coefficients.len() {
            return Err(InferenceError::ShapeMismatch {
                got: row.len(),
                expected: self.coefficients.len(),
            });
        }

        let z = row
            .iter()
            .zip(&self.means)
            .zip(&self.scales)
            .zip(&self.coefficients)
            .fold(self.intercept, |acc, (((x, mean), scale), coef)| {
                // A zero scale means the column was constant in training.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                acc + coef * (x - mean) / scale
            });

        let p = 1.0 / (1.0 + (-z).exp());
        if !p.is_finite() {
            return Err(InferenceError::InvalidOutput(p));
        }
        Ok(p)
    }
}
