// =============================================================================
// Weighted Composite Scorer — momentum + sentiment + model, damped by quality
// =============================================================================
//
//   variation_score = 0.2 * v10 + 0.4 * v1h + 0.4 * v24h
//   score = round2( ( w_var  * variation_score
//                   + w_sent * sentiment  * 100
//                   + w_pred * confidence * 100 ) * completeness )
//
// Absent variations count as 0.0.  Completeness multiplies the whole blend,
// so a partially populated row always ranks at or below an identical fully
// populated one, and completeness 0 forces the score to 0.
// =============================================================================

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Per-horizon weights inside `variation_score`.
const HORIZON_WEIGHTS: [f64; 3] = [0.2, 0.4, 0.4];

/// Tolerance when checking that the blend weights sum to 1.
const WEIGHT_SUM_EPSILON: f64 = 1e-9;

fn default_variation_weight() -> f64 {
    0.4
}

fn default_sentiment_weight() -> f64 {
    0.3
}

fn default_prediction_weight() -> f64 {
    0.3
}

/// Blend weights of the three signal families.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_variation_weight")]
    pub variation: f64,
    #[serde(default = "default_sentiment_weight")]
    pub sentiment: f64,
    #[serde(default = "default_prediction_weight")]
    pub prediction: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            variation: default_variation_weight(),
            sentiment: default_sentiment_weight(),
            prediction: default_prediction_weight(),
        }
    }
}

impl ScoreWeights {
    /// Weights must be finite, non-negative and sum to 1.0.
    pub fn validate(&self) -> Result<()> {
        let parts = [self.variation, self.sentiment, self.prediction];
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            bail!("score weights must be finite and non-negative: {self:?}");
        }
        let sum: f64 = parts.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            bail!("score weights must sum to 1.0, got {sum}");
        }
        Ok(())
    }
}

/// Everything the score depends on for one row.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScoreInputs {
    pub variation_10m: Option<f64>,
    pub variation_1h: Option<f64>,
    pub variation_24h: Option<f64>,
    /// Sentiment in [0, 1].
    pub sentiment: f64,
    /// Model confidence in [0, 1].
    pub confidence: f64,
    /// Feature completeness in [0, 1].
    pub completeness: f64,
}

/// Score plus the intermediate momentum term, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringResult {
    pub variation_score: f64,
    pub score: f64,
}

/// Stateless scorer over a fixed set of weights.
#[derive(Debug, Clone, Default)]
pub struct WeightedScorer {
    weights: ScoreWeights,
}

impl WeightedScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    pub fn score(&self, inputs: &ScoreInputs) -> ScoringResult {
        let variation_score = variation_score(inputs);
        let sentiment = unit(inputs.sentiment);
        let confidence = unit(inputs.confidence);
        let completeness = unit(inputs.completeness);

        let blend = self.weights.variation * variation_score
            + self.weights.sentiment * sentiment * 100.0
            + self.weights.prediction * confidence * 100.0;

        ScoringResult {
            variation_score,
            score: round2(blend * completeness),
        }
    }
}

/// Horizon-weighted momentum; absent or non-finite horizons count as 0.
pub fn variation_score(inputs: &ScoreInputs) -> f64 {
    [inputs.variation_10m, inputs.variation_1h, inputs.variation_24h]
        .iter()
        .zip(HORIZON_WEIGHTS)
        .map(|(v, w)| w * v.filter(|x| x.is_finite()).unwrap_or(0.0))
        .sum()
}

/// Clamp into [0, 1]; non-finite => 0.
fn unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Round half away from zero to two decimals.  `-0.0` is normalised to `0.0`.
pub fn round2(x: f64) -> f64 {
    let r = (x * 100.0).round() / 100.0;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}
