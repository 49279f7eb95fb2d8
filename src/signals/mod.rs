// =============================================================================
// Signals Module
// =============================================================================
//
// Score aggregation for the audit pipeline:
// - Weighted composite of multi-horizon momentum, sentiment and model
//   confidence, damped by feature completeness

pub mod weighted_score;

pub use weighted_score::{ScoreInputs, ScoreWeights, ScoringResult, WeightedScorer};
