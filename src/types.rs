// =============================================================================
// Shared types used across the audit pipeline
// =============================================================================

use serde::{Deserialize, Serialize};

/// Directional call produced by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Unknown,
}

impl Default for Direction {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Down => write!(f, "DOWN"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Coarse data-quality label derived from a row's completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Prudent,
    Moderate,
    Risky,
}

impl RiskProfile {
    pub fn from_completeness(completeness: f64) -> Self {
        if completeness >= 0.95 {
            Self::Prudent
        } else if completeness >= 0.75 {
            Self::Moderate
        } else {
            Self::Risky
        }
    }
}

impl std::fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Prudent => write!(f, "prudent"),
            Self::Moderate => write!(f, "moderate"),
            Self::Risky => write!(f, "risky"),
        }
    }
}

/// Strip the quote asset from a pair symbol: `BTCUSDT` + `USDT` => `BTC`.
///
/// Symbols that do not end with the quote asset are returned unchanged
/// (upper-cased), so lookups stay case-insensitive.
pub fn base_asset(symbol: &str, quote_asset: &str) -> String {
    let upper = symbol.to_uppercase();
    let quote = quote_asset.to_uppercase();
    match upper.strip_suffix(&quote) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => upper,
    }
}
