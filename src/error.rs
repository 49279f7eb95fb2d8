// =============================================================================
// Error taxonomy
// =============================================================================
//
// Per-symbol failures are captured as data (see `report::AuditError`) and never
// interrupt sibling symbols.  Only `RunError` escapes `run_audit`.
// =============================================================================

use thiserror::Error;

/// Outcome of a failed call to an external data source.
///
/// Sources must tell the two kinds apart so the auditor can decide between
/// retrying and giving up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network hiccup, timeout, rate limit or server-side error.  Retryable.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// The request itself is wrong (bad symbol, malformed response...).
    #[error("permanent fetch failure: {0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Classify a non-success HTTP status: rate limits (429, 418 IP ban) and
    /// server errors are retryable, every other status is not.
    pub fn from_status(status: reqwest::StatusCode, context: impl std::fmt::Display) -> Self {
        let msg = format!("{context} returned {status}");
        if status.is_server_error()
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status.as_u16() == 418
        {
            Self::Transient(msg)
        } else {
            Self::Permanent(msg)
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_reqwest(err: &reqwest::Error, context: impl std::fmt::Display) -> Self {
        let msg = format!("{context}: {err}");
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Self::Transient(msg)
        } else if let Some(status) = err.status() {
            Self::from_status(status, context)
        } else if err.is_decode() {
            Self::Permanent(msg)
        } else {
            Self::Transient(msg)
        }
    }
}

/// The feature enricher could not produce a row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichmentError {
    #[error("insufficient data: {got} candles, need at least {need}")]
    InsufficientData { got: usize, need: usize },
}

/// The classifier could not produce a usable probability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("feature row has {got} values, model expects {expected}")]
    ShapeMismatch { got: usize, expected: usize },

    #[error("model produced a non-finite or out-of-range probability: {0}")]
    InvalidOutput(f64),

    #[error("inference failed: {0}")]
    Other(String),
}

/// Terminal failure of a single symbol's pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SymbolAuditError {
    #[error("{symbol} is not listed or not trading")]
    UnlistedSymbol { symbol: String },

    #[error("data fetch failed after {attempts} attempt(s): {source}")]
    DataFetch { attempts: u32, source: FetchError },

    #[error(transparent)]
    InsufficientData(#[from] EnrichmentError),
}

/// Failures that abort a whole batch run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The classifier could not be loaded; nothing can be scored.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}
