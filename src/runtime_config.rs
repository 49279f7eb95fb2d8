// =============================================================================
// Runtime Configuration — audit settings with atomic save
// =============================================================================
//
// Every tunable parameter of the audit pipeline lives here.  All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an older
// config file.  Persistence uses an atomic tmp + rename pattern to prevent
// corruption on crash.
//
// A handful of deployment-specific values can be overridden from the
// environment (or `.env`):
//   AUDIT_SYMBOLS        comma-separated explicit universe
//   AUDIT_MODEL_PATH     classifier JSON file
//   AUDIT_SENTIMENT_URL  sentiment endpoint
// =============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::RetryPolicy;
use crate::features::enricher::interval_minutes;
use crate::signals::ScoreWeights;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_quote_asset() -> String {
    "USDT".to_string()
}

fn default_universe_size() -> usize {
    100
}

fn default_candle_interval() -> String {
    "5m".to_string()
}

fn default_candle_limit() -> u32 {
    1000
}

fn default_inter_symbol_delay_ms() -> u64 {
    250
}

fn default_fetch_max_attempts() -> u32 {
    3
}

fn default_fetch_retry_delay_ms() -> u64 {
    500
}

fn default_fetch_backoff_factor() -> f64 {
    2.0
}

fn default_universe_cache_ttl_secs() -> u64 {
    600
}

fn default_universe_cache_max_hits() -> u32 {
    3
}

fn default_sentiment_ttl_secs() -> u64 {
    3600
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/model.json")
}

fn default_top_n() -> usize {
    5
}

fn default_audit_interval_secs() -> u64 {
    3600
}

// =============================================================================
// AuditConfig
// =============================================================================

/// Top-level configuration of the audit service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    // --- Universe ------------------------------------------------------------

    /// Quote asset the universe is drawn from.
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    /// Number of most liquid pairs audited when `symbols` is empty.
    #[serde(default = "default_universe_size")]
    pub universe_size: usize,

    /// Explicit universe.  Empty means "top `universe_size` by volume".
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Universe cache lifetime.
    #[serde(default = "default_universe_cache_ttl_secs")]
    pub universe_cache_ttl_secs: u64,

    /// Universe cache lookups served before a forced refetch.
    #[serde(default = "default_universe_cache_max_hits")]
    pub universe_cache_max_hits: u32,

    // --- Market data -----------------------------------------------------------

    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,

    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,

    /// Pause between two symbols, to stay far from exchange rate limits.
    #[serde(default = "default_inter_symbol_delay_ms")]
    pub inter_symbol_delay_ms: u64,

    #[serde(default = "default_fetch_max_attempts")]
    pub fetch_max_attempts: u32,

    #[serde(default = "default_fetch_retry_delay_ms")]
    pub fetch_retry_delay_ms: u64,

    #[serde(default = "default_fetch_backoff_factor")]
    pub fetch_backoff_factor: f64,

    // --- Sentiment & model -----------------------------------------------------

    #[serde(default = "default_sentiment_ttl_secs")]
    pub sentiment_ttl_secs: u64,

    /// Sentiment endpoint.  `None` disables sentiment (every asset neutral).
    #[serde(default)]
    pub sentiment_url: Option<String>,

    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    // --- Scoring & reporting ---------------------------------------------------

    #[serde(default)]
    pub weights: ScoreWeights,

    /// Size of the Top-N / Bottom-N sections.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    #[serde(default = "default_audit_interval_secs")]
    pub audit_interval_secs: u64,

    /// Where to write each finished report as JSON.  `None` disables export.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            quote_asset: default_quote_asset(),
            universe_size: default_universe_size(),
            symbols: Vec::new(),
            universe_cache_ttl_secs: default_universe_cache_ttl_secs(),
            universe_cache_max_hits: default_universe_cache_max_hits(),
            candle_interval: default_candle_interval(),
            candle_limit: default_candle_limit(),
            inter_symbol_delay_ms: default_inter_symbol_delay_ms(),
            fetch_max_attempts: default_fetch_max_attempts(),
            fetch_retry_delay_ms: default_fetch_retry_delay_ms(),
            fetch_backoff_factor: default_fetch_backoff_factor(),
            sentiment_ttl_secs: default_sentiment_ttl_secs(),
            sentiment_url: None,
            model_path: default_model_path(),
            weights: ScoreWeights::default(),
            top_n: default_top_n(),
            audit_interval_secs: default_audit_interval_secs(),
            report_path: None,
        }
    }
}

impl AuditConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read audit config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse audit config from {}", path.display()))?;

        config.validate()?;

        info!(
            path = %path.display(),
            quote_asset = %config.quote_asset,
            explicit_symbols = config.symbols.len(),
            interval = %config.candle_interval,
            "audit config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise audit config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "audit config saved (atomic)");
        Ok(())
    }

    /// Apply `AUDIT_*` overrides read through `lookup` (normally
    /// `std::env::var`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("AUDIT_SYMBOLS") {
            self.symbols = raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(path) = lookup("AUDIT_MODEL_PATH").filter(|s| !s.is_empty()) {
            self.model_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("AUDIT_SENTIMENT_URL") {
            self.sentiment_url = Some(url).filter(|s| !s.is_empty());
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Reject settings the pipeline can not run with.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if interval_minutes(&self.candle_interval).is_none() {
            bail!("unsupported candle interval '{}'", self.candle_interval);
        }
        if self.fetch_max_attempts == 0 {
            bail!("fetch_max_attempts must be at least 1");
        }
        if !self.fetch_backoff_factor.is_finite() || self.fetch_backoff_factor < 1.0 {
            bail!("fetch_backoff_factor must be >= 1.0, got {}", self.fetch_backoff_factor);
        }
        if self.top_n == 0 {
            bail!("top_n must be at least 1");
        }
        if self.audit_interval_secs == 0 {
            bail!("audit_interval_secs must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_max_attempts,
            initial_delay: Duration::from_millis(self.fetch_retry_delay_ms),
            backoff_factor: self.fetch_backoff_factor,
        }
    }

    pub fn inter_symbol_delay(&self) -> Duration {
        Duration::from_millis(self.inter_symbol_delay_ms)
    }

    pub fn universe_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.universe_cache_ttl_secs)
    }

    pub fn sentiment_ttl(&self) -> Duration {
        Duration::from_secs(self.sentiment_ttl_secs)
    }

    pub fn audit_interval(&self) -> Duration {
        Duration::from_secs(self.audit_interval_secs)
    }
}
