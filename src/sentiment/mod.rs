// =============================================================================
// Sentiment — per-asset crowd sentiment in [0, 1], refreshed on a slow cadence
// =============================================================================
//
// The provider is an external collaborator; this module only owns the
// contract and a freshness-tagged cache in front of it.  A missing key is
// never an error: it resolves to the neutral default and the caller logs it
// as a degraded signal.
// =============================================================================

pub mod http;

pub use http::HttpSentimentProvider;

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::FetchError;

/// Score used when the provider has nothing for an asset.
pub const NEUTRAL_SENTIMENT: f64 = 0.5;

/// Source of raw sentiment scores, keyed by upper-case base asset.
pub trait SentimentProvider: Send + Sync {
    /// Scores for (at least) `base_assets`.  Assets the provider knows
    /// nothing about are simply left out of the map.
    fn fetch_scores(
        &self,
        base_assets: &[String],
    ) -> impl Future<Output = Result<HashMap<String, f64>, FetchError>> + Send;
}

/// Provider that knows nothing: every lookup falls back to neutral.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralSentiment;

impl SentimentProvider for NeutralSentiment {
    async fn fetch_scores(
        &self,
        _base_assets: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        Ok(HashMap::new())
    }
}

/// Provider picked at start-up from `sentiment_url`.
#[derive(Clone)]
pub enum ConfiguredSentiment {
    Http(HttpSentimentProvider),
    Neutral(NeutralSentiment),
}

impl ConfiguredSentiment {
    /// HTTP provider when a URL is configured, neutral otherwise.
    pub fn from_url(url: Option<&str>) -> anyhow::Result<Self> {
        match url {
            Some(url) => {
                info!(url, "sentiment provider: http");
                Ok(Self::Http(HttpSentimentProvider::new(url)?))
            }
            None => {
                warn!("no sentiment_url configured, every asset scores neutral");
                Ok(Self::Neutral(NeutralSentiment))
            }
        }
    }
}

impl SentimentProvider for ConfiguredSentiment {
    async fn fetch_scores(
        &self,
        base_assets: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        match self {
            Self::Http(provider) => provider.fetch_scores(base_assets).await,
            Self::Neutral(provider) => provider.fetch_scores(base_assets).await,
        }
    }
}

/// One cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SentimentScore {
    /// Score in [0, 1].
    pub value: f64,
    /// When the provider produced the map this value came from.  `None`
    /// for the neutral default.
    pub as_of: Option<DateTime<Utc>>,
}

impl SentimentScore {
    pub fn neutral() -> Self {
        Self {
            value: NEUTRAL_SENTIMENT,
            as_of: None,
        }
    }

    /// The value is the neutral fallback rather than a provider reading.
    pub fn is_default(&self) -> bool {
        self.as_of.is_none()
    }
}

#[derive(Debug)]
struct Snapshot {
    scores: HashMap<String, f64>,
    fetched_at: DateTime<Utc>,
    fetched_instant: Instant,
}

/// TTL cache over the whole provider map.
///
/// Readers take a short read lock; a refresh fetches without holding any
/// lock and then swaps the map in one write.
#[derive(Debug)]
pub struct SentimentCache {
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl SentimentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// No map yet, or the current one is older than the TTL.
    pub fn is_stale(&self) -> bool {
        match &*self.snapshot.read() {
            Some(s) => s.fetched_instant.elapsed() >= self.ttl,
            None => true,
        }
    }

    /// Time of the last successful refresh.
    pub fn as_of(&self) -> Option<DateTime<Utc>> {
        self.snapshot.read().as_ref().map(|s| s.fetched_at)
    }

    /// Refresh from `provider` when stale.  A failed refresh keeps the old
    /// map (stale beats nothing) and is only logged.
    pub async fn refresh_if_stale<P: SentimentProvider>(
        &self,
        provider: &P,
        base_assets: &[String],
    ) {
        if !self.is_stale() {
            debug!(as_of = ?self.as_of(), "sentiment cache fresh, skipping refresh");
            return;
        }
        self.refresh(provider, base_assets).await;
    }

    /// Unconditional refresh.
    pub async fn refresh<P: SentimentProvider>(&self, provider: &P, base_assets: &[String]) {
        match provider.fetch_scores(base_assets).await {
            Ok(raw) => {
                let scores: HashMap<String, f64> = raw
                    .into_iter()
                    .filter(|(_, v)| v.is_finite())
                    .map(|(k, v)| (k.to_uppercase(), v.clamp(0.0, 1.0)))
                    .collect();
                info!(assets = scores.len(), "sentiment cache refreshed");
                *self.snapshot.write() = Some(Snapshot {
                    scores,
                    fetched_at: Utc::now(),
                    fetched_instant: Instant::now(),
                });
            }
            Err(e) => {
                warn!(
                    error = %e,
                    stale_as_of = ?self.as_of(),
                    "sentiment refresh failed, keeping previous map"
                );
            }
        }
    }

    /// Score for `base_asset`, or the neutral default.
    pub fn get_sentiment(&self, base_asset: &str) -> SentimentScore {
        let guard = self.snapshot.read();
        let Some(snapshot) = guard.as_ref() else {
            return SentimentScore::neutral();
        };
        match snapshot.scores.get(&base_asset.to_uppercase()) {
            Some(&value) => SentimentScore {
                value,
                as_of: Some(snapshot.fetched_at),
            },
            None => SentimentScore::neutral(),
        }
    }

    /// Drop the cached map so the next refresh is forced.
    pub fn expire(&self) {
        *self.snapshot.write() = None;
    }
}
