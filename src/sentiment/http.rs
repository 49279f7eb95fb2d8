// =============================================================================
// HTTP Sentiment Provider — pulls a `{ "BTC": 0.62, ... }` map from a URL
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use super::SentimentProvider;
use crate::error::FetchError;

/// Fetches the whole sentiment map from one endpoint.  The requested asset
/// list is not sent: the endpoint always returns every asset it tracks.
#[derive(Clone)]
pub struct HttpSentimentProvider {
    url: String,
    client: reqwest::Client,
}

impl HttpSentimentProvider {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client for sentiment provider")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl SentimentProvider for HttpSentimentProvider {
    #[instrument(
        skip(self, base_assets),
        name = "sentiment::fetch_scores",
        fields(requested = base_assets.len())
    )]
    async fn fetch_scores(
        &self,
        base_assets: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e, "GET sentiment"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status, "GET sentiment"));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| {
                FetchError::Permanent(format!("failed to parse sentiment response: {e}"))
            })?;

        let scores = parse_scores(&body)?;
        debug!(received = scores.len(), "sentiment scores fetched");
        Ok(scores)
    }
}

impl std::fmt::Debug for HttpSentimentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSentimentProvider").field("url", &self.url).finish()
    }
}

/// Parse the response object.  Values may be numbers or numeric strings;
/// anything else is skipped with a warning.
fn parse_scores(body: &serde_json::Value) -> Result<HashMap<String, f64>, FetchError> {
    let obj = body
        .as_object()
        .ok_or_else(|| FetchError::Permanent("sentiment response is not a JSON object".into()))?;

    let mut scores = HashMap::with_capacity(obj.len());
    for (asset, val) in obj {
        let parsed = val
            .as_f64()
            .or_else(|| val.as_str().and_then(|s| s.parse::<f64>().ok()))
            .filter(|v| v.is_finite());
        match parsed {
            Some(v) => {
                scores.insert(asset.to_uppercase(), v.clamp(0.0, 1.0));
            }
            None => warn!(asset = %asset, value = %val, "ignoring non-numeric sentiment value"),
        }
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_numeric_strings() {
        let scores =
            parse_scores(&json!({ "btc": 0.62, "ETH": "0.4", "SOL": -1.0, "XRP": null })).unwrap();
        assert_eq!(scores.len(), 3);
        assert_eq!(scores["BTC"], 0.62);
        assert_eq!(scores["ETH"], 0.4);
        assert_eq!(scores["SOL"], 0.0);
    }

    #[test]
    fn non_object_is_permanent() {
        let err = parse_scores(&json!([0.5, 0.6])).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn debug_shows_url() {
        let p = HttpSentimentProvider::new("http://localhost:9000/sentiment").unwrap();
        assert!(format!("{p:?}").contains("localhost:9000"));
    }
}
