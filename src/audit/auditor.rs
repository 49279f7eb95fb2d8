// =============================================================================
// Symbol Auditor — one symbol from validation to scored row
// =============================================================================
//
//   validate -> fetch candles -> enrich -> sentiment -> schema check
//            -> infer -> score -> AuditRow
//
// Terminal states:
//   SUCCESS  an `AuditRow`
//   SKIPPED  unlisted symbol, or too little history
//   FAILED   data source still failing after the bounded retries
//
// Missing sentiment, backfilled model columns and a broken model degrade the
// row (and are logged) but never fail it.  Nothing is shared between symbols.
// =============================================================================

use tracing::{debug, info, warn};

use super::retry::{RetryExhausted, RetryPolicy};
use crate::error::SymbolAuditError;
use crate::features::{Feature, FeatureEnricher};
use crate::inference::{InferenceAdapter, ModelInput};
use crate::market_data::MarketDataSource;
use crate::report::{AuditError, AuditRow};
use crate::sentiment::SentimentCache;
use crate::signals::{ScoreInputs, WeightedScorer};
use crate::types::{base_asset, RiskProfile};

/// Candle request parameters.
#[derive(Debug, Clone)]
pub struct CandleRequest {
    pub quote_asset: String,
    pub interval: String,
    pub limit: u32,
}

/// Borrowed collaborators for one batch run.
pub struct SymbolAuditor<'a, S> {
    pub source: &'a S,
    pub sentiment: &'a SentimentCache,
    pub inference: &'a InferenceAdapter,
    pub enricher: &'a FeatureEnricher,
    pub scorer: &'a WeightedScorer,
    pub retry: RetryPolicy,
    pub candles: &'a CandleRequest,
}

impl<S: MarketDataSource> SymbolAuditor<'_, S> {
    /// Audit `symbol`; failures come back as data, never as a panic or `?`.
    pub async fn audit(&self, symbol: &str) -> Result<AuditRow, AuditError> {
        match self.try_audit(symbol).await {
            Ok(row) => {
                info!(
                    symbol,
                    score = row.score,
                    completeness = row.completeness,
                    direction = %row.direction,
                    "symbol audited"
                );
                Ok(row)
            }
            Err(err) => {
                warn!(symbol, error = %err, "symbol not scored");
                Err(AuditError::from_failure(symbol, &err))
            }
        }
    }

    async fn try_audit(&self, symbol: &str) -> Result<AuditRow, SymbolAuditError> {
        // 1. Validate
        let listed = self
            .retry
            .run("is_listed", || self.source.is_listed(symbol))
            .await
            .map_err(fetch_failure)?;
        if !listed {
            return Err(SymbolAuditError::UnlistedSymbol {
                symbol: symbol.to_string(),
            });
        }

        // 2. Fetch candles
        let req = self.candles;
        let series = self
            .retry
            .run("get_candles", || self.source.get_candles(symbol, &req.interval, req.limit))
            .await
            .map_err(fetch_failure)?;
        debug!(symbol, candles = series.len(), "candles fetched");

        // 3. Enrich
        let features = self.enricher.enrich(&series)?.into_latest();

        // 4. Sentiment
        let base = base_asset(symbol, &req.quote_asset);
        let sentiment = self.sentiment.get_sentiment(&base);
        if sentiment.is_default() {
            warn!(
                symbol,
                base_asset = %base,
                value = sentiment.value,
                "no sentiment for asset, using neutral default"
            );
        }

        // 5. Schema check
        let input = ModelInput::align(self.inference.feature_names(), &features, sentiment.value);
        if !input.backfilled.is_empty() {
            warn!(
                symbol,
                columns = ?input.backfilled,
                "model columns missing, backfilled with 0.0"
            );
        }
        let completeness = input.completeness(&features);

        // 6. Infer
        let prediction = self.inference.predict(symbol, &input);

        // 7. Score
        let inputs = ScoreInputs {
            variation_10m: features.get(Feature::Variation10m),
            variation_1h: features.get(Feature::Variation1h),
            variation_24h: features.get(Feature::Variation24h),
            sentiment: sentiment.value,
            confidence: prediction.confidence,
            completeness,
        };
        let scored = self.scorer.score(&inputs);
        debug!(
            symbol,
            var10 = ?inputs.variation_10m,
            var1h = ?inputs.variation_1h,
            var24h = ?inputs.variation_24h,
            sentiment = inputs.sentiment,
            confidence = inputs.confidence,
            completeness,
            "score inputs"
        );

        // 8. Emit
        Ok(AuditRow {
            symbol: symbol.to_string(),
            rank: 0,
            score: scored.score,
            variation_score: scored.variation_score,
            sentiment: sentiment.value,
            sentiment_as_of: sentiment.as_of,
            variation_10m: inputs.variation_10m,
            variation_1h: inputs.variation_1h,
            variation_24h: inputs.variation_24h,
            completeness,
            risk_profile: RiskProfile::from_completeness(completeness),
            rsi: features.get(Feature::Rsi),
            macd: features.get(Feature::Macd),
            direction: prediction.direction,
            confidence: prediction.confidence,
            backfilled_features: input.backfilled,
        })
    }
}

fn fetch_failure(e: RetryExhausted) -> SymbolAuditError {
    SymbolAuditError::DataFetch {
        attempts: e.attempts,
        source: e.error,
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::audit::testing::{test_model, MockSource};
    use crate::error::InferenceError;
    use crate::inference::{Classifier, LogisticModel};
    use crate::report::{AuditErrorKind, AuditErrorStatus};
    use crate::types::Direction;

    struct BrokenModel {
        names: Vec<String>,
    }

    impl Classifier for BrokenModel {
        fn feature_names(&self) -> &[String] {
            &self.names
        }
        fn predict_proba(&self, _row: &[f64]) -> Result<f64, InferenceError> {
            Err(InferenceError::Other("weights corrupted".into()))
        }
    }

    fn request() -> CandleRequest {
        CandleRequest {
            quote_asset: "USDT".into(),
            interval: "5m".into(),
            limit: 1000,
        }
    }

    fn no_wait() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    async fn audit_one(
        source: &MockSource,
        model: Arc<dyn Classifier>,
        symbol: &str,
    ) -> Result<AuditRow, AuditError> {
        let sentiment = SentimentCache::new(Duration::from_secs(60));
        let inference = InferenceAdapter::new(model);
        let enricher = FeatureEnricher::default();
        let scorer = WeightedScorer::default();
        let candles = request();
        let auditor = SymbolAuditor {
            source,
            sentiment: &sentiment,
            inference: &inference,
            enricher: &enricher,
            scorer: &scorer,
            retry: no_wait(),
            candles: &candles,
        };
        auditor.audit(symbol).await
    }

    #[tokio::test]
    async fn healthy_symbol_produces_full_row() {
        let source = MockSource::healthy(&["BTCUSDT"]);
        let row = audit_one(&source, Arc::new(test_model()), "BTCUSDT").await.unwrap();

        assert_eq!(row.symbol, "BTCUSDT");
        assert_eq!(row.completeness, 1.0);
        assert_eq!(row.risk_profile, RiskProfile::Prudent);
        assert!(row.variation_24h.is_some());
        assert!(row.rsi.is_some());
        assert_ne!(row.direction, Direction::Unknown);
        assert!(row.backfilled_features.is_empty());
        assert_eq!(row.sentiment, 0.5);
        assert!(row.score > 0.0);
        assert_eq!(row.rank, 0);
    }

    #[tokio::test]
    async fn broken_model_degrades_to_unknown() {
        let source = MockSource::healthy(&["BTCUSDT"]);
        let model = BrokenModel {
            names: vec!["rsi".into()],
        };
        let row = audit_one(&source, Arc::new(model), "BTCUSDT").await.unwrap();
        assert_eq!(row.direction, Direction::Unknown);
        assert_eq!(row.confidence, 0.0);
    }

    #[tokio::test]
    async fn unknown_model_columns_are_backfilled_and_penalised() {
        let source = MockSource::healthy(&["BTCUSDT"]);
        let mut model: LogisticModel = test_model();
        model.feature_names[1] = "funding_rate".into();

        let row = audit_one(&source, Arc::new(model), "BTCUSDT").await.unwrap();
        assert_eq!(row.backfilled_features, vec!["funding_rate".to_string()]);
        assert!(row.completeness < 1.0);
        assert_eq!(row.risk_profile, RiskProfile::Prudent);
        assert_ne!(row.direction, Direction::Unknown);
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_symbol() {
        let source = MockSource::healthy(&["ETHUSDT"]).failing("ETHUSDT");
        let err = audit_one(&source, Arc::new(test_model()), "ETHUSDT").await.unwrap_err();
        assert_eq!(err.status, AuditErrorStatus::Failed);
        assert_eq!(err.kind, AuditErrorKind::DataFetch);
        assert_eq!(source.candle_calls("ETHUSDT"), 3);
    }

    #[tokio::test]
    async fn unlisted_symbol_is_skipped_without_fetching() {
        let source = MockSource::healthy(&["BTCUSDT"]);
        let err = audit_one(&source, Arc::new(test_model()), "GHOSTUSDT").await.unwrap_err();
        assert_eq!(err.status, AuditErrorStatus::Skipped);
        assert_eq!(err.kind, AuditErrorKind::UnlistedSymbol);
        assert_eq!(source.candle_calls("GHOSTUSDT"), 0);
    }

    #[tokio::test]
    async fn short_history_is_skipped() {
        let source = MockSource::healthy(&["NEWUSDT"]).with_history("NEWUSDT", 10);
        let err = audit_one(&source, Arc::new(test_model()), "NEWUSDT").await.unwrap_err();
        assert_eq!(err.kind, AuditErrorKind::InsufficientData);
        assert!(err.reason.contains("10 candles"));
    }
}
