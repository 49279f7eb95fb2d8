// =============================================================================
// Batch Orchestrator — sequential, fault-isolated audit of a whole universe
// =============================================================================
//
// One logical worker per run.  Symbols are processed strictly one after the
// other with a fixed pause in between, which bounds the outbound request
// rate.  A failing symbol becomes an `AuditError` and the loop moves on; the
// only run-level failure is a classifier that can not be loaded.
//
// Cancellation is cooperative: the flag is checked before each symbol, never
// in the middle of one, so no row is ever half built.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use super::auditor::{CandleRequest, SymbolAuditor};
use crate::app_state::AppState;
use crate::error::{FetchError, RunError};
use crate::features::{EnricherConfig, FeatureEnricher};
use crate::inference::InferenceAdapter;
use crate::market_data::MarketDataSource;
use crate::report::{AuditReport, ReportBuilder};
use crate::sentiment::SentimentProvider;
use crate::signals::WeightedScorer;
use crate::types::base_asset;

pub struct BatchOrchestrator<S, P> {
    source: Arc<S>,
    sentiment_provider: Arc<P>,
    state: Arc<AppState>,
    cancel: Arc<AtomicBool>,
}

impl<S: MarketDataSource, P: SentimentProvider> BatchOrchestrator<S, P> {
    pub fn new(source: Arc<S>, sentiment_provider: Arc<P>, state: Arc<AppState>) -> Self {
        Self {
            source,
            sentiment_provider,
            state,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting the returned flag stops the current run (and any later one)
    /// before its next symbol.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// The explicit symbol list from config, or the cached / fetched ranked
    /// universe.
    pub async fn resolve_universe(&self) -> Result<Arc<Vec<String>>, FetchError> {
        let config = self.state.config_snapshot();
        if !config.symbols.is_empty() {
            return Ok(Arc::new(config.symbols));
        }
        self.state
            .universe
            .get_or_fetch(self.source.as_ref(), &config.quote_asset, config.universe_size)
            .await
    }

    /// Audit every symbol of `universe` and build the report.
    ///
    /// Only [`RunError::ModelUnavailable`] escapes; an empty universe or a
    /// run where nothing succeeded produces an empty report with a message.
    pub async fn run_audit(&self, universe: &[String]) -> Result<AuditReport, RunError> {
        let config = self.state.config_snapshot();

        // ── Preconditions ───────────────────────────────────────────────
        let model = match self.state.models.current() {
            Some(model) => model,
            None => {
                self.state
                    .models
                    .load_from_path(&config.model_path)
                    .map_err(|e| RunError::ModelUnavailable(format!("{e:#}")))?;
                self.state
                    .models
                    .current()
                    .ok_or_else(|| {
                        RunError::ModelUnavailable("model store empty after load".into())
                    })?
            }
        };

        let builder = ReportBuilder::start(universe.len(), config.top_n);
        let run_id = builder.run_id().to_string();

        if universe.is_empty() {
            warn!(run_id = %run_id, "empty universe, nothing to audit");
            return Ok(builder.finish(
                Vec::new(),
                Vec::new(),
                Some("Universe is empty: no symbols to audit.".to_string()),
                false,
            ));
        }

        info!(run_id = %run_id, symbols = universe.len(), "audit run started");

        // ── Per-run collaborators ───────────────────────────────────────
        let enricher_config =
            EnricherConfig::for_interval(&config.candle_interval).unwrap_or_else(|| {
                warn!(
                    interval = %config.candle_interval,
                    "unsupported candle interval, using 5m horizons"
                );
                EnricherConfig::default()
            });
        let enricher = FeatureEnricher::new(enricher_config);
        let inference = InferenceAdapter::new(model);
        let scorer = WeightedScorer::new(config.weights);
        let candles = CandleRequest {
            quote_asset: config.quote_asset.clone(),
            interval: config.candle_interval.clone(),
            limit: config.candle_limit,
        };

        let base_assets: Vec<String> = universe
            .iter()
            .map(|s| base_asset(s, &config.quote_asset))
            .collect();
        self.state
            .sentiment
            .refresh_if_stale(self.sentiment_provider.as_ref(), &base_assets)
            .await;

        let auditor = SymbolAuditor {
            source: self.source.as_ref(),
            sentiment: &self.state.sentiment,
            inference: &inference,
            enricher: &enricher,
            scorer: &scorer,
            retry: config.retry_policy(),
            candles: &candles,
        };

        // ── Sequential sweep ────────────────────────────────────────────
        let delay = config.inter_symbol_delay();
        let mut rows = Vec::with_capacity(universe.len());
        let mut errors = Vec::new();
        let mut cancelled = false;

        for (i, symbol) in universe.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(
                    run_id = %run_id,
                    processed = i,
                    remaining = universe.len() - i,
                    "audit run cancelled"
                );
                cancelled = true;
                break;
            }

            match auditor.audit(symbol).await {
                Ok(row) => rows.push(row),
                Err(err) => errors.push(err),
            }

            if i + 1 < universe.len() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let processed = rows.len() + errors.len();
        let message = if cancelled {
            Some(format!("Run cancelled after {processed} of {} symbols.", universe.len()))
        } else if rows.is_empty() {
            Some(format!("No symbol could be audited ({} errors).", errors.len()))
        } else {
            None
        };

        let report = builder.finish(rows, errors, message, cancelled);
        info!(
            run_id = %report.run_id,
            scored = report.ranked.len(),
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "audit run finished"
        );
        Ok(report)
    }

    /// One scheduled cycle: resolve the universe, run, publish, export.
    ///
    /// A universe that can not be fetched yields a published empty report
    /// explaining why.
    pub async fn run_scheduled(&self) -> Result<Arc<AuditReport>, RunError> {
        let config = self.state.config_snapshot();

        let report = match self.resolve_universe().await {
            Ok(universe) => self.run_audit(&universe).await,
            Err(e) => {
                error!(error = %e, "could not resolve symbol universe");
                Ok(ReportBuilder::start(0, config.top_n).finish(
                    Vec::new(),
                    Vec::new(),
                    Some(format!("Universe unavailable: {e}")),
                    false,
                ))
            }
        };

        let report = match report {
            Ok(report) => Arc::new(report),
            Err(e) => {
                error!(error = %e, "audit run aborted");
                self.state.push_error(e.to_string());
                return Err(e);
            }
        };

        let version = self.state.publish_report(Arc::clone(&report));
        info!(run_id = %report.run_id, version, "audit report published");

        if let Some(path) = &config.report_path {
            if let Err(e) = report.export_json(path) {
                warn!(error = %e, path = %path.display(), "report export failed");
                self.state.push_error(format!("report export failed: {e:#}"));
            }
        }

        Ok(report)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::LatestReport;
    use crate::audit::testing::{state_with_model, MockSource, StaticSentiment};
    use crate::report::{AuditErrorKind, AuditErrorStatus};
    use crate::runtime_config::AuditConfig;
    use crate::sentiment::NeutralSentiment;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn one_failing_symbol_does_not_truncate_the_run() {
        let source = MockSource::healthy(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]).failing("ETHUSDT");
        let state = state_with_model(AuditConfig::default());
        let orch = BatchOrchestrator::new(Arc::new(source), Arc::new(NeutralSentiment), state);

        let report = orch.run_audit(&symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"])).await.unwrap();

        let mut scored: Vec<&str> = report.ranked.iter().map(|r| r.symbol.as_str()).collect();
        scored.sort_unstable();
        assert_eq!(scored, vec!["BTCUSDT", "SOLUSDT"]);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].symbol, "ETHUSDT");
        assert_eq!(report.errors[0].status, AuditErrorStatus::Failed);
        assert_eq!(report.errors[0].kind, AuditErrorKind::DataFetch);
        assert!(report.errors[0].reason.contains("after 2 attempt(s)"));
        assert!(report.message.is_none());
    }

    #[tokio::test]
    async fn failing_symbol_is_retried_up_to_the_bound() {
        let source = Arc::new(MockSource::healthy(&["ETHUSDT"]).failing("ETHUSDT"));
        let state = state_with_model(AuditConfig::default());
        let orch = BatchOrchestrator::new(Arc::clone(&source), Arc::new(NeutralSentiment), state);

        orch.run_audit(&symbols(&["ETHUSDT"])).await.unwrap();
        assert_eq!(source.candle_calls("ETHUSDT"), 2);
    }

    #[tokio::test]
    async fn empty_universe_yields_explicit_empty_report() {
        let state = state_with_model(AuditConfig::default());
        let orch = BatchOrchestrator::new(
            Arc::new(MockSource::healthy(&[])),
            Arc::new(NeutralSentiment),
            state,
        );

        let report = orch.run_audit(&[]).await.unwrap();
        assert!(report.is_empty());
        assert!(report.errors.is_empty());
        assert!(report.message.as_deref().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn missing_model_aborts_the_run() {
        let mut config = AuditConfig::default();
        config.model_path = "/nonexistent/model.json".into();
        let state = Arc::new(AppState::new(config));
        let orch = BatchOrchestrator::new(
            Arc::new(MockSource::healthy(&["BTCUSDT"])),
            Arc::new(NeutralSentiment),
            state,
        );

        let err = orch.run_audit(&symbols(&["BTCUSDT"])).await.unwrap_err();
        assert!(matches!(err, RunError::ModelUnavailable(_)));
    }

    #[tokio::test]
    async fn absent_sentiment_defaults_to_neutral() {
        let state = state_with_model(AuditConfig::default());
        let provider = StaticSentiment::new(&[("BTC", 0.8)]);
        let orch = BatchOrchestrator::new(
            Arc::new(MockSource::healthy(&["BTCUSDT", "ETHUSDT"])),
            Arc::new(provider),
            state,
        );

        let report = orch.run_audit(&symbols(&["BTCUSDT", "ETHUSDT"])).await.unwrap();
        let by_symbol = |s: &str| report.ranked.iter().find(|r| r.symbol == s).unwrap().clone();
        assert_eq!(by_symbol("BTCUSDT").sentiment, 0.8);
        assert!(by_symbol("BTCUSDT").sentiment_as_of.is_some());
        assert_eq!(by_symbol("ETHUSDT").sentiment, 0.5);
        assert!(by_symbol("ETHUSDT").sentiment_as_of.is_none());
    }

    #[tokio::test]
    async fn unlisted_and_short_symbols_are_skipped() {
        let source = MockSource::healthy(&["BTCUSDT", "NEWUSDT"]).with_history("NEWUSDT", 20);
        let state = state_with_model(AuditConfig::default());
        let orch = BatchOrchestrator::new(Arc::new(source), Arc::new(NeutralSentiment), state);

        let report = orch.run_audit(&symbols(&["BTCUSDT", "NEWUSDT", "GHOSTUSDT"])).await.unwrap();
        assert_eq!(report.ranked.len(), 1);
        let kinds: Vec<_> = report
            .errors
            .iter()
            .map(|e| (e.symbol.as_str(), e.kind, e.status))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("NEWUSDT", AuditErrorKind::InsufficientData, AuditErrorStatus::Skipped),
                ("GHOSTUSDT", AuditErrorKind::UnlistedSymbol, AuditErrorStatus::Skipped),
            ]
        );
    }

    #[tokio::test]
    async fn nothing_succeeds_gives_empty_report_not_error() {
        let source = MockSource::healthy(&["BTCUSDT"]).failing("BTCUSDT");
        let state = state_with_model(AuditConfig::default());
        let orch = BatchOrchestrator::new(Arc::new(source), Arc::new(NeutralSentiment), state);

        let report = orch.run_audit(&symbols(&["BTCUSDT"])).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.message.as_deref().unwrap().contains("No symbol"));
    }

    #[tokio::test]
    async fn cancellation_is_checked_between_symbols() {
        let state = state_with_model(AuditConfig::default());
        let orch = BatchOrchestrator::new(
            Arc::new(MockSource::healthy(&["BTCUSDT", "ETHUSDT"])),
            Arc::new(NeutralSentiment),
            state,
        );
        orch.cancel_handle().store(true, Ordering::SeqCst);

        let report = orch.run_audit(&symbols(&["BTCUSDT", "ETHUSDT"])).await.unwrap();
        assert!(report.cancelled);
        assert!(report.ranked.is_empty() && report.errors.is_empty());
        assert!(report.message.as_deref().unwrap().contains("cancelled after 0 of 2"));
    }

    #[tokio::test]
    async fn scheduled_run_publishes_and_uses_ranked_universe() {
        let state = state_with_model(AuditConfig::default());
        let source = Arc::new(MockSource::healthy(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]));
        let orch = BatchOrchestrator::new(
            Arc::clone(&source),
            Arc::new(NeutralSentiment),
            Arc::clone(&state),
        );

        assert!(matches!(state.latest_report(), LatestReport::NotYet));
        let report = orch.run_scheduled().await.unwrap();
        assert_eq!(report.universe_size, 3);
        assert_eq!(report.ranked.len(), 3);
        assert_eq!(report.ranked[0].rank, 1);

        let latest = state.latest_report().report().cloned().unwrap();
        assert_eq!(latest.run_id, report.run_id);

        // Second cycle hits the universe cache.
        orch.run_scheduled().await.unwrap();
        assert_eq!(source.universe_calls(), 1);
    }

    #[tokio::test]
    async fn explicit_symbols_bypass_the_ranked_universe() {
        let mut config = AuditConfig::default();
        config.symbols = symbols(&["SOLUSDT"]);
        let state = state_with_model(config);
        let source = Arc::new(MockSource::healthy(&["BTCUSDT", "SOLUSDT"]));
        let orch = BatchOrchestrator::new(Arc::clone(&source), Arc::new(NeutralSentiment), state);

        let report = orch.run_scheduled().await.unwrap();
        assert_eq!(report.ranked.len(), 1);
        assert_eq!(report.ranked[0].symbol, "SOLUSDT");
        assert_eq!(source.universe_calls(), 0);
    }

    #[tokio::test]
    async fn identical_inputs_give_identical_scores() {
        let run = || async {
            let state = state_with_model(AuditConfig::default());
            let orch = BatchOrchestrator::new(
                Arc::new(MockSource::healthy(&["BTCUSDT", "ETHUSDT"])),
                Arc::new(NeutralSentiment),
                state,
            );
            let report = orch.run_audit(&symbols(&["BTCUSDT", "ETHUSDT"])).await.unwrap();
            report.ranked.iter().map(|r| (r.symbol.clone(), r.score)).collect::<Vec<_>>()
        };
        assert_eq!(run().await, run().await);
    }
}
