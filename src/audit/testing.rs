//! In-memory collaborators shared by the audit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::app_state::AppState;
use crate::error::FetchError;
use crate::features::FEATURE_SCHEMA_VERSION;
use crate::inference::LogisticModel;
use crate::market_data::{Candle, CandleSeries, MarketDataSource};
use crate::runtime_config::AuditConfig;
use crate::sentiment::SentimentProvider;

/// Enough 5m candles for every horizon including 24h.
const FULL_HISTORY: usize = 400;

/// Oscillating series; `phase` makes symbols score differently.
pub fn wavy_candles(n: usize, phase: f64) -> CandleSeries {
    let candles = (0..n)
        .map(|i| {
            let t = i as f64;
            let close = 100.0 + t * 0.05 * phase.cos() + ((t + phase) * 0.7).sin() * 2.0;
            let open = close - ((t + phase) * 0.3).cos();
            let high = close.max(open) + 0.5;
            let low = close.min(open) - 0.5;
            let volume = 1000.0 + (t * 0.2).sin() * 100.0;
            let open_time = i as i64 * 300_000;
            Candle::new(open_time, open, high, low, close, volume, open_time + 299_999)
        })
        .collect();
    CandleSeries::new(candles)
}

pub struct MockSource {
    symbols: Vec<String>,
    history: HashMap<String, usize>,
    failing: HashSet<String>,
    candle_calls: Mutex<HashMap<String, u32>>,
    universe_calls: AtomicU32,
}

impl MockSource {
    /// Every symbol listed, with full history.
    pub fn healthy(symbols: &[&str]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            history: symbols.iter().map(|s| (s.to_string(), FULL_HISTORY)).collect(),
            failing: HashSet::new(),
            candle_calls: Mutex::new(HashMap::new()),
            universe_calls: AtomicU32::new(0),
        }
    }

    /// Candle fetches for `symbol` always fail transiently.
    pub fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }

    pub fn with_history(mut self, symbol: &str, candles: usize) -> Self {
        self.history.insert(symbol.to_string(), candles);
        self
    }

    pub fn candle_calls(&self, symbol: &str) -> u32 {
        self.candle_calls.lock().get(symbol).copied().unwrap_or(0)
    }

    pub fn universe_calls(&self) -> u32 {
        self.universe_calls.load(Ordering::SeqCst)
    }
}

impl MarketDataSource for MockSource {
    async fn list_ranked_symbols(
        &self,
        _quote_asset: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError> {
        self.universe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.symbols.iter().take(limit).cloned().collect())
    }

    async fn is_listed(&self, symbol: &str) -> Result<bool, FetchError> {
        Ok(self.history.contains_key(symbol))
    }

    async fn get_candles(
        &self,
        symbol: &str,
        _interval: &str,
        _limit: u32,
    ) -> Result<CandleSeries, FetchError> {
        *self.candle_calls.lock().entry(symbol.to_string()).or_insert(0) += 1;
        if self.failing.contains(symbol) {
            return Err(FetchError::Transient(format!("{symbol}: HTTP 503")));
        }
        let n = self.history.get(symbol).copied().unwrap_or(0);
        let phase = symbol.bytes().map(f64::from).sum::<f64>() / 100.0;
        Ok(wavy_candles(n, phase))
    }
}

/// Provider returning a fixed map.
pub struct StaticSentiment {
    scores: HashMap<String, f64>,
}

impl StaticSentiment {
    pub fn new(scores: &[(&str, f64)]) -> Self {
        Self {
            scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

impl SentimentProvider for StaticSentiment {
    async fn fetch_scores(
        &self,
        _base_assets: &[String],
    ) -> Result<HashMap<String, f64>, FetchError> {
        Ok(self.scores.clone())
    }
}

pub fn test_model() -> LogisticModel {
    LogisticModel {
        schema_version: FEATURE_SCHEMA_VERSION.to_string(),
        feature_names: ["rsi", "macd", "variation_10m", "sentiment"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        means: vec![50.0, 0.0, 0.0, 0.5],
        scales: vec![10.0, 1.0, 1.0, 0.25],
        coefficients: vec![0.4, 0.8, 0.3, 0.5],
        intercept: 0.0,
    }
}

/// State with a model installed and no delays, two fetch attempts.
pub fn state_with_model(mut config: AuditConfig) -> Arc<AppState> {
    config.inter_symbol_delay_ms = 0;
    config.fetch_retry_delay_ms = 0;
    config.fetch_max_attempts = 2;
    let state = AppState::new(config);
    state.models.install(Arc::new(test_model()));
    Arc::new(state)
}
