// =============================================================================
// Binance REST API Client — public market-data endpoints
// =============================================================================
//
// Only unauthenticated endpoints are used: the audit reads prices, it never
// trades.  Every response feeds the request-weight tracker, and every failure
// is classified as transient (retry) or permanent (give up) for the auditor.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use super::rate_limit::RateLimitTracker;
use crate::error::FetchError;
use crate::market_data::{Candle, CandleSeries, MarketDataSource};

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance "Invalid symbol." error code.
const INVALID_SYMBOL_CODE: i64 = -1121;

// Request weights per endpoint (Binance spot API docs).
const WEIGHT_TICKER_24H_ALL: u32 = 80;
const WEIGHT_EXCHANGE_INFO: u32 = 20;
const WEIGHT_KLINES: u32 = 2;

/// Binance REST client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limit: Arc<RateLimitTracker>,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the client at another host (testnet, local mock).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limit: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.rate_limit
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    /// GET `path` and return the status with the parsed JSON body.
    ///
    /// Non-success statuses are returned, not converted, so callers can
    /// inspect Binance error codes first.
    async fn get_json(
        &self,
        path: &str,
        weight: u32,
    ) -> Result<(StatusCode, serde_json::Value), FetchError> {
        if !self.rate_limit.can_send_request(weight) {
            return Err(FetchError::Transient(format!(
                "GET {path} deferred: local request-weight cap reached"
            )));
        }

        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&e, format!("GET {path}")))?;

        self.rate_limit.update_from_headers(resp.headers());
        let status = resp.status();

        let body: serde_json::Value = match resp.json().await {
            Ok(body) => body,
            // Error pages are often HTML; the status decides the class.
            Err(_) if !status.is_success() => {
                return Err(FetchError::from_status(status, format!("GET {path}")))
            }
            Err(e) => {
                return Err(FetchError::Permanent(format!(
                    "failed to parse GET {path} response: {e}"
                )))
            }
        };

        Ok((status, body))
    }

    /// Like [`get_json`](Self::get_json) but any non-success is an error.
    async fn get_ok_json(&self, path: &str, weight: u32) -> Result<serde_json::Value, FetchError> {
        let (status, body) = self.get_json(path, weight).await?;
        if !status.is_success() {
            let err = FetchError::from_status(status, format!("GET {path}"));
            warn!(%status, %body, "Binance request failed");
            return Err(err);
        }
        Ok(body)
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// GET /api/v3/ticker/24hr, filtered by quote asset and ranked by quote
    /// volume.
    #[instrument(skip(self), name = "binance::list_ranked_symbols")]
    pub async fn get_ranked_symbols(
        &self,
        quote_asset: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError> {
        let body = self.get_ok_json("/api/v3/ticker/24hr", WEIGHT_TICKER_24H_ALL).await?;
        let symbols = parse_ranked_symbols(&body, quote_asset, limit)?;
        debug!(quote_asset, count = symbols.len(), "ranked symbols fetched");
        Ok(symbols)
    }

    /// GET /api/v3/exchangeInfo?symbol=..; listed means status TRADING.
    #[instrument(skip(self), name = "binance::is_listed")]
    pub async fn get_listing_status(&self, symbol: &str) -> Result<bool, FetchError> {
        let path = format!("/api/v3/exchangeInfo?symbol={symbol}");
        let (status, body) = self.get_json(&path, WEIGHT_EXCHANGE_INFO).await?;

        if status == StatusCode::BAD_REQUEST && body["code"].as_i64() == Some(INVALID_SYMBOL_CODE) {
            debug!(symbol, "symbol unknown to exchange");
            return Ok(false);
        }
        if !status.is_success() {
            return Err(FetchError::from_status(status, format!("GET {path}")));
        }

        Ok(parse_listing(&body))
    }

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Array indices:
    ///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
    ///   [6] closeTime, [7] quoteAssetVolume, [8] numberOfTrades,
    ///   [9] takerBuyBaseVolume, [10] takerBuyQuoteVolume
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<CandleSeries, FetchError> {
        let path = format!("/api/v3/klines?symbol={symbol}&interval={interval}&limit={limit}");
        let body = self.get_ok_json(&path, WEIGHT_KLINES).await?;
        let candles = parse_klines(&body)?;
        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(CandleSeries::new(candles))
    }
}

impl MarketDataSource for BinanceClient {
    async fn list_ranked_symbols(
        &self,
        quote_asset: &str,
        limit: usize,
    ) -> Result<Vec<String>, FetchError> {
        self.get_ranked_symbols(quote_asset, limit).await
    }

    async fn is_listed(&self, symbol: &str) -> Result<bool, FetchError> {
        self.get_listing_status(symbol).await
    }

    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<CandleSeries, FetchError> {
        self.get_klines(symbol, interval, limit).await
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Response parsing
// -----------------------------------------------------------------------------

fn parse_ranked_symbols(
    body: &serde_json::Value,
    quote_asset: &str,
    limit: usize,
) -> Result<Vec<String>, FetchError> {
    let tickers = body
        .as_array()
        .ok_or_else(|| FetchError::Permanent("ticker/24hr response is not an array".into()))?;

    let quote = quote_asset.to_uppercase();
    let mut ranked: Vec<(String, f64)> = tickers
        .iter()
        .filter_map(|t| {
            let symbol = t["symbol"].as_str()?;
            match symbol.strip_suffix(quote.as_str()) {
                Some(base) if !base.is_empty() => {}
                _ => return None,
            }
            let volume = parse_str_f64(&t["quoteVolume"]).ok()?;
            Some((symbol.to_string(), volume))
        })
        .collect();

    // Stable: equal volumes keep exchange order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(limit);
    Ok(ranked.into_iter().map(|(s, _)| s).collect())
}

fn parse_listing(body: &serde_json::Value) -> bool {
    body["symbols"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|info| info["status"].as_str())
        == Some("TRADING")
}

fn parse_klines(body: &serde_json::Value) -> Result<Vec<Candle>, FetchError> {
    let raw = body
        .as_array()
        .ok_or_else(|| FetchError::Permanent("klines response is not an array".into()))?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(arr) = entry.as_array().filter(|a| a.len() >= 7) else {
            warn!(%entry, "skipping malformed kline entry");
            continue;
        };

        let (Some(open_time), Some(close_time)) = (arr[0].as_i64(), arr[6].as_i64()) else {
            warn!(%entry, "skipping kline entry without timestamps");
            continue;
        };
        let candle = Candle::new(
            open_time,
            parse_str_f64(&arr[1])?,
            parse_str_f64(&arr[2])?,
            parse_str_f64(&arr[3])?,
            parse_str_f64(&arr[4])?,
            parse_str_f64(&arr[5])?,
            close_time,
        );
        if !candle.is_finite() {
            warn!(open_time, "skipping non-finite kline");
            continue;
        }
        candles.push(candle);
    }
    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_str_f64(val: &serde_json::Value) -> Result<f64, FetchError> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .map_err(|_| FetchError::Permanent(format!("failed to parse '{s}' as f64")))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        Err(FetchError::Permanent(format!("expected string or number, got: {val}")))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ranks_by_quote_volume_and_filters_quote() {
        let body = json!([
            { "symbol": "ETHUSDT", "quoteVolume": "500.0" },
            { "symbol": "BTCUSDT", "quoteVolume": "900.5" },
            { "symbol": "ETHBTC",  "quoteVolume": "99999" },
            { "symbol": "USDT",    "quoteVolume": "99999" },
            { "symbol": "SOLUSDT", "quoteVolume": "garbage" },
            { "symbol": "XRPUSDT", "quoteVolume": 700.0 }
        ]);
        let symbols = parse_ranked_symbols(&body, "usdt", 10).unwrap();
        assert_eq!(symbols, vec!["BTCUSDT", "XRPUSDT", "ETHUSDT"]);

        let top2 = parse_ranked_symbols(&body, "USDT", 2).unwrap();
        assert_eq!(top2, vec!["BTCUSDT", "XRPUSDT"]);
    }

    #[test]
    fn ranked_symbols_rejects_non_array() {
        let err = parse_ranked_symbols(&json!({ "code": -1 }), "USDT", 5).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn listing_requires_trading_status() {
        assert!(parse_listing(&json!({
            "symbols": [{ "symbol": "BTCUSDT", "status": "TRADING" }]
        })));
        assert!(!parse_listing(&json!({
            "symbols": [{ "symbol": "LUNAUSDT", "status": "BREAK" }]
        })));
        assert!(!parse_listing(&json!({ "symbols": [] })));
    }

    #[test]
    fn parses_klines_and_skips_bad_rows() {
        let body = json!([
            [1000, "1.0", "2.0", "0.5", "1.5", "100.0", 1299, "0", 10, "0", "0", "0"],
            [1300, "1.5", "2.5", "1.0", "2.0", "150.0"],
            ["x", "1.5", "2.5", "1.0", "2.0", "150.0", 1599],
            [1600, "2.0", "3.0", "1.5", "NaN", "120.0", 1899]
        ]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0], Candle::new(1000, 1.0, 2.0, 0.5, 1.5, 100.0, 1299));
    }

    #[test]
    fn unparseable_price_is_permanent() {
        let body = json!([[1000, "abc", "2.0", "0.5", "1.5", "100.0", 1299]]);
        assert!(!parse_klines(&body).unwrap_err().is_transient());
    }

    #[test]
    fn debug_output_has_no_secrets_to_leak() {
        let client = BinanceClient::with_base_url("http://127.0.0.1:1").unwrap();
        let dbg = format!("{client:?}");
        assert!(dbg.contains("127.0.0.1"));
        assert!(dbg.contains("used_weight_1m"));
    }

    #[tokio::test]
    async fn unreachable_host_is_transient() {
        // Port 1 on loopback refuses connections immediately.
        let client = BinanceClient::with_base_url("http://127.0.0.1:1").unwrap();
        let err = client.get_klines("BTCUSDT", "5m", 10).await.unwrap_err();
        assert!(err.is_transient(), "{err}");
    }
}
