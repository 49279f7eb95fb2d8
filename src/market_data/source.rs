// =============================================================================
// Market Data Source — collaborator contract consumed by the auditor
// =============================================================================

use std::future::Future;

use crate::error::FetchError;
use crate::market_data::CandleSeries;

/// Read-only access to an exchange's public market data.
///
/// Implementations must report `FetchError::Transient` for failures worth
/// retrying and `FetchError::Permanent` for everything else.
pub trait MarketDataSource: Send + Sync {
    /// Symbols quoted in `quote_asset`, most liquid first, at most `limit`.
    fn list_ranked_symbols(
        &self,
        quote_asset: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;

    /// Whether `symbol` is currently listed and trading.
    fn is_listed(&self, symbol: &str) -> impl Future<Output = Result<bool, FetchError>> + Send;

    /// The most recent `limit` candles at `interval` resolution.
    fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> impl Future<Output = Result<CandleSeries, FetchError>> + Send;
}
