use async_trait::async_trait;
use common::errors::FeedError;
use common::models::{Interval, OutputSize, PriceRow};

pub trait RemoteResponse<T> {
    fn to_insertable(&self, symbol: &str) -> Result<T, FeedError>;
}

/// Market-data source queried once per symbol and cycle.
///
/// Implementations report unknown tickers as `FeedError::ProviderSymbol` and
/// rate limits or network trouble as `FeedError::ProviderTransient`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn get_intraday(
        &self,
        symbol: &str,
        interval: Interval,
        output_size: OutputSize,
    ) -> Result<Vec<PriceRow>, FeedError>;

    async fn get_daily(
        &self,
        symbol: &str,
        output_size: OutputSize,
    ) -> Result<Vec<PriceRow>, FeedError>;
}
