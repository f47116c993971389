use std::time::Duration;

use async_trait::async_trait;
use common::errors::FeedError;
use common::models::{Interval, OutputSize, PriceRow};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::remote::TimeSeriesResponse;
use crate::traits::{PriceProvider, RemoteResponse};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder()
            .user_agent("stock_price_feed/0.1.0")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FeedError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn fetch_series(
        &self,
        symbol: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<PriceRow>, FeedError> {
        let url = format!("{}/query", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("symbol", symbol), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| FeedError::ProviderTransient(format!("request for {} failed: {}", symbol, e)))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            warn!("Provider answered {} for {}", status, symbol);
            return Err(FeedError::ProviderTransient(format!("HTTP {}", status)));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FeedError::config(format!("provider rejected credentials: HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(FeedError::ProviderTransient(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::ProviderTransient(format!("reading body for {}: {}", symbol, e)))?;

        let series = serde_json::from_str::<TimeSeriesResponse>(&body)
            .map_err(|e| FeedError::decode(symbol, e.to_string()))?;

        let rows = series.to_insertable(symbol)?;
        debug!("Received {} bars for {}", rows.len(), symbol);
        Ok(rows)
    }
}

#[async_trait]
impl PriceProvider for AlphaVantageClient {
    async fn get_intraday(
        &self,
        symbol: &str,
        interval: Interval,
        output_size: OutputSize,
    ) -> Result<Vec<PriceRow>, FeedError> {
        self.fetch_series(
            symbol,
            &[
                ("function", "TIME_SERIES_INTRADAY"),
                ("interval", interval.as_str()),
                ("outputsize", output_size.as_str()),
                ("datatype", "json"),
            ],
        )
        .await
    }

    async fn get_daily(
        &self,
        symbol: &str,
        output_size: OutputSize,
    ) -> Result<Vec<PriceRow>, FeedError> {
        self.fetch_series(
            symbol,
            &[
                ("function", "TIME_SERIES_DAILY"),
                ("outputsize", output_size.as_str()),
                ("datatype", "json"),
            ],
        )
        .await
    }
}
