use std::sync::Arc;

use common::errors::FeedError;
use common::models::{FetchMode, FetchParams, FetchRequest, FetchResult, PriceRow};
use storage::PriceStore;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use crate::traits::PriceProvider;

/// Sits between the provider and the store: turns a request into one merged
/// `FetchResult` and hands batches to the store.
pub struct FeedAdapter {
    provider: Arc<dyn PriceProvider>,
    store: Option<Arc<dyn PriceStore>>,
}

impl FeedAdapter {
    pub fn new(provider: Arc<dyn PriceProvider>) -> Self {
        Self {
            provider,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn PriceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Validates `mode` before any network traffic, then fetches every symbol.
    pub async fn fetch(
        &self,
        mode: &str,
        symbols: &[String],
        params: &FetchParams,
    ) -> Result<FetchResult, FeedError> {
        let mode: FetchMode = mode.parse()?;
        self.fetch_request(&FetchRequest::new(mode, symbols, params.clone()))
            .await
    }

    /// One provider call per symbol. Unresolvable or undecodable symbols are
    /// skipped; a transient failure that outlives the retry budget aborts the
    /// whole fetch.
    pub async fn fetch_request(&self, request: &FetchRequest) -> Result<FetchResult, FeedError> {
        let deadline = Instant::now() + request.params.retry.budget;
        let mut result = FetchResult::new();

        for (i, symbol) in request.symbols.iter().enumerate() {
            if i > 0 && !request.params.request_delay.is_zero() {
                time::sleep(request.params.request_delay).await;
            }

            match self.fetch_symbol(request, symbol, deadline).await {
                Ok(rows) => {
                    let added = result.merge(rows);
                    debug!(symbol = %symbol, rows = added, "Fetched {}", request.mode);
                }
                Err(e) if e.is_symbol_scoped() => {
                    warn!(symbol = %symbol, error = %e, "Skipping symbol");
                    result.mark_failed(symbol);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }

    async fn fetch_symbol(
        &self,
        request: &FetchRequest,
        symbol: &str,
        deadline: Instant,
    ) -> Result<Vec<PriceRow>, FeedError> {
        let params = &request.params;
        let mut attempt = 0;

        loop {
            let outcome = match request.mode {
                FetchMode::Realtime => {
                    self.provider
                        .get_intraday(symbol, params.interval, params.output_size)
                        .await
                }
                FetchMode::Historical => self.provider.get_daily(symbol, params.output_size).await,
            };

            match outcome {
                Ok(mut rows) => {
                    for row in rows.iter_mut() {
                        row.symbol = symbol.to_string();
                    }
                    return Ok(rows);
                }
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    let delay = params.retry.delay_for(attempt);
                    if Instant::now() + delay > deadline {
                        warn!(symbol, attempt, "Retry budget exhausted: {}", e);
                        return Err(e);
                    }
                    warn!(
                        symbol,
                        attempt,
                        "Provider unavailable ({}), backing off for {:?}",
                        e,
                        delay
                    );
                    time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Writes `rows` to `table`. An empty batch never reaches the store.
    pub async fn upsert(&self, table: &str, rows: &[PriceRow]) -> Result<u64, FeedError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let store = self
            .store
            .as_ref()
            .ok_or_else(|| FeedError::config("no price store attached to the adapter"))?;

        store.upsert(table, rows).await
    }
}
