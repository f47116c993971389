use std::fmt::Write;

use common::errors::FeedError;
use common::models::{FetchMode, FetchParams, FetchRequest, FetchResult};
use market_data::FeedAdapter;

pub const PREVIEW_ROWS: usize = 5;

/// Fetches both series for `symbols` without touching any store.
pub async fn fetch_preview(
    adapter: &FeedAdapter,
    symbols: &[String],
    params: &FetchParams,
) -> Result<Vec<(FetchMode, FetchResult)>, FeedError> {
    let mut previews = Vec::with_capacity(2);
    for mode in [FetchMode::Realtime, FetchMode::Historical] {
        let request = FetchRequest::new(mode, symbols, params.clone());
        previews.push((mode, adapter.fetch_request(&request).await?));
    }
    Ok(previews)
}

/// First `limit` rows of `result` as a plain text table.
pub fn render(mode: FetchMode, result: &FetchResult, limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- {} ---", mode.as_str().to_ascii_uppercase());
    let _ = writeln!(
        out,
        "{:<19}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:<6}",
        "dateid", "open", "high", "low", "close", "volume", "sym"
    );

    for row in result.rows().iter().take(limit) {
        let _ = writeln!(
            out,
            "{:<19}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:<6}",
            row.date_id.format("%Y-%m-%d %H:%M:%S").to_string(),
            row.open.to_string(),
            row.high.to_string(),
            row.low.to_string(),
            row.close.to_string(),
            row.volume,
            row.symbol
        );
    }

    if !result.failed_symbols().is_empty() {
        let _ = writeln!(out, "skipped: {}", result.failed_symbols().join(", "));
    }
    out
}
