use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::errors::FeedError;
use crate::models::PriceRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum FetchMode {
    /// Minute-level intraday bars.
    Realtime,
    /// Daily bars.
    Historical,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Historical => "historical",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchMode {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rt" | "realtime" => Ok(Self::Realtime),
            "hist" | "historical" => Ok(Self::Historical),
            other => Err(FeedError::config(format!("unknown fetch mode '{}'", other))),
        }
    }
}

impl TryFrom<String> for FetchMode {
    type Error = FeedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Intraday bar width accepted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    #[default]
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    SixtyMinutes,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
            Self::ThirtyMinutes => "30min",
            Self::SixtyMinutes => "60min",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSize {
    /// Latest 100 points.
    Compact,
    /// Full available range.
    #[default]
    Full,
}

impl OutputSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Full => "full",
        }
    }
}

/// Exponential backoff for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Total time a single fetch may spend waiting before it gives up.
    pub budget: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            budget: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams {
    pub interval: Interval,
    pub output_size: OutputSize,
    /// Pause between two symbol requests.
    pub request_delay: Duration,
    pub retry: RetryPolicy,
}

impl FetchParams {
    /// Caps the retry budget so a fetch never runs past the next cycle.
    pub fn bounded_by(mut self, period: Duration) -> Self {
        self.retry.budget = self.retry.budget.min(period);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub mode: FetchMode,
    pub symbols: Vec<String>,
    pub params: FetchParams,
}

impl FetchRequest {
    pub fn new(mode: FetchMode, symbols: &[String], params: FetchParams) -> Self {
        Self {
            mode,
            symbols: symbols.to_vec(),
            params,
        }
    }
}

/// Rows gathered during one cycle. Holds at most one row per `(symbol, date_id)`.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    rows: Vec<PriceRow>,
    index: HashMap<(String, NaiveDateTime), usize>,
    failed_symbols: Vec<String>,
}

impl FetchResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends rows; a row whose key is already present replaces the old one in place.
    pub fn merge(&mut self, rows: impl IntoIterator<Item = PriceRow>) -> usize {
        let mut added = 0;
        for row in rows {
            let key = (row.symbol.clone(), row.date_id);
            match self.index.get(&key) {
                Some(&pos) => self.rows[pos] = row,
                None => {
                    self.index.insert(key, self.rows.len());
                    self.rows.push(row);
                    added += 1;
                }
            }
        }
        added
    }

    pub fn mark_failed(&mut self, symbol: &str) {
        if !self.failed_symbols.iter().any(|s| s == symbol) {
            self.failed_symbols.push(symbol.to_string());
        }
    }

    pub fn rows(&self) -> &[PriceRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<PriceRow> {
        self.rows
    }

    pub fn failed_symbols(&self) -> &[String] {
        &self.failed_symbols
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
