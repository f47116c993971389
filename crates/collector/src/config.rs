//! Environment configuration and the daemon manifest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use common::errors::FeedError;
use common::models::{FetchMode, FetchParams};
use market_data::remote::DEFAULT_BASE_URL;
use market_data::services::DaemonSettings;
use serde::Deserialize;
use storage::TableName;
use tracing::warn;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/stock_prices.db";
pub const DEFAULT_MINUTE_TABLE: &str = "stock_price_minute";
pub const DEFAULT_DAY_TABLE: &str = "stock_price_day";

const DEFAULT_PAIRS: [[&str; 2]; 5] = [
    ["AABA", "AAPL"],
    ["AMD", "AMZN"],
    ["C", "INTC"],
    ["MSFT", "GOOGL"],
    ["GOOG", "VZ"],
];

const DEFAULT_PREVIEW_SYMBOLS: [&str; 10] = [
    "AABA", "AAPL", "AMD", "AMZN", "C", "INTC", "MSFT", "GOOGL", "WFC", "VZ",
];

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub api_key: String,
    pub database_url: String,
    pub base_url: String,
    pub realtime_period: Duration,
    pub historical_period: Duration,
    pub minute_table: String,
    pub day_table: String,
    pub request_delay: Duration,
    pub manifest_path: Option<PathBuf>,
    pub preview_symbols: Vec<String>,
}

impl FeedConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, FeedError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, FeedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("ALPHA_VANTAGE_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| FeedError::config("ALPHA_VANTAGE_API_KEY is not set"))?;

        let realtime_period = Duration::from_secs(parse_or(&lookup, "FEED_REALTIME_PERIOD_SECS", 60));
        let historical_period =
            Duration::from_secs(parse_or(&lookup, "FEED_HISTORICAL_PERIOD_SECS", 21_600));
        if realtime_period.is_zero() || historical_period.is_zero() {
            return Err(FeedError::config("collection periods must be positive"));
        }

        let minute_table = lookup("FEED_MINUTE_TABLE").unwrap_or_else(|| DEFAULT_MINUTE_TABLE.to_string());
        let day_table = lookup("FEED_DAY_TABLE").unwrap_or_else(|| DEFAULT_DAY_TABLE.to_string());
        TableName::parse(&minute_table)?;
        TableName::parse(&day_table)?;

        let preview_symbols = match lookup("FEED_PREVIEW_SYMBOLS") {
            Some(list) => split_symbols(&list),
            None => DEFAULT_PREVIEW_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            api_key,
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            base_url: lookup("ALPHA_VANTAGE_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            realtime_period,
            historical_period,
            minute_table,
            day_table,
            request_delay: Duration::from_millis(parse_or(&lookup, "FEED_REQUEST_DELAY_MS", 250)),
            manifest_path: lookup("FEED_MANIFEST").map(PathBuf::from),
            preview_symbols,
        })
    }

    pub fn period_for(&self, mode: FetchMode) -> Duration {
        match mode {
            FetchMode::Realtime => self.realtime_period,
            FetchMode::Historical => self.historical_period,
        }
    }

    pub fn table_for(&self, mode: FetchMode) -> &str {
        match mode {
            FetchMode::Realtime => &self.minute_table,
            FetchMode::Historical => &self.day_table,
        }
    }

    pub fn fetch_params(&self) -> FetchParams {
        FetchParams {
            request_delay: self.request_delay,
            ..FetchParams::default()
        }
    }
}

/// Falls back to `default` when the variable is missing or unparsable.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}={:?} is not valid, using the default", key, raw);
            default
        }),
    }
}

fn split_symbols(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `[[daemon]]` entries, one collection daemon each.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(rename = "daemon", default)]
    pub daemons: Vec<DaemonEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DaemonEntry {
    pub symbols: Vec<String>,
    pub mode: Option<FetchMode>,
    pub period_secs: Option<u64>,
    pub name: Option<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            daemons: DEFAULT_PAIRS
                .iter()
                .map(|pair| DaemonEntry {
                    symbols: pair.iter().map(|s| s.to_string()).collect(),
                    mode: None,
                    period_secs: None,
                    name: None,
                })
                .collect(),
        }
    }
}

impl FromStr for Manifest {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|e| FeedError::config(format!("invalid manifest: {}", e)))
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, FeedError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            FeedError::config(format!("cannot read manifest {}: {}", path.display(), e))
        })?;
        text.parse()
    }

    /// Turns every entry into the settings of one daemon. Entries without a
    /// mode run in `default_mode`; entries without a period use the mode's.
    pub fn resolve(
        &self,
        config: &FeedConfig,
        default_mode: FetchMode,
    ) -> Result<Vec<DaemonSettings>, FeedError> {
        if self.daemons.is_empty() {
            return Err(FeedError::config("manifest declares no daemons"));
        }

        let settings = self
            .daemons
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let symbols: Vec<String> = entry
                    .symbols
                    .iter()
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                if symbols.is_empty() {
                    return Err(FeedError::config(format!("daemon #{} has no symbols", idx + 1)));
                }

                let mode = entry.mode.unwrap_or(default_mode);
                let period = match entry.period_secs {
                    Some(0) => {
                        return Err(FeedError::config(format!("daemon #{} has a zero period", idx + 1)));
                    }
                    Some(secs) => Duration::from_secs(secs),
                    None => config.period_for(mode),
                };

                Ok(DaemonSettings {
                    name: entry
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("daemon_{}", idx + 1)),
                    mode,
                    symbols,
                    period,
                    table: config.table_for(mode).to_string(),
                    params: config.fetch_params(),
                })
            })
            .collect::<Result<Vec<_>, FeedError>>()?;

        // Daemons are supervised by name; a repeated name would hide one of them.
        let mut names = HashSet::new();
        if let Some(dup) = settings.iter().find(|s| !names.insert(s.name.as_str())) {
            return Err(FeedError::config(format!("daemon name '{}' is used twice", dup.name)));
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = FeedConfig::from_lookup(lookup_from(&[("ALPHA_VANTAGE_API_KEY", "demo")])).unwrap();

        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.realtime_period, Duration::from_secs(60));
        assert_eq!(config.historical_period, Duration::from_secs(21_600));
        assert_eq!(config.table_for(FetchMode::Realtime), "stock_price_minute");
        assert_eq!(config.table_for(FetchMode::Historical), "stock_price_day");
        assert_eq!(config.request_delay, Duration::from_millis(250));
        assert_eq!(config.preview_symbols.len(), 10);
        assert!(config.manifest_path.is_none());
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = FeedConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, FeedError::Configuration(_)));
    }

    #[test]
    fn unsafe_table_name_is_rejected() {
        let err = FeedConfig::from_lookup(lookup_from(&[
            ("ALPHA_VANTAGE_API_KEY", "demo"),
            ("FEED_DAY_TABLE", "prices; DROP TABLE x"),
        ]))
        .unwrap_err();
        assert!(matches!(err, FeedError::Configuration(_)));
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let config = FeedConfig::from_lookup(lookup_from(&[
            ("ALPHA_VANTAGE_API_KEY", "demo"),
            ("FEED_REALTIME_PERIOD_SECS", "120"),
            ("FEED_REQUEST_DELAY_MS", "soon"),
            ("FEED_PREVIEW_SYMBOLS", "aapl, msft,,"),
        ]))
        .unwrap();

        assert_eq!(config.realtime_period, Duration::from_secs(120));
        assert_eq!(config.request_delay, Duration::from_millis(250));
        assert_eq!(config.preview_symbols, ["AAPL", "MSFT"]);
    }

    #[test]
    fn default_manifest_resolves_to_five_pairs() {
        let config = FeedConfig::from_lookup(lookup_from(&[("ALPHA_VANTAGE_API_KEY", "demo")])).unwrap();
        let settings = Manifest::default().resolve(&config, FetchMode::Historical).unwrap();

        assert_eq!(settings.len(), 5);
        assert_eq!(settings[0].name, "daemon_1");
        assert_eq!(settings[0].symbols, ["AABA", "AAPL"]);
        assert!(settings.iter().all(|s| s.table == "stock_price_day"));
        assert!(settings.iter().all(|s| s.period == Duration::from_secs(21_600)));
    }

    #[test]
    fn manifest_entries_override_mode_and_period() {
        let manifest: Manifest = r#"
            [[daemon]]
            symbols = ["aapl", "amd"]

            [[daemon]]
            name = "nightly"
            symbols = ["VZ"]
            mode = "hist"
            period_secs = 3600
        "#
        .parse()
        .unwrap();

        let config = FeedConfig::from_lookup(lookup_from(&[("ALPHA_VANTAGE_API_KEY", "demo")])).unwrap();
        let settings = manifest.resolve(&config, FetchMode::Realtime).unwrap();

        assert_eq!(settings[0].symbols, ["AAPL", "AMD"]);
        assert_eq!(settings[0].table, "stock_price_minute");
        assert_eq!(settings[0].period, Duration::from_secs(60));
        assert_eq!(settings[1].name, "nightly");
        assert_eq!(settings[1].mode, FetchMode::Historical);
        assert_eq!(settings[1].table, "stock_price_day");
        assert_eq!(settings[1].period, Duration::from_secs(3600));
    }

    #[test]
    fn bogus_manifest_mode_is_a_configuration_error() {
        let err = r#"
            [[daemon]]
            symbols = ["AAPL"]
            mode = "bogus"
        "#
        .parse::<Manifest>()
        .unwrap_err();
        assert!(matches!(err, FeedError::Configuration(_)));
    }

    #[test]
    fn explicit_name_clashing_with_a_generated_one_is_rejected() {
        let manifest: Manifest = r#"
            [[daemon]]
            symbols = ["AAPL"]

            [[daemon]]
            name = "daemon_1"
            symbols = ["AMD"]
        "#
        .parse()
        .unwrap();
        let config = FeedConfig::from_lookup(lookup_from(&[("ALPHA_VANTAGE_API_KEY", "demo")])).unwrap();

        let err = manifest.resolve(&config, FetchMode::Realtime).unwrap_err();
        assert!(matches!(err, FeedError::Configuration(ref msg) if msg.contains("daemon_1")));
    }

    #[test]
    fn malformed_period_falls_back_to_the_default() {
        let config = FeedConfig::from_lookup(lookup_from(&[
            ("ALPHA_VANTAGE_API_KEY", "demo"),
            ("FEED_REALTIME_PERIOD_SECS", "1m"),
            ("FEED_HISTORICAL_PERIOD_SECS", " 7200 "),
        ]))
        .unwrap();

        assert_eq!(config.realtime_period, Duration::from_secs(60));
        assert_eq!(config.historical_period, Duration::from_secs(7200));
    }

    #[test]
    fn empty_symbol_list_is_rejected() {
        let manifest: Manifest = "[[daemon]]\nsymbols = []\n".parse().unwrap();
        let config = FeedConfig::from_lookup(lookup_from(&[("ALPHA_VANTAGE_API_KEY", "demo")])).unwrap();
        assert!(manifest.resolve(&config, FetchMode::Realtime).is_err());
    }
}
