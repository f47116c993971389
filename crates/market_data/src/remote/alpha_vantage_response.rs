use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use common::errors::FeedError;
use common::models::PriceRow;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::traits::RemoteResponse;

const SERIES_PREFIX: &str = "Time Series";

#[derive(Deserialize, Debug)]
pub struct TimeSeriesResponse {
    #[serde(rename(deserialize = "Error Message"))]
    pub error_message: Option<String>,
    #[serde(rename(deserialize = "Note"))]
    pub note: Option<String>,
    #[serde(rename(deserialize = "Information"))]
    pub information: Option<String>,
    // "Meta Data" plus one "Time Series (...)" object keyed by timestamp.
    #[serde(flatten)]
    pub sections: HashMap<String, Value>,
}

#[derive(Deserialize, Debug)]
pub struct RawBar {
    #[serde(rename(deserialize = "1. open"))]
    pub open: String,
    #[serde(rename(deserialize = "2. high"))]
    pub high: String,
    #[serde(rename(deserialize = "3. low"))]
    pub low: String,
    #[serde(rename(deserialize = "4. close"))]
    pub close: String,
    #[serde(rename(deserialize = "5. volume"))]
    pub volume: String,
}

impl RemoteResponse<Vec<PriceRow>> for TimeSeriesResponse {
    fn to_insertable(&self, symbol: &str) -> Result<Vec<PriceRow>, FeedError> {
        if let Some(message) = &self.error_message {
            return Err(FeedError::symbol(symbol, message.clone()));
        }
        if let Some(message) = self.note.as_ref().or(self.information.as_ref()) {
            return Err(FeedError::ProviderTransient(message.clone()));
        }

        let series = self
            .sections
            .iter()
            .find(|(key, _)| key.starts_with(SERIES_PREFIX))
            .map(|(_, value)| value)
            .ok_or_else(|| FeedError::decode(symbol, "response carries no time series"))?;

        let bars: BTreeMap<String, RawBar> = serde_json::from_value(series.clone())
            .map_err(|e| FeedError::decode(symbol, e.to_string()))?;

        bars.iter()
            .map(|(stamp, bar)| bar.to_row(symbol, stamp))
            .collect()
    }
}

impl RawBar {
    fn to_row(&self, symbol: &str, stamp: &str) -> Result<PriceRow, FeedError> {
        let price = |label: &str, text: &str| {
            Decimal::from_str(text.trim())
                .map_err(|e| FeedError::decode(symbol, format!("{} '{}': {}", label, text, e)))
        };

        Ok(PriceRow {
            symbol: symbol.to_string(),
            date_id: parse_stamp(stamp)
                .ok_or_else(|| FeedError::decode(symbol, format!("bad timestamp '{}'", stamp)))?,
            open: price("open", &self.open)?,
            high: price("high", &self.high)?,
            low: price("low", &self.low)?,
            close: price("close", &self.close)?,
            volume: self.volume.trim().parse::<i64>().map_err(|e| {
                FeedError::decode(symbol, format!("volume '{}': {}", self.volume, e))
            })?,
        })
    }
}

/// Intraday keys carry a time of day, daily keys only the date (midnight).
fn parse_stamp(stamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(stamp, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTRADAY: &str = r#"{
        "Meta Data": {
            "1. Information": "Intraday (1min) open, high, low, close prices and volume",
            "2. Symbol": "AAPL",
            "3. Last Refreshed": "2024-05-17 19:59:00",
            "4. Interval": "1min",
            "5. Output Size": "Full size",
            "6. Time Zone": "US/Eastern"
        },
        "Time Series (1min)": {
            "2024-05-17 19:59:00": {
                "1. open": "189.9850",
                "2. high": "190.1200",
                "3. low": "189.7100",
                "4. close": "189.8700",
                "5. volume": "2417"
            },
            "2024-05-17 19:58:00": {
                "1. open": "189.9000",
                "2. high": "190.0000",
                "3. low": "189.8500",
                "4. close": "189.9850",
                "5. volume": "1032"
            }
        }
    }"#;

    const DAILY: &str = r#"{
        "Meta Data": { "2. Symbol": "AMD" },
        "Time Series (Daily)": {
            "2024-05-16": {
                "1. open": "163.2000",
                "2. high": "165.4700",
                "3. low": "160.1000",
                "4. close": "160.7800",
                "5. volume": "48551421"
            }
        }
    }"#;

    fn parse(body: &str) -> TimeSeriesResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn intraday_bars_are_renamed_and_sorted_by_time() {
        let rows = parse(INTRADAY).to_insertable("AAPL").unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].date_id < rows[1].date_id);
        assert_eq!(rows[1].symbol, "AAPL");
        assert_eq!(rows[1].open, Decimal::from_str("189.9850").unwrap());
        assert_eq!(rows[1].volume, 2417);
        assert_eq!(rows[1].date_id.to_string(), "2024-05-17 19:59:00");
    }

    #[test]
    fn daily_bars_land_on_midnight() {
        let rows = parse(DAILY).to_insertable("AMD").unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date_id.to_string(), "2024-05-16 00:00:00");
        assert_eq!(rows[0].volume, 48_551_421);
    }

    #[test]
    fn error_message_means_unknown_symbol() {
        let body = r#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let err = parse(body).to_insertable("NOPE").unwrap_err();
        assert!(matches!(err, FeedError::ProviderSymbol { ref symbol, .. } if symbol == "NOPE"));
    }

    #[test]
    fn rate_limit_notes_are_transient() {
        for body in [
            r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
            r#"{"Information": "API rate limit reached."}"#,
        ] {
            assert!(parse(body).to_insertable("AAPL").unwrap_err().is_transient());
        }
    }

    #[test]
    fn malformed_numbers_are_decode_errors() {
        let body = INTRADAY.replace("\"2417\"", "\"n/a\"");
        let err = parse(&body).to_insertable("AAPL").unwrap_err();
        assert!(matches!(err, FeedError::Decode { .. }));
    }

    #[test]
    fn missing_series_is_a_decode_error() {
        let err = parse(r#"{"Meta Data": {}}"#).to_insertable("AAPL").unwrap_err();
        assert!(matches!(err, FeedError::Decode { .. }));
    }

    #[test]
    fn numbered_provider_labels_fill_every_bar_field() {
        let bar: RawBar = serde_json::from_str(
            r#"{"1. open": "1.5", "2. high": "2.5", "3. low": "0.5", "4. close": "2.0", "5. volume": "42"}"#,
        )
        .unwrap();

        assert_eq!(
            [bar.open, bar.high, bar.low, bar.close, bar.volume],
            ["1.5", "2.5", "0.5", "2.0", "42"]
        );
    }
}
