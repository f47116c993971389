use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// One OHLCV bar for one symbol. `(symbol, date_id)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRow {
    pub symbol: String,
    pub date_id: NaiveDateTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

impl PriceRow {
    pub fn key(&self) -> (&str, NaiveDateTime) {
        (&self.symbol, self.date_id)
    }
}
