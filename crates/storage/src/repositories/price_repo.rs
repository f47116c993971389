use std::str::FromStr;

use chrono::NaiveDateTime;
use common::models::PriceRow;
use rust_decimal::Decimal;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::TableName;

/// Column order used by every statement in this module. `(sym, dateid)` is the key.
pub const PRICE_COLUMNS: [&str; 7] = ["dateid", "open", "high", "low", "close", "volume", "sym"];

const UPDATE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

// SQLITE_MAX_VARIABLE_NUMBER of the bundled library.
const SQLITE_MAX_BINDS: usize = 32_766;

pub const MAX_ROWS_PER_STATEMENT: usize = SQLITE_MAX_BINDS / PRICE_COLUMNS.len();

type StoredRow = (NaiveDateTime, String, String, String, String, i64, String);

pub struct PriceRepository;

impl PriceRepository {
    /// Inserts `rows`, overwriting every non-key column on a `(sym, dateid)`
    /// collision. Runs in one transaction; returns the number of rows touched.
    pub async fn upsert_batch(
        pool: &SqlitePool,
        table: &TableName,
        rows: &[PriceRow],
    ) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let mut affected = 0;

        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let result = Self::upsert_statement(table, chunk)
                .build()
                .execute(&mut *tx)
                .await?;
            affected += result.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    pub fn upsert_statement<'a>(table: &TableName, rows: &'a [PriceRow]) -> QueryBuilder<'a, Sqlite> {
        let mut builder = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            table,
            PRICE_COLUMNS.join(", ")
        ));

        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.date_id)
                .push_bind(row.open.to_string())
                .push_bind(row.high.to_string())
                .push_bind(row.low.to_string())
                .push_bind(row.close.to_string())
                .push_bind(row.volume)
                .push_bind(row.symbol.as_str());
        });

        let assignments: Vec<String> = UPDATE_COLUMNS
            .iter()
            .map(|col| format!("{col} = excluded.{col}"))
            .collect();

        builder.push(" ON CONFLICT (sym, dateid) DO UPDATE SET ");
        builder.push(assignments.join(", "));
        builder
    }

    pub async fn load_symbol(
        pool: &SqlitePool,
        table: &TableName,
        symbol: &str,
    ) -> Result<Vec<PriceRow>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM {} WHERE sym = ? ORDER BY dateid",
            PRICE_COLUMNS.join(", "),
            table
        );

        let stored = sqlx::query_as::<_, StoredRow>(&sql)
            .bind(symbol)
            .fetch_all(pool)
            .await?;

        stored.into_iter().map(Self::decode_row).collect()
    }

    pub async fn count(pool: &SqlitePool, table: &TableName) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(pool)
            .await
    }

    fn decode_row(
        (date_id, open, high, low, close, volume, symbol): StoredRow,
    ) -> Result<PriceRow, sqlx::Error> {
        let price = |text: &str| {
            Decimal::from_str(text).map_err(|e| sqlx::Error::Decode(Box::new(e)))
        };

        Ok(PriceRow {
            symbol,
            date_id,
            open: price(&open)?,
            high: price(&high)?,
            low: price(&low)?,
            close: price(&close)?,
            volume,
        })
    }
}
