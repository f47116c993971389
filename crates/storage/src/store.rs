use async_trait::async_trait;
use common::errors::FeedError;
use common::models::PriceRow;
use sqlx::SqlitePool;

use crate::db::TableName;
use crate::repositories::PriceRepository;

/// Destination for fetched price batches.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Merges `rows` into `table`, last write wins per `(sym, dateid)`.
    /// All-or-nothing for the batch.
    async fn upsert(&self, table: &str, rows: &[PriceRow]) -> Result<u64, FeedError>;
}

#[derive(Clone)]
pub struct SqlitePriceStore {
    pool: SqlitePool,
}

impl SqlitePriceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn upsert(&self, table: &str, rows: &[PriceRow]) -> Result<u64, FeedError> {
        let table = TableName::parse(table)?;
        PriceRepository::upsert_batch(&self.pool, &table, rows)
            .await
            .map_err(FeedError::persistence)
    }
}
