use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use common::errors::FeedError;
use sqlx::sqlite::{self, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

/// A validated SQL identifier. Identifiers cannot be bound as parameters, so
/// this is the only way a table name reaches a statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: &str) -> Result<Self, FeedError> {
        let mut chars = name.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid_head && valid_tail && name.len() <= 64 {
            Ok(Self(name.to_string()))
        } else {
            Err(FeedError::config(format!("invalid table name '{}'", name)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    if database_url.contains(":memory:") {
        return connect_in_memory().await;
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30))
        .statement_cache_capacity(100);

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!("Opening price database {}", options.get_filename().display());
    SqlitePool::connect_with(options).await
}

/// Single-connection pool over a private in-memory database.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
}

pub async fn ensure_price_table(pool: &SqlitePool, table: &TableName) -> Result<(), sqlx::Error> {
    let ddl = format!(
        r#"
            CREATE TABLE IF NOT EXISTS {table} (
                dateid TEXT NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                volume INTEGER NOT NULL,
                sym TEXT NOT NULL,
                PRIMARY KEY (sym, dateid)
            )
        "#
    );

    sqlx::query(&ddl).execute(pool).await?;
    debug!("Table {} ready", table);
    Ok(())
}
