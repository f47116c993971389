use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::models::FetchMode;
use market_data::FeedAdapter;
use market_data::remote::AlphaVantageClient;
use market_data::services::{CollectionDaemon, DaemonSettings, write_lock};
use sqlx::SqlitePool;
use storage::{SqlitePriceStore, TableName, db};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::actors::{Actor, Supervisor};
use crate::config::{FeedConfig, Manifest};

/// Extra time a daemon gets on top of its period before it counts as stalled.
const STALL_SLACK: Duration = Duration::from_secs(300);

pub fn stall_timeout(period: Duration) -> Duration {
    period.saturating_mul(2).saturating_add(STALL_SLACK)
}

/// Opens the store and creates every table the daemons will write to.
pub async fn prepare_store(
    config: &FeedConfig,
    settings: &[DaemonSettings],
) -> anyhow::Result<SqlitePool> {
    let pool = db::connect(&config.database_url).await?;

    let tables: BTreeSet<&str> = settings.iter().map(|s| s.table.as_str()).collect();
    for table in tables {
        db::ensure_price_table(&pool, &TableName::parse(table)?).await?;
    }

    Ok(pool)
}

/// Registers one daemon per entry, all sharing one write lock, and supervises
/// them until `shutdown` fires.
pub async fn run_daemons(
    settings: Vec<DaemonSettings>,
    adapter: Arc<FeedAdapter>,
    shutdown: CancellationToken,
) {
    let lock = write_lock();
    let mut supervisor = Supervisor::new(shutdown.clone());

    for daemon in settings {
        let label = daemon.name.clone();
        let stall = stall_timeout(daemon.period);
        let adapter = adapter.clone();
        let lock = lock.clone();
        let token = shutdown.clone();

        supervisor.register_actor(
            label,
            stall,
            Box::new(move || -> Box<dyn Actor> {
                Box::new(CollectionDaemon::new(
                    daemon.clone(),
                    adapter.clone(),
                    lock.clone(),
                    token.clone(),
                ))
            }),
        );
    }

    info!("##### Data Collection ({} daemons) #####", supervisor.len());
    supervisor.start().await;
}

pub async fn run(
    config: &FeedConfig,
    mode: FetchMode,
    manifest: &Manifest,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let settings = manifest.resolve(config, mode)?;
    let pool = prepare_store(config, &settings).await?;

    let client = AlphaVantageClient::new(config.api_key.clone(), config.base_url.clone())?;
    let adapter = FeedAdapter::new(Arc::new(client))
        .with_store(Arc::new(SqlitePriceStore::new(pool.clone())));

    info!("Initializing {} data collection daemons", mode);
    run_daemons(settings, Arc::new(adapter), shutdown).await;

    pool.close().await;
    info!("Data collection stopped");
    Ok(())
}
