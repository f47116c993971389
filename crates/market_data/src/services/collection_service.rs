use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::errors::FeedError;
use common::models::{FetchMode, FetchParams, FetchRequest};
use tokio::sync::{Mutex, mpsc};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::adapter::FeedAdapter;
use crate::services::CycleReport;

/// Serializes upserts across every daemon of the process.
pub type WriteLock = Arc<Mutex<()>>;

pub fn write_lock() -> WriteLock {
    Arc::new(Mutex::new(()))
}

/// Everything a single daemon owns. Built per instance, never shared.
#[derive(Debug, Clone)]
pub struct DaemonSettings {
    pub name: String,
    pub mode: FetchMode,
    pub symbols: Vec<String>,
    pub period: Duration,
    pub table: String,
    pub params: FetchParams,
}

pub struct CollectionDaemon {
    id: Uuid,
    name: String,
    symbols_label: String,
    request: FetchRequest,
    table: String,
    period: Duration,
    adapter: Arc<FeedAdapter>,
    write_lock: WriteLock,
    shutdown: CancellationToken,
}

#[async_trait]
impl Actor for CollectionDaemon {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::from(self.request.mode)
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        info!(
            "{} scheduling {} {} collection every {} seconds",
            self.name,
            self.symbols_label,
            self.request.mode,
            self.period.as_secs()
        );

        while !self.shutdown.is_cancelled() {
            supervisor_tx.send(ControlMessage::Heartbeat(self.id)).await?;

            match self.run_cycle().await {
                Ok(report) => report.log_summary(&self.name, &self.symbols_label),
                Err(e) if e.is_fatal() => {
                    error!(
                        daemon = %self.name,
                        symbols = %self.symbols_label,
                        error = %e,
                        "Cycle FAILED, daemon stopped"
                    );
                    supervisor_tx
                        .send(ControlMessage::Error(self.id, format!("{}: {}", self.name, e)))
                        .await?;
                    break;
                }
                Err(e) => {
                    error!(
                        daemon = %self.name,
                        symbols = %self.symbols_label,
                        error = %e,
                        "Cycle FAILED, retrying next period"
                    );
                    supervisor_tx
                        .send(ControlMessage::Error(self.id, format!("{}: {}", self.name, e)))
                        .await?;
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = time::sleep(self.period) => {}
            }
        }

        debug!("{} stopping", self.name);
        supervisor_tx.send(ControlMessage::Shutdown(self.id)).await?;
        Ok(())
    }
}

impl CollectionDaemon {
    pub fn new(
        settings: DaemonSettings,
        adapter: Arc<FeedAdapter>,
        write_lock: WriteLock,
        shutdown: CancellationToken,
    ) -> Self {
        let params = settings.params.bounded_by(settings.period);
        Self {
            id: Uuid::new_v4(),
            symbols_label: settings.symbols.join(", "),
            request: FetchRequest::new(settings.mode, &settings.symbols, params),
            name: settings.name,
            table: settings.table,
            period: settings.period,
            adapter,
            write_lock,
            shutdown,
        }
    }

    /// Fetch, then write under the shared lock. An empty fetch skips the write.
    pub async fn run_cycle(&self) -> Result<CycleReport, FeedError> {
        let started = Instant::now();
        let fetched = self.adapter.fetch_request(&self.request).await?;

        let mut report = CycleReport {
            fetched: fetched.len(),
            failed_symbols: fetched.failed_symbols().to_vec(),
            ..CycleReport::default()
        };

        if !fetched.is_empty() {
            let rows = fetched.into_rows();
            let _guard = self.write_lock.lock().await;
            info!("Inserting new data for {}", self.symbols_label);
            report.written = self.adapter.upsert(&self.table, &rows).await?;
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }
}
