use std::time::Duration;

use tracing::{info, warn};

/// What one fetch → write cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub written: u64,
    pub failed_symbols: Vec<String>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn skipped_write(&self) -> bool {
        self.fetched == 0
    }

    pub fn log_summary(&self, daemon: &str, symbols: &str) {
        if self.skipped_write() {
            warn!(
                daemon,
                symbols,
                failed = ?self.failed_symbols,
                "No rows fetched, write skipped"
            );
            return;
        }

        info!(
            daemon,
            symbols,
            fetched = self.fetched,
            written = self.written,
            failed = ?self.failed_symbols,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Cycle SUCCESS"
        );
    }
}
