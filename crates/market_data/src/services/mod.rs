pub mod collection_service;
pub mod cycle_report;

pub use collection_service::{CollectionDaemon, DaemonSettings, WriteLock, write_lock};
pub use cycle_report::CycleReport;
