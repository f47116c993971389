//! Periodic stock price collection: configuration, daemon supervision and
//! the preview mode of the `feed` binary.

pub mod actors;
pub mod config;
pub mod orchestrator;
pub mod preview;

pub use config::{FeedConfig, Manifest};
