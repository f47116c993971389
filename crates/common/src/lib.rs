pub mod actors;
pub mod errors;
pub mod logger;
pub mod models;

pub use errors::{FeedError, Result};
