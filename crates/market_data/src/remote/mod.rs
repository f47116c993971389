pub mod alpha_vantage_client;
pub mod alpha_vantage_response;

pub use alpha_vantage_client::{AlphaVantageClient, DEFAULT_BASE_URL};
pub use alpha_vantage_response::{RawBar, TimeSeriesResponse};
