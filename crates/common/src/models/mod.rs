pub mod fetch;
pub mod price;

pub use fetch::{FetchMode, FetchParams, FetchRequest, FetchResult, Interval, OutputSize, RetryPolicy};
pub use price::PriceRow;
