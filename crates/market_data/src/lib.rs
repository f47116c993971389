pub mod adapter;
pub mod remote;
pub mod services;
pub mod traits;

pub use adapter::FeedAdapter;
pub use traits::{PriceProvider, RemoteResponse};
