pub mod db;
pub mod repositories;
pub mod store;

pub use db::TableName;
pub use store::{PriceStore, SqlitePriceStore};
