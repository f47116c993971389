pub mod price_repo;

pub use price_repo::PriceRepository;
