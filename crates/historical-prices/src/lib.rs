pub mod backfill;
pub mod cache;
pub mod providers;
pub mod service;

pub use backfill::backfill_checkpoints;
pub use cache::HistoricalCache;
pub use service::{HistoricalPriceService, HistoricalServiceConfig};
