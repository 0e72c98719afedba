pub mod dead_tokens;
pub mod engine;
pub mod market;
pub mod providers;
pub mod rate_limit;
pub mod resolver;

pub use dead_tokens::{BlacklistEntry, DeadTokenDetector};
pub use engine::{PriceEngine, PriceEngineConfig};
pub use market::MarketAnalyzer;
pub use rate_limit::RateLimiter;
pub use resolver::{PairResolution, PairResolver};
