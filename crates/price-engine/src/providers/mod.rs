//! Provider adapters for the price fan-out.
//!
//! Every adapter owns its HTTP client, its rate limiter, and its error
//! handling: transport and decode failures are logged at debug and surface
//! as `Ok(None)` so one bad provider never fails a request.

pub mod dex_aggregator;
pub mod evm_rpc;
pub mod explorer;
pub mod goplus;
pub mod meta_aggregator;
pub mod metadata;

pub use dex_aggregator::{DexAggregatorClient, PairInfo};
pub use evm_rpc::EvmRpcClient;
pub use explorer::ExplorerClient;
pub use goplus::{GoPlusClient, TokenSecurity};
pub use meta_aggregator::MetaAggregatorClient;
pub use metadata::MetadataClient;
