pub mod filter;
pub mod registry;

pub use filter::{FilterConfig, FilterStats, TokenFilter};
pub use registry::{canonical_address, detect_chain_context, is_major_token, major_token_criteria, MajorToken};
