pub mod address;
pub mod detector;

pub use address::{identify_chain, validate_address, AddressExtractor};
pub use detector::MentionDetector;
