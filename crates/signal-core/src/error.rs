use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<std::io::Error> for SignalError {
    fn from(e: std::io::Error) -> Self {
        SignalError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SignalError {
    fn from(e: serde_json::Error) -> Self {
        SignalError::Decode(e.to_string())
    }
}
