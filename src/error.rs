use thiserror::Error;

/// Errors raised while configuring the tracker or feeding it a frame.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid detection at index {index}: {reason}")]
    InvalidDetection { index: usize, reason: String },

    #[error("timestamp {current} ms is earlier than the previous frame at {previous} ms")]
    NonMonotonicTimestamp { previous: u64, current: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json5 error: {0}")]
    Json5(#[from] json5::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
