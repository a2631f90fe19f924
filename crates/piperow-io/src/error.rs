use thiserror::Error;

/// Result type local to piperow-io.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("unknown serde '{0}'")]
    UnknownSerde(String),

    #[error("serde '{name}' failed to initialize: {reason}")]
    SerdeInit { name: String, reason: String },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error(transparent)]
    Core(#[from] piperow_core::Error),
}
