//! Error types shared by the event core and the trading facade.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Handler for event '{event_type}' panicked: {message}")]
    Dispatch { event_type: String, message: String },

    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Logger error: {0}")]
    Logger(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        EngineError::InvalidParameter(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
