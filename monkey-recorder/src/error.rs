use monkey::MonkeyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Failed to initialize recorder: {0}")]
    InitializationError(String),

    #[error("Failed to save recorded set: {0}")]
    SaveError(String),

    #[error("Event log error: {0}")]
    EventError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;

impl From<RecorderError> for MonkeyError {
    fn from(error: RecorderError) -> Self {
        MonkeyError::Sink(error.to_string())
    }
}
