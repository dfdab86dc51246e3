use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonkeyError {
    #[error("Node action failed: {0}")]
    ActionFailed(String),

    #[error("No foreground tree available: {0}")]
    NoForegroundTree(String),

    #[error("Failed to launch target app: {0}")]
    LaunchFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Event sink error: {0}")]
    Sink(String),

    #[error("Session host error: {0}")]
    Host(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Session already terminated")]
    Terminated,

    #[error("Internal error: {0}")]
    Internal(String),
}
