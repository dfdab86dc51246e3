use crate::log_capture::{LogCapture, LogCaptureLayer};
use anyhow::Result;
use std::env;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Base level from `LOG_LEVEL` (error, warn, info or debug), info otherwise
pub fn log_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO)
}

/// Logs go to stderr so stdout stays free for command output. When a
/// capture is given, events are also buffered for the per-set log dumps.
pub fn init_logging(capture: Option<LogCapture>) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(log_level().into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(capture.map(LogCaptureLayer::new))
        .try_init()?;

    Ok(())
}
