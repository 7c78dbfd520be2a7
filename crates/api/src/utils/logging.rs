use std::time::Duration;

use sidepanel_domain::{LogFormat, LoggingConfig, SidepanelError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. Calling this twice is harmless: the
/// second install fails and is ignored, which keeps tests that share a
/// process from panicking.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);
    let installed = match config.format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Pretty => builder.with_target(false).try_init(),
    };

    if installed.is_ok() {
        info!(level = %config.level, format = ?config.format, "Logging initialized");
    }
}

/// Log the outcome of a command execution with structured fields.
///
/// # Parameters
/// * `command` - Logical command identifier (e.g. `"auth::refresh"`).
/// * `elapsed` - Duration the command execution took.
/// * `error_kind` - Stable error label when the command failed.
///
/// Callers must avoid forwarding sensitive values in `command`.
#[inline]
pub fn log_command_execution(command: &str, elapsed: Duration, error_kind: Option<&str>) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match error_kind {
        None => info!(command, duration_ms, "command_execution_success"),
        Some(error_kind) => warn!(command, duration_ms, error_kind, "command_execution_failure"),
    }
}

/// Convert a `SidepanelError` into a stable label suitable for logging.
#[inline]
#[must_use]
pub const fn error_label(error: &SidepanelError) -> &'static str {
    match error {
        SidepanelError::Config(_) => "config",
        SidepanelError::Auth(_) => "auth",
        SidepanelError::Storage(_) => "storage",
        SidepanelError::Io(_) => "io",
        SidepanelError::InvalidInput(_) => "invalid_input",
        SidepanelError::Internal(_) => "internal",
    }
}
