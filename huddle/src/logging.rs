//! Logging setup for embedding applications.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

/// Initialize tracing for the client.
///
/// With a file path, logs are written through a non-blocking appender and
/// the returned [`WorkerGuard`] must be held until shutdown so buffered
/// entries are flushed. Without one, logs go to stderr. `RUST_LOG`
/// overrides `level` when set. A no-op if a subscriber is already
/// installed.
pub fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if let Some(log_path) = file_path {
        let log_dir = log_path.parent()?;
        let file_name = log_path.file_name()?.to_str()?;

        let file_appender = tracing_appender::rolling::never(log_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let _ = tracing_subscriber::fmt()
            .with_writer(non_blocking)
            .with_env_filter(env_filter)
            .with_ansi(false)
            .try_init();
        return Some(guard);
    }

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .try_init();
    None
}
