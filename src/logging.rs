//! `tracing` setup: a console layer plus an optional daily-rolling file layer.

use crate::models::error::SError;
use camino::Utf8Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "mod_vault.log";

/// Keeps the file writer alive. Pending lines are flushed when dropped.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global subscriber. `level` is an `EnvFilter` directive; `RUST_LOG`
/// takes precedence when set. With `log_dir`, logs also go to a file rotated daily.
pub fn init_logging(level: &str, log_dir: Option<&Utf8Path>) -> Result<LogGuard, SError> {
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_filter(console_filter);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_ansi(false)
                .with_filter(EnvFilter::new(level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SError::Config(format!("Logging already initialized: {e}")))?;

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// [`init_logging`] with the level and log folder from the user's settings.
pub fn init_from_config(config: &crate::config::AppConfig) -> Result<LogGuard, SError> {
    let logs = config.lib_paths().logs;
    init_logging(&config.log_level, config.log_to_file.then_some(logs.as_path()))
}
