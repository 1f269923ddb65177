//! Tracing subscriber setup.
//!
//! Diagnostic output always goes to stderr: stdout is reserved for the
//! stdio bridge protocol. When a log directory is configured, records are
//! also written to a daily-rotated file.

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// File name prefix for rotated log files (`wake.log.YYYY-MM-DD`).
const LOG_FILE_PREFIX: &str = "wake.log";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Returns the file
/// writer guard when file logging is enabled; keep it alive for the life
/// of the process or buffered records are lost. A log directory that
/// cannot be created leaves logging on stderr only. Calling this twice is
/// harmless: the second install is ignored.
pub fn init(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let mut file_error = None;
    let (file_layer, guard) = match config.log_dir.as_deref().map(rolling_writer) {
        Some(Ok((writer, guard))) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            file_error = Some(e);
            (None, None)
        }
        None => (None, None),
    };

    if tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }

    if let Some(e) = file_error {
        tracing::warn!(
            error = %e,
            log_dir = ?config.log_dir,
            "file logging unavailable; logging to stderr only"
        );
    }

    guard
}

/// Non-blocking writer over a daily-rotated file in `dir`.
fn rolling_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}
