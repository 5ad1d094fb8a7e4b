//! Structured Logger
//!
//! Wraps `tracing` with an optional console layer, an optional rolling
//! NDJSON file layer, and environment-based level control.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix of the daily log files.
pub const LOG_FILE_PREFIX: &str = "chatdeck.log";

/// Initialize the global logger.
///
/// `RUST_LOG` overrides `level`. Console output goes to stderr so it never
/// interleaves with streamed replies on stdout. Calling this twice is a
/// no-op.
pub fn init_logger(log_dir: Option<&Path>, level: &str, console: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // NDJSON to `<log_dir>/chatdeck.log.YYYY-MM-DD`
    let file_layer = log_dir.map(|dir| {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer()
            .json()
            .with_writer(file_appender)
            .with_ansi(false)
    });

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
