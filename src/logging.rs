//! Log setup.
//!
//! Everything goes to the agent's log file (`tgo.log` by default, appended
//! across runs). `-D` mirrors the same events to stderr; `-d` lowers the
//! default level to debug. `RUST_LOG` overrides both.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for the given verbosity.
pub fn default_directive(debug: bool) -> &'static str {
    if debug { "tgo=debug" } else { "tgo=info" }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must live until the
/// process exits.
pub fn init(log_file: &Path, debug: bool, to_screen: bool) -> Result<WorkerGuard> {
    let dir = match log_file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = log_file
        .file_name()
        .context("Log file path has no file name")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
    let screen_layer = to_screen.then(|| fmt::layer().with_writer(std::io::stderr).compact());

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(screen_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
