//! Logging initialization for the binary: logs go to a file or nowhere, never to the terminal.
//!
//! - **RUST_LOG**: filter, e.g. `info`, `rincewrite=debug`. Default: `info`.
//! - **LOG_FILE**: when set, logs are appended to this file (plain text, no ANSI)
//!   through a non-blocking `tracing-appender` writer. When unset, logs are dropped
//!   so the chat transcript owns stdout.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,hyper_util=off";

/// Installs the global subscriber. Keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init() -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    match std::env::var_os("LOG_FILE").filter(|v| !v.is_empty()) {
        Some(path) => {
            let path = Path::new(&path);
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let file_name = path
                .file_name()
                .ok_or_else(|| format!("LOG_FILE has no file name: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_filter(filter);
            tracing_subscriber::registry().with(file_layer).try_init()?;
            tracing::info!(path = %path.display(), "rincewrite logging to file");
            Ok(Some(guard))
        }
        None => {
            let sink_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::sink)
                .with_filter(filter);
            tracing_subscriber::registry().with(sink_layer).try_init()?;
            Ok(None)
        }
    }
}
