//! Tracing configuration and log routing.
//!
//! Logs go to stdout with a compact formatter and, when a file destination is available,
//! to a log file through a non-blocking writer. `DOCWEAVE_LOG_FILE` selects an explicit
//! file; without it the file layer appends to `logs/docweave.log`. Pipeline runs are
//! chatty at `debug`, so the default filter is `info` unless `RUST_LOG` says otherwise.

use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Keeps the non-blocking writer flushing for the life of the process.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global tracing subscriber. Call once at startup, after config init.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry().with(filter).with(stdout);

    match file_writer() {
        Some(writer) => {
            let file = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .compact();
            registry.with(file).init();
        }
        None => registry.init(),
    }
}

/// Open the log file and wrap it in a non-blocking writer.
///
/// Failures here are not fatal; the server still logs to stdout.
fn file_writer() -> Option<NonBlocking> {
    let file = match std::env::var("DOCWEAVE_LOG_FILE") {
        Ok(path) => std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| eprintln!("Failed to open log file {path}: {err}"))
            .ok()?,
        Err(_) => {
            if let Err(err) = std::fs::create_dir_all("logs") {
                eprintln!("Failed to create logs directory: {err}");
                return None;
            }
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open("logs/docweave.log")
                .map_err(|err| eprintln!("Failed to open logs/docweave.log: {err}"))
                .ok()?
        }
    };

    let (writer, guard) = tracing_appender::non_blocking(file);
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
