//! Logging and tracing setup.
//!
//! Logs are written to **stderr** through `tracing-subscriber`. When the
//! `APSTRA_LOG` environment variable names a file, a second plain-text copy
//! of every event is appended to it.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `apstra_provider=debug`)
//! - `APSTRA_LOG`: Optional file that receives a copy of the provider's logs
//!
//! # Examples
//!
//! ```bash
//! # Debug logs from the provider, copied to a file
//! RUST_LOG=apstra_provider=debug APSTRA_LOG=/tmp/apstra.log ./my-host
//! ```

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ENV_LOG;
use crate::error::ProviderError;

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Open (creating if needed) a log file for appending.
pub fn open_log_file(path: &Path) -> Result<File, ProviderError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            ProviderError::Configuration(format!(
                "cannot open log file {}: {}",
                path.display(),
                e
            ))
        })
}

/// Initialize the default logging subscriber.
///
/// Respects `RUST_LOG` (default `info`) and `APSTRA_LOG`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// Like [`init_logging`], but `default_level` is used when `RUST_LOG` is not
/// set. An `APSTRA_LOG` file that cannot be opened is reported on stderr and
/// otherwise ignored.
pub fn init_logging_with_default(default_level: &str) {
    let file = std::env::var(ENV_LOG)
        .ok()
        .filter(|p| !p.is_empty())
        .and_then(|p| match open_log_file(Path::new(&p)) {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("{}", e);
                None
            },
        });

    let file_layer = file.map(|f| {
        fmt::layer()
            .with_writer(Mutex::new(f))
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(file_layer)
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Unlike [`init_logging`], this function does not panic if a subscriber
/// has already been set. Useful in tests.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
        .is_ok()
}

/// Initialize logging with an explicit log file in addition to stderr.
///
/// Returns `Ok(false)` when a global subscriber was already installed.
pub fn try_init_logging_with_file(
    default_level: &str,
    path: &Path,
) -> Result<bool, ProviderError> {
    let file = open_log_file(path)?;
    Ok(tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .is_ok())
}
