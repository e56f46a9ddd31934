//! Logging module for ExhibitStream
//!
//! This module configures structured logging using the tracing crate,
//! providing JSON output for production and pretty formatting for development.
//! Output goes to stderr, or is appended to a log file when one is given.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::error::{Error, Result};

/// Log file used by `--log` when no path is given
pub const DEFAULT_LOG_FILE: &str = "log.txt";

/// Build the default filter directive for a log level
pub fn filter_directive(log_level: &str) -> String {
    format!("exhibitstream={},tower_http=info", log_level)
}

/// Open a log file for appending, creating it if needed
pub fn open_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::config(format!("Cannot open log file {}: {}", path.display(), e)))
}

/// Initialize the logging system
///
/// Configures tracing based on the environment:
/// - Production: JSON formatted logs
/// - Development: Pretty formatted logs with colors
///
/// When `log_file` is set, logs are appended there without colors.
pub fn init_tracing(log_level: &str, environment: &str, log_file: Option<&Path>) -> Result<()> {
    // Create environment filter from RUST_LOG or use provided log level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let writer = match log_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let use_ansi = log_file.is_none();

    if environment == "production" {
        let formatting_layer = fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true);

        Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to initialize tracing: {}", e)))?;
    } else {
        let formatting_layer = fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(use_ansi)
            .with_file(true)
            .with_line_number(true)
            .with_target(true);

        Registry::default()
            .with(env_filter)
            .with(formatting_layer)
            .try_init()
            .map_err(|e| Error::internal(format!("Failed to initialize tracing: {}", e)))?;
    }

    tracing::info!(
        environment = environment,
        log_level = log_level,
        log_file = ?log_file,
        "Logging initialized"
    );

    Ok(())
}

/// Create a span for Kafka message processing
#[macro_export]
macro_rules! kafka_span {
    ($partition:expr, $offset:expr) => {
        tracing::info_span!(
            "kafka_message",
            partition = $partition,
            offset = $offset,
            outcome = tracing::field::Empty,
        )
    };
}
