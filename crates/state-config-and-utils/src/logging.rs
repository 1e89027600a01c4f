//! Logging initialization.
//!
//! Thin wrapper over the `observability` package so binaries only pick a level
//! and an optional JSONL file.

use std::path::PathBuf;

use observability::LogConfig;

/// Initialize tracing for a state-sync binary.
///
/// `RUST_LOG` overrides `level`. With `log_file`, events are also written as
/// JSONL to that file; stderr always gets the compact format.
///
/// ```ignore
/// init_logging("info", Some(paths.log_file()));
/// tracing::info!("sweep started");
/// ```
pub fn init_logging(level: &str, log_file: Option<PathBuf>) {
    observability::init_with_config(LogConfig {
        service_name: "state-sync".into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path: log_file,
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
