//! # Observability
//!
//! Tracing setup shared by every state-sync binary and test harness.
//!
//! Services call [`init`] or [`init_with_config`] once at startup and then use the
//! standard `tracing` macros. Where events end up is decided here:
//!
//! - With a `log_path`, every event is written as one JSON object per line to an
//!   append-only file (see [`LogEntry`] for the shape).
//! - With `also_stderr` (or no `log_path`), a compact human-readable layer writes to stderr.
//!
//! `RUST_LOG` always wins over the configured default level.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "state-sync".into(),
//!     default_level: "debug".into(),
//!     log_path: Some("/tmp/state-sync.jsonl".into()),
//!     also_stderr: true,
//! });
//! tracing::info!(state = "cart", "state registered");
//! ```

mod json_layer;
mod writer;

use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{AppendLogWriter, AppendWriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, written into every JSON line.
    pub service_name: String,

    /// Default filter (e.g. "info", "state_engine=debug").
    /// Overridden by `RUST_LOG` when set.
    pub default_level: String,

    /// JSONL output file. `None` disables the file layer.
    pub log_path: Option<PathBuf>,

    /// Also emit compact logs on stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: true,
        }
    }
}

/// Default JSONL location: `~/.state-sync/logs/state-sync.jsonl`.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join(".state-sync")
            .join("logs")
            .join("state-sync.jsonl")
    })
}

/// Initialize with defaults (stderr only).
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize with a custom configuration.
///
/// Calling this more than once is harmless: later calls leave the first subscriber
/// in place, which keeps test binaries that initialize per-test from panicking.
pub fn init_with_config(config: LogConfig) {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let json_layer = config.log_path.as_ref().and_then(|path| {
        match AppendLogWriter::new(path) {
            Ok(writer) => Some(
                JsonLayer::new(config.service_name.clone(), AppendWriterFactory::new(writer))
                    .with_filter(filter()),
            ),
            Err(e) => {
                eprintln!("observability: cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    let stderr_layer = (config.also_stderr || json_layer.is_none()).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter())
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "observability initialized"
        );
    }
}

/// Re-export tracing macros so services can use `observability::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};
