//! Configuration, paths, and logging setup shared by the state-sync crates.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, StorageSettings, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
