//! Configuration management.
//!
//! `config.json` under [`Paths::base_dir`] is optional; a missing file means
//! defaults. Environment variables are applied last:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `STATE_SYNC_LOG_LEVEL` | `log_level` |
//! | `STATE_SYNC_REDIS_URL` | `storage.redis_url` |
//! | `STATE_SYNC_DATABASE` | `storage.database_path` |

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const DEFAULT_PROCESS_CACHE_CAPACITY: usize = 256;
const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;
const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_REDIS_KEY_PREFIX: &str = "state-sync:";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// State storage backends.
    #[serde(default)]
    pub storage: StorageSettings,
    /// JSON manifest of state declarations, keyed by type identifier.
    #[serde(default)]
    pub descriptors_file: Option<PathBuf>,
}

/// Settings for the ephemeral and durable state backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Maximum entries held by the in-process cache tier.
    pub process_cache_capacity: usize,
    /// TTL applied to the shared cache and TTL store tiers.
    pub cache_ttl_secs: u64,
    /// Redis URL for the shared cache tier. In-process when unset.
    pub redis_url: Option<String>,
    /// Prefix for every Redis key.
    pub redis_key_prefix: String,
    /// Durable SQLite file. Defaults to [`Paths::database_file`].
    pub database_path: Option<PathBuf>,
    /// Inactivity after which durable rows count as belonging to an expired session.
    pub session_ttl_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            process_cache_capacity: DEFAULT_PROCESS_CACHE_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            redis_url: None,
            redis_key_prefix: DEFAULT_REDIS_KEY_PREFIX.to_string(),
            database_path: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl StorageSettings {
    /// Resolve the durable database path against `paths`.
    pub fn database_path(&self, paths: &Paths) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| paths.database_file())
    }

    /// Parsed Redis URL, if configured.
    pub fn redis_url(&self) -> CoreResult<Option<Url>> {
        self.redis_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(CoreError::from)
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage: StorageSettings::default(),
            descriptors_file: None,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load `config.json` from `paths`, falling back to defaults, then apply
    /// environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `paths`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Reject settings the backends cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.storage.process_cache_capacity == 0 {
            return Err(CoreError::InvalidSetting {
                key: "storage.process_cache_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.storage.cache_ttl_secs == 0 {
            return Err(CoreError::InvalidSetting {
                key: "storage.cache_ttl_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.storage.session_ttl_secs == 0 {
            return Err(CoreError::InvalidSetting {
                key: "storage.session_ttl_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        self.storage.redis_url()?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("STATE_SYNC_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(redis_url) = std::env::var("STATE_SYNC_REDIS_URL") {
            self.storage.redis_url = Some(redis_url).filter(|s| !s.trim().is_empty());
        }
        if let Ok(database) = std::env::var("STATE_SYNC_DATABASE") {
            self.storage.database_path = Some(PathBuf::from(database));
        }
    }
}
