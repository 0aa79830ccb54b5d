//! Layered configuration for the ignition boot orchestrator.
//!
//! [`BootConfig`] is resolved once per process through `ortho_config`, merging
//! built-in defaults, an optional configuration file, `IGNITION_*` environment
//! variables and command-line flags. The boot sequence never reads it
//! directly: [`Settings::from_config`] copies it into the mutable settings map
//! that every initialisation step receives, so one-shot flags can be consumed
//! exactly once.

mod connection;
mod defaults;
mod logging;
mod settings;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use connection::ConnectionSettings;
pub use defaults::{
    DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_ENVIRONMENT, DEFAULT_LOG_FILTER, DEFAULT_POOL_SIZE,
    DEFAULT_SCHEMA_CACHE_DIR, PRIMARY_IDENTITY,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use settings::{SettingValue, Settings, SettingsError, keys};

/// Process configuration consumed by the boot sequence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "IGNITION")]
pub struct BootConfig {
    /// Tracing filter expression, e.g. `info,ignition=debug`.
    #[serde(default = "defaults::default_log_filter")]
    pub log_filter: String,
    /// Telemetry output format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Environment name used to select connection settings.
    #[serde(default = "defaults::default_environment")]
    pub environment: String,
    /// Identity of the connection configuration owning the primary pool.
    #[serde(default = "defaults::default_identity")]
    pub database_identity: String,
    /// Connection URL for the primary pool.
    #[serde(default = "defaults::default_database_url")]
    pub database_url: String,
    /// Maximum number of pooled connections.
    #[serde(default = "defaults::default_pool_size")]
    pub database_pool_size: u32,
    /// Connect timeout in milliseconds, enforced by the data-access layer.
    #[serde(default = "defaults::default_connect_timeout_ms")]
    pub database_connect_timeout_ms: u64,
    /// Directory holding schema cache dumps.
    #[serde(default = "defaults::default_schema_cache_dir")]
    pub schema_cache_dir: Utf8PathBuf,
    /// Directory overriding [`Self::schema_cache_dir`] for this identity.
    #[serde(default)]
    pub schema_cache_path: Option<Utf8PathBuf>,
    /// Load the schema cache dump during boot. Unset means enabled.
    #[serde(default)]
    pub use_snapshot_dump: Option<bool>,
    /// Reject the dump when its version differs from the live schema. Unset
    /// means enabled.
    #[serde(default)]
    pub check_snapshot_version: Option<bool>,
    /// Eagerly define attribute accessors once boot completes. Unset means
    /// disabled.
    #[serde(default)]
    pub eager_load: Option<bool>,
    /// Warn when a single query materialises more records than this.
    #[serde(default)]
    pub warn_on_fetch_threshold: Option<u64>,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter(),
            log_format: defaults::default_log_format(),
            environment: defaults::default_environment(),
            database_identity: defaults::default_identity(),
            database_url: defaults::default_database_url(),
            database_pool_size: defaults::default_pool_size(),
            database_connect_timeout_ms: defaults::default_connect_timeout_ms(),
            schema_cache_dir: defaults::default_schema_cache_dir(),
            schema_cache_path: None,
            use_snapshot_dump: None,
            check_snapshot_version: None,
            eager_load: None,
            warn_on_fetch_threshold: None,
        }
    }
}

impl BootConfig {
    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Telemetry output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Environment name.
    #[must_use]
    pub fn environment(&self) -> &str {
        self.environment.as_str()
    }

    /// Directory holding schema cache dumps.
    #[must_use]
    pub fn schema_cache_dir(&self) -> &Utf8Path {
        self.schema_cache_dir.as_path()
    }

    /// Optional directory overriding [`Self::schema_cache_dir`].
    #[must_use]
    pub fn schema_cache_path(&self) -> Option<&Utf8Path> {
        self.schema_cache_path.as_deref()
    }

    /// Whether the schema cache dump is loaded during boot.
    #[must_use]
    pub fn use_snapshot_dump(&self) -> bool {
        self.use_snapshot_dump.unwrap_or(defaults::USE_SNAPSHOT_DUMP)
    }

    /// Whether the dump's version is checked before it is installed.
    #[must_use]
    pub fn check_snapshot_version(&self) -> bool {
        self.check_snapshot_version.unwrap_or(defaults::CHECK_SNAPSHOT_VERSION)
    }

    /// Whether attribute accessors are defined eagerly.
    #[must_use]
    pub fn eager_load(&self) -> bool {
        self.eager_load.unwrap_or(defaults::EAGER_LOAD)
    }

    /// Connection settings for the primary pool.
    #[must_use]
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            identity: self.database_identity.clone(),
            url: self.database_url.clone(),
            pool_size: self.database_pool_size,
            connect_timeout: Duration::from_millis(self.database_connect_timeout_ms),
            environment: self.environment.clone(),
        }
    }
}
