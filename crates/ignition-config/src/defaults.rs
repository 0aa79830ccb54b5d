//! Built-in fallbacks applied when no configuration layer supplies a value.

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Identity of the connection configuration that owns the primary pool.
pub const PRIMARY_IDENTITY: &str = "primary";

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default environment name used to select connection settings.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: u32 = 5;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Schema cache dumps are loaded unless disabled.
pub(crate) const USE_SNAPSHOT_DUMP: bool = true;

/// Dump versions are checked unless disabled.
pub(crate) const CHECK_SNAPSHOT_VERSION: bool = true;

/// Attribute accessors are defined lazily unless enabled.
pub(crate) const EAGER_LOAD: bool = false;

/// Directory holding schema cache dumps when no override is configured.
pub const DEFAULT_SCHEMA_CACHE_DIR: &str = "db";

pub(crate) fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

pub(crate) fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_owned()
}

pub(crate) fn default_identity() -> String {
    PRIMARY_IDENTITY.to_owned()
}

pub(crate) fn default_database_url() -> String {
    format!("sqlite://{DEFAULT_SCHEMA_CACHE_DIR}/{DEFAULT_ENVIRONMENT}.sqlite3")
}

pub(crate) const fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

pub(crate) const fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

pub(crate) fn default_schema_cache_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_SCHEMA_CACHE_DIR)
}

