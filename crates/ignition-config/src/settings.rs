//! Mutable boot settings threaded through every initialisation step.
//!
//! Steps gate one-time behaviour on flags. Reading a flag through
//! [`Settings::consume_flag`] removes it, so a later step (or a repeated run)
//! cannot activate the same behaviour twice.

use std::collections::BTreeMap;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

use crate::{BootConfig, ConnectionSettings};

/// Well-known setting keys.
pub mod keys {
    /// Load the schema cache dump during boot.
    pub const USE_SNAPSHOT_DUMP: &str = "use_snapshot_dump";
    /// Validate the dump's version against the version oracle.
    pub const CHECK_SNAPSHOT_VERSION: &str = "check_snapshot_version";
    /// Eagerly define attribute accessors after boot.
    pub const EAGER_LOAD: &str = "eager_load";
    /// Record-count threshold above which fetches are reported.
    pub const WARN_ON_FETCH_THRESHOLD: &str = "warn_on_fetch_threshold";
}

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    /// Boolean switch.
    Flag(bool),
    /// Unsigned count or threshold.
    Integer(u64),
    /// Free-form text.
    Text(String),
}

impl SettingValue {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Flag(_) => "flag",
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(value) => write!(formatter, "{value}"),
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Text(value) => formatter.write_str(value),
        }
    }
}

/// Errors raised when a setting holds a value of the wrong kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The stored value's kind did not match the requested one.
    #[error("setting '{key}' expected a {expected} but holds a {found}")]
    KindMismatch {
        /// Key that was read.
        key: String,
        /// Kind the caller asked for.
        expected: &'static str,
        /// Kind actually stored.
        found: &'static str,
    },
}

/// Boot-time settings: typed connection parameters plus a map of one-shot
/// values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    connection: ConnectionSettings,
    schema_cache_dir: Utf8PathBuf,
    schema_cache_path: Option<Utf8PathBuf>,
    values: BTreeMap<String, SettingValue>,
}

impl Settings {
    /// Seeds settings from a resolved [`BootConfig`].
    #[must_use]
    pub fn from_config(config: &BootConfig) -> Self {
        let mut settings = Self {
            connection: config.connection_settings(),
            schema_cache_dir: config.schema_cache_dir.clone(),
            schema_cache_path: config.schema_cache_path.clone(),
            values: BTreeMap::new(),
        };
        settings.set(keys::USE_SNAPSHOT_DUMP, SettingValue::Flag(config.use_snapshot_dump()));
        settings.set(
            keys::CHECK_SNAPSHOT_VERSION,
            SettingValue::Flag(config.check_snapshot_version()),
        );
        settings.set(keys::EAGER_LOAD, SettingValue::Flag(config.eager_load()));
        if let Some(threshold) = config.warn_on_fetch_threshold {
            settings.set(keys::WARN_ON_FETCH_THRESHOLD, SettingValue::Integer(threshold));
        }
        settings
    }

    /// Connection parameters for the primary pool.
    #[must_use]
    pub const fn connection(&self) -> &ConnectionSettings {
        &self.connection
    }

    /// Directory holding schema cache dumps.
    #[must_use]
    pub fn schema_cache_dir(&self) -> &Utf8Path {
        self.schema_cache_dir.as_path()
    }

    /// Directory overriding [`Self::schema_cache_dir`], when configured.
    #[must_use]
    pub fn schema_cache_path(&self) -> Option<&Utf8Path> {
        self.schema_cache_path.as_deref()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: SettingValue) {
        self.values.insert(key.into(), value);
    }

    /// Reads `key` without consuming it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    /// Returns `true` while `key` has not been consumed.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Removes and returns `key`.
    pub fn consume(&mut self, key: &str) -> Option<SettingValue> {
        self.values.remove(key)
    }

    /// Removes `key` and returns its boolean value.
    ///
    /// `Ok(None)` means the flag was absent or already consumed. A value of
    /// another kind is still removed and reported as an error.
    pub fn consume_flag(&mut self, key: &str) -> Result<Option<bool>, SettingsError> {
        match self.consume(key) {
            None => Ok(None),
            Some(SettingValue::Flag(value)) => Ok(Some(value)),
            Some(other) => Err(mismatch(key, "flag", &other)),
        }
    }

    /// Removes `key` and returns its integer value.
    pub fn consume_integer(&mut self, key: &str) -> Result<Option<u64>, SettingsError> {
        match self.consume(key) {
            None => Ok(None),
            Some(SettingValue::Integer(value)) => Ok(Some(value)),
            Some(other) => Err(mismatch(key, "integer", &other)),
        }
    }
}

fn mismatch(key: &str, expected: &'static str, found: &SettingValue) -> SettingsError {
    SettingsError::KindMismatch {
        key: key.to_owned(),
        expected,
        found: found.kind(),
    }
}
