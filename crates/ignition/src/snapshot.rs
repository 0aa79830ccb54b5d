//! Persisted schema snapshots (the schema cache dump).
//!
//! A snapshot records every table's columns together with the schema version
//! it was taken at. Loading one at boot avoids live introspection, but only
//! when it still matches the live schema: [`validate`] discards snapshots the
//! version oracle disagrees with, or cannot vouch for.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::data_access::{ColumnSet, ConnectionPool, DataAccessError};
use crate::health::HealthReporter;
use crate::oracle::{VersionOracle, VersionToken};
use crate::pool::ManagedPool;
use ignition_config::PRIMARY_IDENTITY;

const DUMP_SUFFIX: &str = "schema_cache.json";

/// Versioned copy of every table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    config_identity: String,
    version: VersionToken,
    columns_by_entity: BTreeMap<String, ColumnSet>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl SchemaSnapshot {
    /// Builds a snapshot from already collected columns.
    #[must_use]
    pub fn new(
        config_identity: impl Into<String>,
        version: impl Into<VersionToken>,
        columns_by_entity: BTreeMap<String, ColumnSet>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            config_identity: config_identity.into(),
            version: version.into(),
            columns_by_entity,
            created_at,
        }
    }

    /// Introspects `tables` through `pool` and records them at `version`.
    pub fn capture<'a>(
        config_identity: impl Into<String>,
        version: impl Into<VersionToken>,
        pool: &dyn ConnectionPool,
        tables: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DataAccessError> {
        let columns_by_entity = tables
            .into_iter()
            .map(|table| Ok((table.to_owned(), pool.introspect(table)?)))
            .collect::<Result<BTreeMap<_, _>, DataAccessError>>()?;
        Ok(Self::new(
            config_identity,
            version,
            columns_by_entity,
            OffsetDateTime::now_utc(),
        ))
    }

    /// Identity of the connection configuration the snapshot belongs to.
    #[must_use]
    pub fn config_identity(&self) -> &str {
        self.config_identity.as_str()
    }

    /// Schema version the snapshot was taken at.
    #[must_use]
    pub const fn version(&self) -> &VersionToken {
        &self.version
    }

    /// When the snapshot was taken.
    #[must_use]
    pub const fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// Columns recorded for `table`.
    #[must_use]
    pub fn columns(&self, table: &str) -> Option<&ColumnSet> {
        self.columns_by_entity.get(table)
    }

    /// Tables recorded in the snapshot, in name order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.columns_by_entity.keys().map(String::as_str)
    }
}

/// Errors raised while reading or writing snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file exists but could not be read.
    #[error("failed to read schema cache '{path}': {source}")]
    Read {
        /// Snapshot path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The file's content is not a snapshot.
    #[error("failed to parse schema cache '{path}': {source}")]
    Parse {
        /// Snapshot path.
        path: Utf8PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// Encoding the snapshot failed.
    #[error("failed to encode schema cache: {source}")]
    Encode {
        /// Underlying encode error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the file failed.
    #[error("failed to write schema cache '{path}': {source}")]
    Write {
        /// Snapshot path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl SnapshotError {
    /// Short, stable name of the error used in log records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Read { .. } => "SnapshotReadError",
            Self::Parse { .. } => "SnapshotParseError",
            Self::Encode { .. } => "SnapshotEncodeError",
            Self::Write { .. } => "SnapshotWriteError",
        }
    }
}

/// Derives the dump path for `config_identity`.
///
/// The primary configuration uses `schema_cache.json`; any other identity is
/// prefixed, e.g. `replica_schema_cache.json`. The file lives in
/// `override_dir` when given, otherwise in `default_dir`.
#[must_use]
pub fn cache_dump_filename(
    config_identity: &str,
    override_dir: Option<&Utf8Path>,
    default_dir: &Utf8Path,
) -> Utf8PathBuf {
    let filename = if config_identity == PRIMARY_IDENTITY {
        DUMP_SUFFIX.to_owned()
    } else {
        format!("{config_identity}_{DUMP_SUFFIX}")
    };
    override_dir.unwrap_or(default_dir).join(filename)
}

/// Reads the snapshot stored at `path`.
///
/// A missing file is not an error and yields `Ok(None)`.
pub fn load(path: &Utf8Path) -> Result<Option<SchemaSnapshot>, SnapshotError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(target: "ignition::snapshot", path = %path, "no schema cache dump");
            return Ok(None);
        }
        Err(source) => {
            return Err(SnapshotError::Read {
                path: path.to_owned(),
                source,
            });
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| SnapshotError::Parse {
            path: path.to_owned(),
            source,
        })
}

/// Writes `snapshot` to `path`, creating parent directories.
///
/// The file is written next to its destination and renamed into place so
/// readers never observe a partial dump.
pub fn dump(snapshot: &SchemaSnapshot, path: &Utf8Path) -> Result<(), SnapshotError> {
    let encoded =
        serde_json::to_string_pretty(snapshot).map_err(|source| SnapshotError::Encode { source })?;
    let write_error = |source| SnapshotError::Write {
        path: path.to_owned(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, encoded).map_err(write_error)?;
    fs::rename(&staging, path).map_err(write_error)
}

/// Decides whether `snapshot` may be installed.
///
/// With `check_enabled` unset the snapshot is trusted as-is. Otherwise the
/// oracle must report exactly the snapshot's version; an oracle failure is
/// treated like staleness. Rejections are reported, never raised.
#[must_use]
pub fn validate(
    snapshot: SchemaSnapshot,
    oracle: &dyn VersionOracle,
    check_enabled: bool,
    reporter: &dyn HealthReporter,
) -> Option<SchemaSnapshot> {
    if !check_enabled {
        reporter.snapshot_trusted(snapshot.config_identity(), snapshot.version());
        return Some(snapshot);
    }

    let current = match oracle.current() {
        Ok(current) => current,
        Err(error) => {
            reporter.snapshot_unverifiable(snapshot.config_identity(), &error);
            return None;
        }
    };

    if snapshot.version() != &current {
        reporter.snapshot_stale(snapshot.config_identity(), snapshot.version(), &current);
        return None;
    }
    Some(snapshot)
}

/// Installs `snapshot` as `pool`'s metadata cache.
pub fn install(snapshot: SchemaSnapshot, pool: &ManagedPool) -> Arc<SchemaSnapshot> {
    let snapshot = Arc::new(snapshot);
    pool.install_schema_cache(Arc::clone(&snapshot));
    snapshot
}
