//! Contract with the data-access library configured during boot.
//!
//! The orchestrator never talks to a database itself. It drives an
//! implementation of [`ConnectionPool`] supplied by the host and only relies
//! on the operations listed here.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::oracle::VersionToken;

/// Structural metadata for one table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Column name as reported by the backing store.
    pub name: String,
    /// Backend type name, e.g. `integer` or `varchar(255)`.
    pub sql_type: String,
    /// Whether the column accepts `NULL`.
    #[serde(default)]
    pub nullable: bool,
    /// Literal default expression, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl ColumnMetadata {
    /// Builds a non-nullable column without a default.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: false,
            default: None,
        }
    }

    /// Marks the column as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the column's default expression.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Ordered columns of one table.
pub type ColumnSet = Vec<ColumnMetadata>;

/// Key/value configuration handed to [`ConnectionPool::establish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionConfig(BTreeMap<String, String>);

impl ConnectionConfig {
    /// Inserts or replaces a configuration entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Errors reported by the data-access layer.
#[derive(Debug, Error)]
pub enum DataAccessError {
    /// The backing store refused the connection.
    #[error("connection refused: {message}")]
    ConnectionRefused {
        /// Detail reported by the adapter.
        message: String,
    },
    /// The adapter's own timeout elapsed.
    #[error("operation timed out after {timeout:?}")]
    Timeout {
        /// Timeout that was exceeded.
        timeout: Duration,
    },
    /// The requested table does not exist.
    #[error("table '{table}' does not exist")]
    NoSuchTable {
        /// Table that was looked up.
        table: String,
    },
    /// A column name would shadow a reserved accessor.
    #[error("column '{attribute}' on {entity} conflicts with a reserved accessor")]
    DangerousAttribute {
        /// Entity owning the column.
        entity: String,
        /// Offending column name.
        attribute: String,
    },
    /// Any other adapter failure.
    #[error("{message}")]
    Adapter {
        /// Human-readable description.
        message: String,
        /// Underlying adapter error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DataAccessError {
    /// Short, stable name of the error variant used in log records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionRefused { .. } => "ConnectionRefused",
            Self::Timeout { .. } => "Timeout",
            Self::NoSuchTable { .. } => "NoSuchTable",
            Self::DangerousAttribute { .. } => "DangerousAttribute",
            Self::Adapter { .. } => "AdapterError",
        }
    }

    /// Builds a [`Self::ConnectionRefused`] error.
    #[must_use]
    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::ConnectionRefused {
            message: message.into(),
        }
    }

    /// Builds a [`Self::Adapter`] error without a source.
    #[must_use]
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
            source: None,
        }
    }
}

/// Connection pool exposed by the data-access library.
///
/// Implementations own their connections. The orchestrator calls these
/// methods only at the boot milestones described in [`crate::connection`].
pub trait ConnectionPool: Send + Sync {
    /// Opens the pool's primary connection.
    fn establish(&self, config: &ConnectionConfig) -> Result<(), DataAccessError>;

    /// Closes every connection and forgets the configuration.
    fn disconnect(&self) -> Result<(), DataAccessError>;

    /// Returns `true` when a connection has been established.
    fn is_connected(&self) -> bool;

    /// Returns connections checked out by the current thread to the pool.
    fn clear_active(&self) -> Result<(), DataAccessError>;

    /// Closes and discards idle pooled connections.
    fn flush_idle(&self) -> Result<(), DataAccessError>;

    /// Queries the backing store for a table's columns.
    fn introspect(&self, table: &str) -> Result<ColumnSet, DataAccessError>;

    /// Returns columns the live connection already cached, without querying.
    fn cached_columns(&self, table: &str) -> Result<Option<ColumnSet>, DataAccessError>;

    /// Returns the latest applied schema version.
    fn current_version(&self) -> Result<VersionToken, DataAccessError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DataAccessError::connection_refused("port 5432"), "ConnectionRefused")]
    #[case(DataAccessError::Timeout { timeout: Duration::from_secs(5) }, "Timeout")]
    #[case(DataAccessError::NoSuchTable { table: "users".to_owned() }, "NoSuchTable")]
    #[case(DataAccessError::adapter("socket closed"), "AdapterError")]
    fn kinds_name_the_variant(#[case] error: DataAccessError, #[case] kind: &str) {
        assert_eq!(error.kind(), kind);
    }

    #[rstest]
    fn connection_config_iterates_in_key_order() {
        let mut config = ConnectionConfig::default();
        config.insert("url", "sqlite://db/test.sqlite3");
        config.insert("pool", "5");

        let keys: Vec<&str> = config.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, ["pool", "url"]);
        assert_eq!(config.get("pool"), Some("5"));
    }
}
