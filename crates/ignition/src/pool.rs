//! Pool handle that carries the installed schema snapshot.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::data_access::{ColumnSet, ConnectionPool, DataAccessError};
use crate::snapshot::SchemaSnapshot;

/// A host connection pool plus the schema snapshot installed on it.
///
/// The pool outlives boot and is shared with request threads, so the
/// snapshot slot is guarded by a lock.
pub struct ManagedPool {
    identity: String,
    connection: Arc<dyn ConnectionPool>,
    schema_cache: RwLock<Option<Arc<SchemaSnapshot>>>,
}

impl ManagedPool {
    /// Wraps `connection` under the given configuration identity.
    #[must_use]
    pub fn new(identity: impl Into<String>, connection: Arc<dyn ConnectionPool>) -> Self {
        Self {
            identity: identity.into(),
            connection,
            schema_cache: RwLock::new(None),
        }
    }

    /// Configuration identity of this pool.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.identity.as_str()
    }

    /// The underlying data-access pool.
    #[must_use]
    pub fn connection(&self) -> &dyn ConnectionPool {
        self.connection.as_ref()
    }

    /// Returns `true` when the underlying pool holds a live connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Makes `snapshot` the pool's active metadata cache.
    pub fn install_schema_cache(&self, snapshot: Arc<SchemaSnapshot>) {
        let mut slot = self
            .schema_cache
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(snapshot);
    }

    /// Returns the installed schema snapshot, if any.
    #[must_use]
    pub fn schema_cache(&self) -> Option<Arc<SchemaSnapshot>> {
        self.schema_cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Looks up a table's columns, preferring the installed snapshot over
    /// live introspection.
    pub fn columns(&self, table: &str) -> Result<ColumnSet, DataAccessError> {
        if let Some(columns) = self
            .schema_cache()
            .and_then(|snapshot| snapshot.columns(table).cloned())
        {
            return Ok(columns);
        }
        self.connection.introspect(table)
    }
}

impl fmt::Debug for ManagedPool {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ManagedPool")
            .field("identity", &self.identity)
            .field("connected", &self.is_connected())
            .field(
                "schema_cache",
                &self.schema_cache().map(|snapshot| snapshot.version().clone()),
            )
            .finish()
    }
}
