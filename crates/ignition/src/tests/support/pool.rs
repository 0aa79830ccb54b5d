//! In-memory [`ConnectionPool`] that records calls and supports injected failures.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::data_access::{
    ColumnMetadata, ColumnSet, ConnectionConfig, ConnectionPool, DataAccessError,
};
use crate::oracle::VersionToken;

/// Operations observed by [`FakePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolCall {
    Establish,
    Disconnect,
    ClearActive,
    FlushIdle,
    Introspect,
    CachedColumns,
    CurrentVersion,
}

#[derive(Default)]
struct PoolState {
    connected: bool,
    calls: Vec<PoolCall>,
    tables: HashMap<String, ColumnSet>,
    cached: HashMap<String, ColumnSet>,
    version: Option<VersionToken>,
    last_config: Option<ConnectionConfig>,
    establish_failure: Option<DataAccessError>,
    clear_active_failure: Option<DataAccessError>,
    flush_idle_failure: Option<DataAccessError>,
    cached_failure: Option<DataAccessError>,
}

/// Pool double shared between the code under test and assertions.
#[derive(Default)]
pub struct FakePool {
    state: Mutex<PoolState>,
}

impl FakePool {
    /// A pool that already holds a live connection.
    #[must_use]
    pub fn connected() -> Self {
        let pool = Self::default();
        pool.state().connected = true;
        pool
    }

    /// A pool that has never connected.
    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Makes `columns` available from the live connection's cache and by
    /// introspection.
    pub fn cache_columns(&self, table: &str, columns: ColumnSet) {
        let mut state = self.state();
        state.tables.insert(table.to_owned(), columns.clone());
        state.cached.insert(table.to_owned(), columns);
    }

    /// Makes `columns` available only by introspection.
    pub fn add_table(&self, table: &str, columns: ColumnSet) {
        self.state().tables.insert(table.to_owned(), columns);
    }

    /// Sets the version reported by [`ConnectionPool::current_version`].
    pub fn set_version(&self, version: &str) {
        self.state().version = Some(VersionToken::from(version));
    }

    pub fn fail_establish(&self, error: DataAccessError) {
        self.state().establish_failure = Some(error);
    }

    pub fn fail_clear_active(&self, error: DataAccessError) {
        self.state().clear_active_failure = Some(error);
    }

    pub fn fail_flush_idle(&self, error: DataAccessError) {
        self.state().flush_idle_failure = Some(error);
    }

    /// Makes every cached-column lookup fail with `error`.
    pub fn fail_cached_lookups(&self, error: DataAccessError) {
        self.state().cached_failure = Some(error);
    }

    /// Every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PoolCall> {
        self.state().calls.clone()
    }

    #[must_use]
    pub fn connect_attempts(&self) -> usize {
        self.count(PoolCall::Establish)
    }

    #[must_use]
    pub fn introspections(&self) -> usize {
        self.count(PoolCall::Introspect)
    }

    #[must_use]
    pub fn cached_lookups(&self) -> usize {
        self.count(PoolCall::CachedColumns)
    }

    /// Configuration passed to the last successful establish call.
    #[must_use]
    pub fn last_config(&self) -> Option<ConnectionConfig> {
        self.state().last_config.clone()
    }

    fn count(&self, call: PoolCall) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|recorded| **recorded == call)
            .count()
    }

    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().expect("fake pool mutex poisoned")
    }

    fn record(&self, call: PoolCall) -> MutexGuard<'_, PoolState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

/// Rebuilds an injected failure so it can be returned more than once.
fn replay(failure: Option<&DataAccessError>) -> Result<(), DataAccessError> {
    let Some(failure) = failure else {
        return Ok(());
    };
    Err(match failure {
        DataAccessError::ConnectionRefused { message } => {
            DataAccessError::connection_refused(message.clone())
        }
        DataAccessError::Timeout { timeout } => DataAccessError::Timeout { timeout: *timeout },
        DataAccessError::NoSuchTable { table } => DataAccessError::NoSuchTable {
            table: table.clone(),
        },
        DataAccessError::DangerousAttribute { entity, attribute } => {
            DataAccessError::DangerousAttribute {
                entity: entity.clone(),
                attribute: attribute.clone(),
            }
        }
        DataAccessError::Adapter { message, .. } => DataAccessError::adapter(message.clone()),
    })
}

impl ConnectionPool for FakePool {
    fn establish(&self, config: &ConnectionConfig) -> Result<(), DataAccessError> {
        let mut state = self.record(PoolCall::Establish);
        replay(state.establish_failure.as_ref())?;
        state.connected = true;
        state.last_config = Some(config.clone());
        Ok(())
    }

    fn disconnect(&self) -> Result<(), DataAccessError> {
        self.record(PoolCall::Disconnect).connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn clear_active(&self) -> Result<(), DataAccessError> {
        let state = self.record(PoolCall::ClearActive);
        replay(state.clear_active_failure.as_ref())
    }

    fn flush_idle(&self) -> Result<(), DataAccessError> {
        let state = self.record(PoolCall::FlushIdle);
        replay(state.flush_idle_failure.as_ref())
    }

    fn introspect(&self, table: &str) -> Result<ColumnSet, DataAccessError> {
        let state = self.record(PoolCall::Introspect);
        state
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| DataAccessError::NoSuchTable {
                table: table.to_owned(),
            })
    }

    fn cached_columns(&self, table: &str) -> Result<Option<ColumnSet>, DataAccessError> {
        let state = self.record(PoolCall::CachedColumns);
        replay(state.cached_failure.as_ref())?;
        Ok(state.cached.get(table).cloned())
    }

    fn current_version(&self) -> Result<VersionToken, DataAccessError> {
        let state = self.record(PoolCall::CurrentVersion);
        state
            .version
            .clone()
            .ok_or_else(|| DataAccessError::connection_refused("no schema version recorded"))
    }
}

/// Columns of the `users` table used across suites.
#[must_use]
pub fn users_columns() -> ColumnSet {
    vec![
        ColumnMetadata::new("id", "integer"),
        ColumnMetadata::new("email", "varchar(255)").nullable(),
        ColumnMetadata::new("created_at", "timestamp").with_default("CURRENT_TIMESTAMP"),
    ]
}
