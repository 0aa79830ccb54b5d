//! The activated data-access subsystem handed to lazy hooks.

use std::sync::{Arc, OnceLock};

use crate::attributes::EntityDescriptor;
use crate::pool::ManagedPool;

/// Name under which the data-access subsystem's hooks are registered.
pub const DATA_ACCESS: &str = "data_access";

/// Instance passed to data-access hooks on activation.
#[derive(Debug)]
pub struct DataLayer {
    pool: Arc<ManagedPool>,
    entities: Vec<Arc<EntityDescriptor>>,
    fetch_threshold: OnceLock<u64>,
}

impl DataLayer {
    /// Builds a layer around the primary pool with no entities.
    #[must_use]
    pub const fn new(pool: Arc<ManagedPool>) -> Self {
        Self {
            pool,
            entities: Vec::new(),
            fetch_threshold: OnceLock::new(),
        }
    }

    /// Adds an entity stored in `table_name` behind the primary pool.
    #[must_use]
    pub fn with_entity(self, name: impl Into<String>, table_name: impl Into<String>) -> Self {
        let descriptor = EntityDescriptor::new(name, table_name, Arc::clone(&self.pool));
        self.with_descriptor(Arc::new(descriptor))
    }

    /// Adds an entity that may live behind another pool.
    #[must_use]
    pub fn with_descriptor(mut self, descriptor: Arc<EntityDescriptor>) -> Self {
        self.entities.push(descriptor);
        self
    }

    /// Primary pool.
    #[must_use]
    pub fn pool(&self) -> &ManagedPool {
        &self.pool
    }

    /// Every loaded entity, in registration order.
    #[must_use]
    pub fn entities(&self) -> &[Arc<EntityDescriptor>] {
        &self.entities
    }

    /// Looks up an entity by name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.entities.iter().find(|entity| entity.name() == name)
    }

    /// Sets the record-count threshold above which fetches are reported.
    ///
    /// Returns `false` when a threshold was already set.
    pub fn set_fetch_threshold(&self, threshold: u64) -> bool {
        self.fetch_threshold.set(threshold).is_ok()
    }

    /// Configured fetch threshold, if any.
    #[must_use]
    pub fn fetch_threshold(&self) -> Option<u64> {
        self.fetch_threshold.get().copied()
    }

    /// Returns `true` when fetching `records` rows should be reported.
    ///
    /// Hosts call this after materialising a result set.
    #[must_use]
    pub fn exceeds_fetch_threshold(&self, records: u64) -> bool {
        self.fetch_threshold()
            .is_some_and(|threshold| records > threshold)
    }
}
