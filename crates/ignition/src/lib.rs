//! Boot orchestration for a host application's data-access subsystem.
//!
//! Startup is split into named initialisation steps grouped by phase
//! ([`Phase::BeforeBoot`], [`Phase::DuringBoot`], [`Phase::AfterBoot`]). The
//! host triggers each phase once, in order, through a [`BootSequence`]. Steps
//! marked [`FailurePolicy::BestEffort`] can fail without aborting boot: their
//! error is reported through the [`HealthReporter`] and the next step runs.
//!
//! Configuration aimed at subsystems that have not been loaded yet is queued
//! in [`LazyHooks`] and applied when the host activates the subsystem. The
//! standard data-access steps use this to load a persisted
//! [`SchemaSnapshot`] after boot, validated against a [`VersionOracle`] and
//! silently discarded when stale, to eagerly define attribute accessors from
//! metadata already at hand, and to hand back every connection opened while
//! booting.
//!
//! The data-access library itself is a collaborator: hosts implement
//! [`ConnectionPool`] and the orchestrator only drives it.

mod attributes;
mod bootstrap;
mod connection;
mod data_access;
mod health;
mod hooks;
mod layer;
mod oracle;
mod pool;
mod scheduler;
mod snapshot;
pub mod steps;
pub mod telemetry;

pub use attributes::{
    AttributeAccessor, DefinitionReport, EntityDescriptor, MetadataSource,
    define_attribute_methods,
};
pub use bootstrap::{
    BootSequence, BootState, BootstrapError, Bootstrapped, ConfigLoader, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with,
};
pub use connection::{
    ConnectionError, connection_config, establish, release_boot_connections, validate_settings,
};
pub use data_access::{
    ColumnMetadata, ColumnSet, ConnectionConfig, ConnectionPool, DataAccessError,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use hooks::{LazyHooks, LoadHook};
pub use layer::{DATA_ACCESS, DataLayer};
pub use oracle::{OracleError, PoolVersionOracle, StaticVersionOracle, VersionOracle, VersionToken};
pub use pool::ManagedPool;
pub use scheduler::{
    FailurePolicy, InitStep, Phase, Registrar, Scheduler, SchedulerError, StepAction, StepError,
    StepOutcome, contain,
};
pub use snapshot::{SchemaSnapshot, SnapshotError, cache_dump_filename, dump, install, load, validate};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
