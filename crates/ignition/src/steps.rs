//! Standard data-access initialisation steps.
//!
//! Steps that touch the data layer after boot only wire a lazy hook, so
//! nothing runs before the host has activated the subsystem. The after-boot
//! steps are registered from during-boot steps, which keeps them in the order
//! the concerns were declared: schema cache first, then eager attribute
//! definition, then connection release.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ignition_config::keys;

use crate::attributes;
use crate::bootstrap::BootState;
use crate::connection;
use crate::health::HealthReporter;
use crate::layer::{DATA_ACCESS, DataLayer};
use crate::oracle::VersionOracle;
use crate::pool::ManagedPool;
use crate::scheduler::{FailurePolicy, InitStep, Phase, Registrar, StepError, contain};
use crate::snapshot;

/// Checks the primary connection settings before anything else boots.
pub const RESOLVE_CONNECTION: &str = "data_access.resolve_connection";
/// Opens the primary connection.
pub const INITIALIZE_DATABASE: &str = "data_access.initialize_database";
/// Applies the fetch warning threshold to the data layer.
pub const WARN_ON_FETCH_THRESHOLD: &str = "data_access.warn_on_fetch_threshold";
/// Decides whether the schema cache dump is loaded.
pub const CHECK_SCHEMA_CACHE_DUMP: &str = "data_access.check_schema_cache_dump";
/// Loads, validates and installs the schema cache dump.
pub const LOAD_SCHEMA_CACHE: &str = "data_access.load_schema_cache";
/// Decides whether attribute accessors are defined eagerly.
pub const DEFINE_ATTRIBUTE_METHODS: &str = "data_access.define_attribute_methods";
/// Defines attribute accessors for every loaded entity.
pub const EAGER_DEFINE_ATTRIBUTES: &str = "data_access.eager_define_attributes";
/// Wires the release of boot-time connections.
pub const CLEAR_ACTIVE_CONNECTIONS: &str = "data_access.clear_active_connections";
/// Returns boot-time connections and flushes idle ones.
pub const RELEASE_BOOT_CONNECTIONS: &str = "data_access.release_boot_connections";

/// The data-access steps every boot sequence starts with.
#[must_use]
pub fn standard_steps() -> Vec<InitStep<BootState>> {
    vec![
        InitStep::new(
            RESOLVE_CONNECTION,
            Phase::BeforeBoot,
            FailurePolicy::Critical,
            resolve_connection,
        ),
        InitStep::new(
            INITIALIZE_DATABASE,
            Phase::DuringBoot,
            FailurePolicy::Critical,
            initialize_database,
        ),
        InitStep::new(
            WARN_ON_FETCH_THRESHOLD,
            Phase::DuringBoot,
            FailurePolicy::BestEffort,
            warn_on_fetch_threshold,
        ),
        InitStep::new(
            CHECK_SCHEMA_CACHE_DUMP,
            Phase::DuringBoot,
            FailurePolicy::BestEffort,
            check_schema_cache_dump,
        ),
        InitStep::new(
            DEFINE_ATTRIBUTE_METHODS,
            Phase::DuringBoot,
            FailurePolicy::BestEffort,
            define_attribute_methods,
        ),
        InitStep::new(
            CLEAR_ACTIVE_CONNECTIONS,
            Phase::DuringBoot,
            FailurePolicy::BestEffort,
            clear_active_connections,
        ),
    ]
}

fn resolve_connection(state: &mut BootState, _: &mut Registrar<BootState>) -> Result<(), StepError> {
    connection::validate_settings(state.settings().connection())?;
    Ok(())
}

fn initialize_database(state: &mut BootState, _: &mut Registrar<BootState>) -> Result<(), StepError> {
    connection::establish(state.settings().connection(), state.pool())?;
    Ok(())
}

fn warn_on_fetch_threshold(
    state: &mut BootState,
    _: &mut Registrar<BootState>,
) -> Result<(), StepError> {
    let Some(threshold) = state
        .settings_mut()
        .consume_integer(keys::WARN_ON_FETCH_THRESHOLD)?
    else {
        return Ok(());
    };
    state
        .hooks_mut()
        .on_load(DATA_ACCESS, move |layer: &Arc<DataLayer>| {
            if !layer.set_fetch_threshold(threshold) {
                tracing::debug!(
                    target: "ignition::steps",
                    threshold,
                    "fetch threshold already set"
                );
            }
        });
    Ok(())
}

fn check_schema_cache_dump(
    state: &mut BootState,
    registrar: &mut Registrar<BootState>,
) -> Result<(), StepError> {
    let settings = state.settings_mut();
    let enabled = settings.consume_flag(keys::USE_SNAPSHOT_DUMP)?.unwrap_or(false);
    let check_version = settings
        .consume_flag(keys::CHECK_SNAPSHOT_VERSION)?
        .unwrap_or(true);
    if !enabled {
        return Ok(());
    }

    let path = schema_cache_path(state);
    registrar.register(InitStep::new(
        LOAD_SCHEMA_CACHE,
        Phase::AfterBoot,
        FailurePolicy::BestEffort,
        move |state: &mut BootState, _: &mut Registrar<BootState>| {
            let path = path.clone();
            let oracle = Arc::clone(state.oracle());
            let reporter = Arc::clone(state.reporter());
            state
                .hooks_mut()
                .on_load(DATA_ACCESS, move |layer: &Arc<DataLayer>| {
                    load_schema_cache(
                        &path,
                        layer.pool(),
                        oracle.as_ref(),
                        check_version,
                        reporter.as_ref(),
                    );
                });
            Ok(())
        },
    ));
    Ok(())
}

/// Installs the dump at `path` on `pool` when it is present and current.
///
/// Absence is silent. Unreadable dumps are reported as contained failures.
fn load_schema_cache(
    path: &Utf8Path,
    pool: &ManagedPool,
    oracle: &dyn VersionOracle,
    check_version: bool,
    reporter: &dyn HealthReporter,
) {
    let loaded = match snapshot::load(path) {
        Ok(Some(loaded)) => loaded,
        Ok(None) => return,
        Err(error) => {
            contain(reporter, LOAD_SCHEMA_CACHE, Err(error.into()));
            return;
        }
    };
    if let Some(current) = snapshot::validate(loaded, oracle, check_version, reporter) {
        let installed = snapshot::install(current, pool);
        reporter.snapshot_installed(path, installed.version());
    }
}

fn define_attribute_methods(
    state: &mut BootState,
    registrar: &mut Registrar<BootState>,
) -> Result<(), StepError> {
    if state.settings_mut().consume_flag(keys::EAGER_LOAD)? != Some(true) {
        return Ok(());
    }
    registrar.register(InitStep::new(
        EAGER_DEFINE_ATTRIBUTES,
        Phase::AfterBoot,
        FailurePolicy::BestEffort,
        |state: &mut BootState, _: &mut Registrar<BootState>| {
            let reporter = Arc::clone(state.reporter());
            state
                .hooks_mut()
                .on_load(DATA_ACCESS, move |layer: &Arc<DataLayer>| {
                    attributes::define_attribute_methods(layer.entities(), reporter.as_ref());
                });
            Ok(())
        },
    ));
    Ok(())
}

fn clear_active_connections(
    _: &mut BootState,
    registrar: &mut Registrar<BootState>,
) -> Result<(), StepError> {
    registrar.register(InitStep::new(
        RELEASE_BOOT_CONNECTIONS,
        Phase::AfterBoot,
        FailurePolicy::BestEffort,
        |state: &mut BootState, _: &mut Registrar<BootState>| {
            let reporter = Arc::clone(state.reporter());
            state
                .hooks_mut()
                .on_load(DATA_ACCESS, move |layer: &Arc<DataLayer>| {
                    let released = connection::release_boot_connections(layer.pool())
                        .map_err(StepError::from);
                    if contain(reporter.as_ref(), RELEASE_BOOT_CONNECTIONS, released) {
                        reporter.connections_released(layer.pool().identity());
                    }
                });
            Ok(())
        },
    ));
    Ok(())
}

/// Path of the schema cache dump the boot sequence would load.
#[must_use]
pub fn schema_cache_path(state: &BootState) -> Utf8PathBuf {
    let settings = state.settings();
    snapshot::cache_dump_filename(
        &settings.connection().identity,
        settings.schema_cache_path(),
        settings.schema_cache_dir(),
    )
}
