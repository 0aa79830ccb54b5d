//! Boot sequence orchestration.

use std::fmt;
use std::sync::Arc;

use ignition_config::{BootConfig, Settings};
use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use crate::data_access::ConnectionPool;
use crate::health::HealthReporter;
use crate::hooks::LazyHooks;
use crate::layer::{DATA_ACCESS, DataLayer};
use crate::oracle::{PoolVersionOracle, VersionOracle};
use crate::pool::ManagedPool;
use crate::scheduler::{InitStep, Phase, Scheduler, SchedulerError, StepOutcome};
use crate::steps;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the boot configuration.
    fn load(&self) -> Result<BootConfig, Arc<OrthoError>>;
}

/// Loader that delegates to [`BootConfig::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<BootConfig, Arc<OrthoError>> {
        BootConfig::load()
    }
}

/// Loader returning a configuration resolved elsewhere.
#[derive(Debug, Default, Clone)]
pub struct StaticConfigLoader {
    config: BootConfig,
}

impl StaticConfigLoader {
    /// Builds a loader that always returns `config`.
    #[must_use]
    pub const fn new(config: BootConfig) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<BootConfig, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced while preparing the boot sequence.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The standard steps could not be registered.
    #[error("failed to register initialisation steps: {source}")]
    Scheduler {
        /// Underlying scheduler error.
        #[source]
        source: SchedulerError,
    },
}

/// Context threaded through every initialisation step.
pub struct BootState {
    settings: Settings,
    hooks: LazyHooks<Arc<DataLayer>>,
    pool: Arc<ManagedPool>,
    oracle: Arc<dyn VersionOracle>,
    reporter: Arc<dyn HealthReporter>,
}

impl BootState {
    /// Builds a context around the primary pool.
    #[must_use]
    pub fn new(
        settings: Settings,
        pool: Arc<ManagedPool>,
        oracle: Arc<dyn VersionOracle>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            settings,
            hooks: LazyHooks::new(),
            pool,
            oracle,
            reporter,
        }
    }

    /// Boot settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Boot settings, for steps consuming one-shot values.
    pub const fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Lazy hooks keyed by subsystem.
    #[must_use]
    pub const fn hooks(&self) -> &LazyHooks<Arc<DataLayer>> {
        &self.hooks
    }

    /// Lazy hooks keyed by subsystem, for registering hooks.
    pub const fn hooks_mut(&mut self) -> &mut LazyHooks<Arc<DataLayer>> {
        &mut self.hooks
    }

    /// Primary pool.
    #[must_use]
    pub fn pool(&self) -> &ManagedPool {
        &self.pool
    }

    /// Schema version oracle.
    #[must_use]
    pub const fn oracle(&self) -> &Arc<dyn VersionOracle> {
        &self.oracle
    }

    /// Health reporter.
    #[must_use]
    pub const fn reporter(&self) -> &Arc<dyn HealthReporter> {
        &self.reporter
    }
}

impl fmt::Debug for BootState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BootState")
            .field("settings", &self.settings)
            .field("hooks", &self.hooks)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Phase-ordered boot sequence driven by the host.
///
/// The host triggers each phase once, in order, and activates the
/// data-access subsystem once it has loaded:
///
/// 1. [`Self::run`] with [`Phase::BeforeBoot`]
/// 2. [`Self::run`] with [`Phase::DuringBoot`]
/// 3. [`Self::activate_data_access`]
/// 4. [`Self::run`] with [`Phase::AfterBoot`]
///
/// [`Self::boot`] performs all four.
#[derive(Debug)]
pub struct BootSequence {
    scheduler: Scheduler<BootState>,
    state: BootState,
    next_phase: Option<Phase>,
}

impl BootSequence {
    /// Builds a sequence with the standard data-access steps registered.
    pub fn new(
        settings: Settings,
        pool: Arc<ManagedPool>,
        oracle: Arc<dyn VersionOracle>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, SchedulerError> {
        let mut scheduler = Scheduler::new(Arc::clone(&reporter));
        for step in steps::standard_steps() {
            scheduler.register(step)?;
        }
        Ok(Self {
            scheduler,
            state: BootState::new(settings, pool, oracle, reporter),
            next_phase: Some(Phase::BeforeBoot),
        })
    }

    /// Registers a host step after the standard ones.
    pub fn register(&mut self, step: InitStep<BootState>) -> Result<(), SchedulerError> {
        self.scheduler.register(step)
    }

    /// Runs `phase`.
    ///
    /// Phases run once each, in trigger order. A phase whose critical step
    /// failed counts as run; the sequence cannot be retried.
    pub fn run(&mut self, phase: Phase) -> Result<Vec<StepOutcome>, SchedulerError> {
        if self.next_phase != Some(phase) {
            return Err(SchedulerError::PhaseOutOfOrder {
                requested: phase,
                expected: self.next_phase,
            });
        }
        self.next_phase = phase.next();
        self.scheduler.run(phase, &mut self.state)
    }

    /// Activates the data-access subsystem with `layer`, draining its hooks.
    ///
    /// Returns the active layer; later calls keep the first one.
    pub fn activate_data_access(&mut self, layer: DataLayer) -> Arc<DataLayer> {
        if let Some(active) = self.state.hooks.instance(DATA_ACCESS) {
            return Arc::clone(active);
        }
        let pending = self.state.hooks.pending(DATA_ACCESS);
        let layer = Arc::new(layer);
        self.state.hooks.activate(DATA_ACCESS, Arc::clone(&layer));
        self.state.reporter.subsystem_activated(DATA_ACCESS, pending);
        layer
    }

    /// Runs every phase and activates `layer` between during- and after-boot.
    pub fn boot(&mut self, layer: DataLayer) -> Result<Arc<DataLayer>, SchedulerError> {
        self.run(Phase::BeforeBoot)?;
        self.run(Phase::DuringBoot)?;
        let layer = self.activate_data_access(layer);
        self.run(Phase::AfterBoot)?;
        Ok(layer)
    }

    /// A data layer over the sequence's primary pool, with no entities.
    #[must_use]
    pub fn data_layer(&self) -> DataLayer {
        DataLayer::new(Arc::clone(&self.state.pool))
    }

    /// Phase the host should trigger next; `None` once boot completed.
    #[must_use]
    pub const fn next_phase(&self) -> Option<Phase> {
        self.next_phase
    }

    /// Context shared by the steps.
    #[must_use]
    pub const fn state(&self) -> &BootState {
        &self.state
    }

    /// Mutable context, for hosts registering their own hooks.
    pub const fn state_mut(&mut self) -> &mut BootState {
        &mut self.state
    }

    /// Registered steps.
    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler<BootState> {
        &self.scheduler
    }
}

/// Result of a successful bootstrap invocation.
#[derive(Debug)]
pub struct Bootstrapped {
    config: BootConfig,
    sequence: BootSequence,
    telemetry: TelemetryHandle,
}

impl Bootstrapped {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &BootConfig {
        &self.config
    }

    /// The boot sequence, ready for the host's first trigger.
    pub const fn sequence(&mut self) -> &mut BootSequence {
        &mut self.sequence
    }

    /// Consumes the handle, returning the boot sequence.
    #[must_use]
    pub fn into_sequence(self) -> BootSequence {
        self.sequence
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub const fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Prepares a boot sequence using the supplied collaborators.
///
/// Loads configuration, installs telemetry, wraps `connection` as the
/// primary pool and registers the standard steps. No phase runs yet.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    connection: Arc<dyn ConnectionPool>,
) -> Result<Bootstrapped, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let settings = Settings::from_config(&config);
    let pool = Arc::new(ManagedPool::new(
        settings.connection().identity.clone(),
        connection,
    ));
    let oracle = Arc::new(PoolVersionOracle::new(Arc::clone(&pool)));
    let sequence = match BootSequence::new(settings, pool, oracle, Arc::clone(&reporter)) {
        Ok(sequence) => sequence,
        Err(source) => {
            let error = BootstrapError::Scheduler { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };
    reporter.bootstrap_succeeded(&config);

    Ok(Bootstrapped {
        config,
        sequence,
        telemetry,
    })
}
