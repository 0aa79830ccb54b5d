//! BDD test world: encapsulates the loader, reporter, fake pool and boot outcome for step functions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use ignition_config::PRIMARY_IDENTITY;
use time::OffsetDateTime;

use crate::bootstrap::{BootState, BootstrapError, bootstrap_with};
use crate::data_access::DataAccessError;
use crate::layer::DataLayer;
use crate::scheduler::{FailurePolicy, InitStep, Phase, Registrar, SchedulerError, StepError};
use crate::snapshot::{self, SchemaSnapshot};

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::pool::{FakePool, users_columns};
use super::reporter::RecordingHealthReporter;

type HostStep = (String, Option<DataAccessError>);

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: TestConfigLoader,
    failing_loader: bool,
    pub reporter: Arc<RecordingHealthReporter>,
    pub pool: Arc<FakePool>,
    host_steps: Vec<HostStep>,
    bootstrap_error: Option<BootstrapError>,
    boot_result: Option<Result<Arc<DataLayer>, SchedulerError>>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            failing_loader: false,
            reporter: Arc::new(RecordingHealthReporter::default()),
            pool: Arc::new(FakePool::disconnected()),
            host_steps: Vec::new(),
            bootstrap_error: None,
            boot_result: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.failing_loader = true;
    }

    /// Enables eager attribute definition.
    pub fn enable_eager_load(&mut self) {
        self.loader.configure(|config| config.eager_load = Some(true));
    }

    /// Writes a schema cache dump for the `users` table taken at `version`.
    pub fn write_dump(&self, version: &str) {
        write_users_dump(self.loader.cache_dir(), version);
    }

    /// Registers a best-effort during-boot host step.
    ///
    /// The step fails with `failure` when one is given.
    pub fn add_host_step(&mut self, name: &str, failure: Option<DataAccessError>) {
        self.host_steps.push((name.to_owned(), failure));
    }

    /// Prepares the sequence and boots it with a `User` entity loaded.
    pub fn boot(&mut self) {
        if self.bootstrap_error.is_some() || self.boot_result.is_some() {
            return;
        }
        let outcome = if self.failing_loader {
            bootstrap_with(&FailingConfigLoader, self.reporter.clone(), self.pool.clone())
        } else {
            bootstrap_with(&self.loader, self.reporter.clone(), self.pool.clone())
        };
        let mut bootstrapped = match outcome {
            Ok(bootstrapped) => bootstrapped,
            Err(error) => {
                self.bootstrap_error = Some(error);
                return;
            }
        };

        let sequence = bootstrapped.sequence();
        for (name, failure) in self.host_steps.drain(..) {
            let mut failure = failure;
            let step = InitStep::new(
                name,
                Phase::DuringBoot,
                FailurePolicy::BestEffort,
                move |_: &mut BootState, _: &mut Registrar<BootState>| {
                    failure.take().map_or(Ok(()), |error| Err(StepError::from(error)))
                },
            );
            sequence.register(step).expect("host step names are unique");
        }
        let layer = sequence.data_layer().with_entity("User", "users");
        self.boot_result = Some(sequence.boot(layer));
    }

    /// Returns the error raised while preparing the sequence.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns the result of running every phase.
    #[must_use]
    pub fn boot_result(&self) -> Option<&Result<Arc<DataLayer>, SchedulerError>> {
        self.boot_result.as_ref()
    }

    /// Returns the activated data layer after a successful boot.
    #[must_use]
    pub fn layer(&self) -> Option<&Arc<DataLayer>> {
        self.boot_result.as_ref().and_then(|result| result.as_ref().ok())
    }
}

/// Writes a primary schema cache dump for the `users` table into `dir`.
pub fn write_users_dump(dir: &Utf8Path, version: &str) -> Utf8PathBuf {
    let mut columns = BTreeMap::new();
    columns.insert("users".to_owned(), users_columns());
    let dump = SchemaSnapshot::new(PRIMARY_IDENTITY, version, columns, OffsetDateTime::now_utc());
    let path = snapshot::cache_dump_filename(PRIMARY_IDENTITY, None, dir);
    snapshot::dump(&dump, &path).expect("failed to write schema cache dump");
    path
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
