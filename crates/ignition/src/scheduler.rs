//! Named, phase-tagged initialisation steps.
//!
//! The [`Scheduler`] owns an ordered list of [`InitStep`]s. Running a phase
//! executes every step registered for it, in registration order, one at a
//! time. Each step carries a [`FailurePolicy`]: a critical failure aborts the
//! phase and surfaces to the host unchanged, while a best-effort failure is
//! reported and the next step runs.
//!
//! Steps receive a [`Registrar`] so they can wire further steps conditionally.
//! Those are merged once the registering step returns and, when they belong
//! to the running phase, execute later in the same run.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::connection::ConnectionError;
use crate::data_access::DataAccessError;
use crate::health::HealthReporter;
use crate::oracle::OracleError;
use crate::snapshot::SnapshotError;
use ignition_config::SettingsError;

/// Boot phases, in the order the host triggers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Before the host framework boots.
    BeforeBoot,
    /// While the host boots and loads subsystems.
    DuringBoot,
    /// After the host finished booting.
    AfterBoot,
}

impl Phase {
    /// All phases in trigger order.
    pub const ALL: [Self; 3] = [Self::BeforeBoot, Self::DuringBoot, Self::AfterBoot];

    /// The phase triggered after this one.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::BeforeBoot => Some(Self::DuringBoot),
            Self::DuringBoot => Some(Self::AfterBoot),
            Self::AfterBoot => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BeforeBoot => "before-boot",
            Self::DuringBoot => "during-boot",
            Self::AfterBoot => "after-boot",
        };
        formatter.write_str(label)
    }
}

/// How a step's failure affects the rest of the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailurePolicy {
    /// Failure aborts the phase.
    Critical,
    /// Failure is reported and the phase continues.
    BestEffort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Critical => "critical",
            Self::BestEffort => "best-effort",
        })
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// Failure raised by a step action.
///
/// Carries a short kind label, used in log records, next to the underlying
/// error.
#[derive(Debug, Error)]
#[error("{kind}: {source}")]
pub struct StepError {
    kind: Cow<'static, str>,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl StepError {
    /// Wraps `source` under an explicit kind label.
    #[must_use]
    pub fn new(
        kind: impl Into<Cow<'static, str>>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
        }
    }

    /// Builds an error from a plain message.
    #[must_use]
    pub fn message_only(kind: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self::new(kind, Message(message.into()))
    }

    /// Short name of the failure, e.g. `ConnectionRefused`.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Message of the underlying error.
    #[must_use]
    pub fn message(&self) -> String {
        self.source.to_string()
    }
}

macro_rules! classified_step_errors {
    ($($error:ty),+ $(,)?) => {
        $(
            impl From<$error> for StepError {
                fn from(error: $error) -> Self {
                    Self::new(error.kind(), error)
                }
            }
        )+
    };
}

classified_step_errors!(DataAccessError, ConnectionError, OracleError, SnapshotError);

impl From<SettingsError> for StepError {
    fn from(error: SettingsError) -> Self {
        Self::new("SettingsError", error)
    }
}

/// Action executed by a step.
pub type StepAction<C> = Box<dyn FnMut(&mut C, &mut Registrar<C>) -> Result<(), StepError>>;

/// One named initialisation step.
pub struct InitStep<C> {
    name: String,
    phase: Phase,
    policy: FailurePolicy,
    action: StepAction<C>,
}

impl<C> InitStep<C> {
    /// Builds a step.
    pub fn new<F>(name: impl Into<String>, phase: Phase, policy: FailurePolicy, action: F) -> Self
    where
        F: FnMut(&mut C, &mut Registrar<C>) -> Result<(), StepError> + 'static,
    {
        Self {
            name: name.into(),
            phase,
            policy,
            action: Box::new(action),
        }
    }

    /// Unique step name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Phase the step runs in.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Failure policy of the step.
    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

impl<C> fmt::Debug for InitStep<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("InitStep")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Collects steps registered by a running step.
pub struct Registrar<C> {
    steps: Vec<InitStep<C>>,
}

impl<C> Registrar<C> {
    const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Queues `step` for registration once the current step returns.
    pub fn register(&mut self, step: InitStep<C>) {
        self.steps.push(step);
    }
}

/// Result of one executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Step name.
    pub name: String,
    /// Policy the step ran under.
    pub policy: FailurePolicy,
    /// `None` on success, otherwise the contained failure's description.
    pub failure: Option<String>,
}

impl StepOutcome {
    /// Returns `true` when the step failed and the failure was contained.
    #[must_use]
    pub const fn is_contained(&self) -> bool {
        self.failure.is_some()
    }
}

/// Errors escalated to the host.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Two steps share a name.
    #[error("initialisation step '{name}' is already registered")]
    DuplicateStep {
        /// Conflicting step name.
        name: String,
    },
    /// A critical step failed.
    #[error("critical step '{step}' failed: {source}")]
    CriticalStep {
        /// Name of the failing step.
        step: String,
        /// Failure reported by the step.
        #[source]
        source: StepError,
    },
    /// The host triggered a phase twice or out of order.
    #[error("boot phase {requested} triggered out of order (expected {})", expected_label(.expected))]
    PhaseOutOfOrder {
        /// Phase the host asked for.
        requested: Phase,
        /// Phase that should run next; `None` once every phase has run.
        expected: Option<Phase>,
    },
}

fn expected_label(expected: &Option<Phase>) -> String {
    expected.map_or_else(|| "no further phase".to_owned(), |phase| phase.to_string())
}

/// Ordered registry of initialisation steps.
pub struct Scheduler<C> {
    steps: Vec<InitStep<C>>,
    names: HashSet<String>,
    reporter: Arc<dyn HealthReporter>,
}

impl<C> Scheduler<C> {
    /// Builds an empty scheduler reporting through `reporter`.
    #[must_use]
    pub fn new(reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            steps: Vec::new(),
            names: HashSet::new(),
            reporter,
        }
    }

    /// Appends `step`; fails when its name is already taken.
    pub fn register(&mut self, step: InitStep<C>) -> Result<(), SchedulerError> {
        if !self.names.insert(step.name.clone()) {
            return Err(SchedulerError::DuplicateStep { name: step.name });
        }
        self.steps.push(step);
        Ok(())
    }

    /// Returns `true` when a step called `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Names of the steps registered for `phase`, in execution order.
    pub fn step_names(&self, phase: Phase) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(move |step| step.phase == phase)
            .map(InitStep::name)
    }

    /// Runs every step registered for `phase` against `context`.
    ///
    /// Returns the outcome of each executed step. A critical failure stops
    /// the run immediately; steps that already ran are not rolled back.
    ///
    /// Steps queued on the [`Registrar`] are merged only when their
    /// registering step succeeds. A queued name that is already taken fails
    /// the registering step under its own policy, and none of its queued
    /// steps are merged.
    pub fn run(&mut self, phase: Phase, context: &mut C) -> Result<Vec<StepOutcome>, SchedulerError> {
        self.reporter.phase_starting(phase);
        let mut outcomes = Vec::new();
        let mut index = 0;

        while let Some(step) = self.steps.get_mut(index) {
            index += 1;
            if step.phase != phase {
                continue;
            }

            let name = step.name.clone();
            let policy = step.policy;
            let mut registrar = Registrar::new();
            let result = (step.action)(context, &mut registrar).and_then(|()| {
                self.merge(registrar.steps)
                    .map_err(|error| StepError::new("DuplicateStep", error))
            });

            let failure = match result {
                Ok(()) => {
                    self.reporter.step_completed(phase, &name);
                    None
                }
                Err(source) if policy == FailurePolicy::Critical => {
                    self.reporter.step_aborted(&name, &source);
                    return Err(SchedulerError::CriticalStep { step: name, source });
                }
                Err(error) => {
                    self.reporter.step_contained(&name, &error);
                    Some(error.to_string())
                }
            };
            outcomes.push(StepOutcome {
                name,
                policy,
                failure,
            });
        }

        self.reporter.phase_completed(phase, &outcomes);
        Ok(outcomes)
    }
}

impl<C> Scheduler<C> {
    /// Registers all of `steps`, or none of them when any name is taken.
    fn merge(&mut self, steps: Vec<InitStep<C>>) -> Result<(), SchedulerError> {
        let clash = {
            let mut incoming = HashSet::new();
            steps
                .iter()
                .find(|step| self.names.contains(&step.name) || !incoming.insert(step.name.as_str()))
                .map(|step| step.name.clone())
        };
        if let Some(name) = clash {
            return Err(SchedulerError::DuplicateStep { name });
        }
        for step in steps {
            self.register(step)?;
        }
        Ok(())
    }
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Scheduler")
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}

/// Reports `result` as a contained best-effort failure.
///
/// Used by deferred hooks, which run outside any step's error channel.
/// Returns `true` when `result` was successful.
pub fn contain(reporter: &dyn HealthReporter, step: &str, result: Result<(), StepError>) -> bool {
    match result {
        Ok(()) => true,
        Err(error) => {
            reporter.step_contained(step, &error);
            false
        }
    }
}
