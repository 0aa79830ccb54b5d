//! Test double for [`HealthReporter`] that records structured events for assertions.
//!
//! The recorder captures the boot lifecycle telemetry emitted by the
//! scheduler, the snapshot store and the standard steps so tests can validate
//! observable events without a tracing subscriber.

use std::sync::Mutex;

use camino::Utf8Path;
use ignition_config::BootConfig;

use crate::attributes::DefinitionReport;
use crate::bootstrap::BootstrapError;
use crate::data_access::DataAccessError;
use crate::health::HealthReporter;
use crate::oracle::{OracleError, VersionToken};
use crate::scheduler::{Phase, StepError, StepOutcome};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// A phase started.
    PhaseStarting(Phase),
    /// A phase finished after running `steps` steps.
    PhaseCompleted { phase: Phase, steps: usize },
    /// A step finished successfully.
    StepCompleted(String),
    /// A best-effort step failed.
    StepContained {
        step: String,
        kind: String,
        message: String,
    },
    /// A critical step failed.
    StepAborted(String),
    /// A subsystem was activated with `hooks` queued hooks.
    SubsystemActivated { subsystem: String, hooks: usize },
    /// A snapshot at the given version was installed.
    SnapshotInstalled(String),
    /// A snapshot was discarded as stale.
    SnapshotStale { snapshot: String, current: String },
    /// A snapshot was discarded because the oracle failed.
    SnapshotUnverifiable,
    /// A snapshot at the given version was trusted without a check.
    SnapshotTrusted(String),
    /// The attribute definition pass finished.
    AttributesDefined { defined: usize, skipped: usize },
    /// The attribute definition pass stopped at `entity`.
    AttributeDefinitionFailed { entity: String, kind: String },
    /// Boot connections of the given pool were released.
    ConnectionsReleased(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Names of the steps whose failures were contained, in order.
    #[must_use]
    pub fn contained_steps(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::StepContained { step, .. } => Some(step),
                _ => None,
            })
            .collect()
    }

    /// Returns `true` when any recorded event satisfies `predicate`.
    pub fn recorded(&self, predicate: impl Fn(&HealthEvent) -> bool) -> bool {
        self.events().iter().any(predicate)
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &BootConfig) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn phase_starting(&self, phase: Phase) {
        self.record(HealthEvent::PhaseStarting(phase));
    }

    fn phase_completed(&self, phase: Phase, outcomes: &[StepOutcome]) {
        self.record(HealthEvent::PhaseCompleted {
            phase,
            steps: outcomes.len(),
        });
    }

    fn step_completed(&self, _phase: Phase, step: &str) {
        self.record(HealthEvent::StepCompleted(step.to_owned()));
    }

    fn step_contained(&self, step: &str, error: &StepError) {
        self.record(HealthEvent::StepContained {
            step: step.to_owned(),
            kind: error.kind().to_owned(),
            message: error.message(),
        });
    }

    fn step_aborted(&self, step: &str, _error: &StepError) {
        self.record(HealthEvent::StepAborted(step.to_owned()));
    }

    fn subsystem_activated(&self, subsystem: &str, hooks: usize) {
        self.record(HealthEvent::SubsystemActivated {
            subsystem: subsystem.to_owned(),
            hooks,
        });
    }

    fn snapshot_installed(&self, _path: &Utf8Path, version: &VersionToken) {
        self.record(HealthEvent::SnapshotInstalled(version.to_string()));
    }

    fn snapshot_stale(&self, _identity: &str, snapshot: &VersionToken, current: &VersionToken) {
        self.record(HealthEvent::SnapshotStale {
            snapshot: snapshot.to_string(),
            current: current.to_string(),
        });
    }

    fn snapshot_unverifiable(&self, _identity: &str, _error: &OracleError) {
        self.record(HealthEvent::SnapshotUnverifiable);
    }

    fn snapshot_trusted(&self, _identity: &str, version: &VersionToken) {
        self.record(HealthEvent::SnapshotTrusted(version.to_string()));
    }

    fn attributes_defined(&self, report: &DefinitionReport) {
        self.record(HealthEvent::AttributesDefined {
            defined: report.defined().len(),
            skipped: report.skipped().len(),
        });
    }

    fn attribute_definition_failed(&self, entity: &str, error: &DataAccessError) {
        self.record(HealthEvent::AttributeDefinitionFailed {
            entity: entity.to_owned(),
            kind: error.kind().to_owned(),
        });
    }

    fn connections_released(&self, identity: &str) {
        self.record(HealthEvent::ConnectionsReleased(identity.to_owned()));
    }
}
