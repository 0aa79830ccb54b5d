//! Structured health reporting for boot lifecycle events.

use std::sync::Arc;

use camino::Utf8Path;
use ignition_config::BootConfig;

use crate::attributes::DefinitionReport;
use crate::bootstrap::BootstrapError;
use crate::data_access::DataAccessError;
use crate::oracle::{OracleError, VersionToken};
use crate::scheduler::{Phase, StepError, StepOutcome};

/// Observer used to surface boot events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration is loaded.
    fn bootstrap_starting(&self);

    /// Invoked once the boot sequence is ready for the host's triggers.
    fn bootstrap_succeeded(&self, config: &BootConfig);

    /// Invoked when the boot sequence could not be prepared.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the steps of `phase` run.
    fn phase_starting(&self, phase: Phase);

    /// Invoked after every step of `phase` ran without a critical failure.
    fn phase_completed(&self, phase: Phase, outcomes: &[StepOutcome]);

    /// Invoked after a step finished successfully.
    fn step_completed(&self, phase: Phase, step: &str);

    /// Invoked when a best-effort step failed and boot continues.
    fn step_contained(&self, step: &str, error: &StepError);

    /// Invoked when a critical step failed and the phase is aborted.
    fn step_aborted(&self, step: &str, error: &StepError);

    /// Invoked after a subsystem's first activation drained its hooks.
    fn subsystem_activated(&self, subsystem: &str, hooks: usize);

    /// Invoked when a schema snapshot became a pool's metadata cache.
    fn snapshot_installed(&self, path: &Utf8Path, version: &VersionToken);

    /// Invoked when a snapshot was discarded because its version is stale.
    fn snapshot_stale(&self, identity: &str, snapshot: &VersionToken, current: &VersionToken);

    /// Invoked when a snapshot was discarded because the oracle failed.
    fn snapshot_unverifiable(&self, identity: &str, error: &OracleError);

    /// Invoked when a snapshot is accepted without a version check.
    fn snapshot_trusted(&self, identity: &str, version: &VersionToken);

    /// Invoked after the eager attribute definition pass.
    fn attributes_defined(&self, report: &DefinitionReport);

    /// Invoked when the attribute definition pass stopped early.
    fn attribute_definition_failed(&self, entity: &str, error: &DataAccessError);

    /// Invoked after boot-time connections were returned and flushed.
    fn connections_released(&self, identity: &str);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &BootConfig) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn phase_starting(&self, phase: Phase) {
        (**self).phase_starting(phase);
    }

    fn phase_completed(&self, phase: Phase, outcomes: &[StepOutcome]) {
        (**self).phase_completed(phase, outcomes);
    }

    fn step_completed(&self, phase: Phase, step: &str) {
        (**self).step_completed(phase, step);
    }

    fn step_contained(&self, step: &str, error: &StepError) {
        (**self).step_contained(step, error);
    }

    fn step_aborted(&self, step: &str, error: &StepError) {
        (**self).step_aborted(step, error);
    }

    fn subsystem_activated(&self, subsystem: &str, hooks: usize) {
        (**self).subsystem_activated(subsystem, hooks);
    }

    fn snapshot_installed(&self, path: &Utf8Path, version: &VersionToken) {
        (**self).snapshot_installed(path, version);
    }

    fn snapshot_stale(&self, identity: &str, snapshot: &VersionToken, current: &VersionToken) {
        (**self).snapshot_stale(identity, snapshot, current);
    }

    fn snapshot_unverifiable(&self, identity: &str, error: &OracleError) {
        (**self).snapshot_unverifiable(identity, error);
    }

    fn snapshot_trusted(&self, identity: &str, version: &VersionToken) {
        (**self).snapshot_trusted(identity, version);
    }

    fn attributes_defined(&self, report: &DefinitionReport) {
        (**self).attributes_defined(report);
    }

    fn attribute_definition_failed(&self, entity: &str, error: &DataAccessError) {
        (**self).attribute_definition_failed(entity, error);
    }

    fn connections_released(&self, identity: &str) {
        (**self).connections_released(identity);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "ignition::health",
            event = "bootstrap_starting",
            "preparing boot sequence"
        );
    }

    fn bootstrap_succeeded(&self, config: &BootConfig) {
        tracing::info!(
            target: "ignition::health",
            event = "bootstrap_succeeded",
            environment = config.environment(),
            identity = %config.database_identity,
            log_format = %config.log_format(),
            "boot sequence ready"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "ignition::health",
            event = "bootstrap_failed",
            error = %error,
            "failed to prepare boot sequence"
        );
    }

    fn phase_starting(&self, phase: Phase) {
        tracing::info!(
            target: "ignition::health",
            event = "phase_starting",
            phase = %phase,
            "starting boot phase"
        );
    }

    fn phase_completed(&self, phase: Phase, outcomes: &[StepOutcome]) {
        let contained = outcomes.iter().filter(|outcome| outcome.is_contained()).count();
        tracing::info!(
            target: "ignition::health",
            event = "phase_completed",
            phase = %phase,
            steps = outcomes.len(),
            contained,
            "boot phase completed"
        );
    }

    fn step_completed(&self, phase: Phase, step: &str) {
        tracing::debug!(
            target: "ignition::health",
            event = "step_completed",
            phase = %phase,
            step,
            "initialisation step completed"
        );
    }

    fn step_contained(&self, step: &str, error: &StepError) {
        tracing::warn!(
            target: "ignition::health",
            event = "step_failed",
            step,
            kind = error.kind(),
            message = %error.message(),
            "best-effort step failed; continuing boot"
        );
    }

    fn step_aborted(&self, step: &str, error: &StepError) {
        tracing::error!(
            target: "ignition::health",
            event = "step_aborted",
            step,
            kind = error.kind(),
            message = %error.message(),
            "critical step failed; aborting boot"
        );
    }

    fn subsystem_activated(&self, subsystem: &str, hooks: usize) {
        tracing::info!(
            target: "ignition::health",
            event = "subsystem_activated",
            subsystem,
            hooks,
            "subsystem activated"
        );
    }

    fn snapshot_installed(&self, path: &Utf8Path, version: &VersionToken) {
        tracing::info!(
            target: "ignition::health",
            event = "snapshot_installed",
            path = %path,
            version = %version,
            "schema cache loaded from dump"
        );
    }

    fn snapshot_stale(&self, identity: &str, snapshot: &VersionToken, current: &VersionToken) {
        tracing::warn!(
            target: "ignition::health",
            event = "snapshot_stale",
            identity,
            snapshot_version = %snapshot,
            current_version = %current,
            "ignoring schema cache dump for {identity}: the current schema version is \
             {current}, but the dump was taken at {snapshot}"
        );
    }

    fn snapshot_unverifiable(&self, identity: &str, error: &OracleError) {
        tracing::warn!(
            target: "ignition::health",
            event = "snapshot_unverifiable",
            identity,
            kind = error.kind(),
            message = %error,
            "failed to validate the schema cache dump"
        );
    }

    fn snapshot_trusted(&self, identity: &str, version: &VersionToken) {
        tracing::warn!(
            target: "ignition::health",
            event = "snapshot_trusted",
            identity,
            version = %version,
            "schema cache dump accepted without a version check"
        );
    }

    fn attributes_defined(&self, report: &DefinitionReport) {
        tracing::info!(
            target: "ignition::health",
            event = "attributes_defined",
            defined = report.defined().len(),
            skipped = report.skipped().len(),
            aborted = report.is_aborted(),
            "eager attribute definition finished"
        );
    }

    fn attribute_definition_failed(&self, entity: &str, error: &DataAccessError) {
        tracing::warn!(
            target: "ignition::health",
            event = "attribute_definition_failed",
            entity,
            kind = error.kind(),
            message = %error,
            "failed to define attribute methods"
        );
    }

    fn connections_released(&self, identity: &str) {
        tracing::debug!(
            target: "ignition::health",
            event = "connections_released",
            identity,
            "boot connections returned and idle connections flushed"
        );
    }
}
