//! Structured logging for the boot sequence.
//!
//! Health events are logged under `ignition::health`. Unless the configured
//! filter names an `ignition` target itself, their warnings are always let
//! through so a quiet global filter cannot hide contained boot failures.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use ignition_config::{BootConfig, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned once logging has been configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// global subscriber, even when their configuration differs.
///
/// # Examples
///
/// ```rust
/// use ignition::telemetry;
/// use ignition_config::BootConfig;
///
/// # fn main() -> Result<(), telemetry::TelemetryError> {
/// let config = BootConfig::default();
/// telemetry::initialise(&config)?;
/// telemetry::initialise(&config)?;
/// # Ok(())
/// # }
/// ```
pub fn initialise(config: &BootConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

/// Directive appended when the configured filter says nothing about
/// ignition, so contained boot failures stay visible.
const HEALTH_DIRECTIVE: &str = "ignition::health=warn";

fn install_subscriber(config: &BootConfig) -> Result<(), TelemetryError> {
    let filter = boot_filter(config.log_filter())?;
    let format = config.log_format();
    let ansi = !format.is_structured() && io::stderr().is_terminal();

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr)
            .with_ansi(ansi)
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(
            builder(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
        LogFormat::Pretty => Box::new(builder(filter).pretty().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

/// Parses `expression`, adding [`HEALTH_DIRECTIVE`] when it is needed.
fn boot_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    let directives = if mentions_ignition(expression) {
        expression.to_owned()
    } else if expression.trim().is_empty() {
        HEALTH_DIRECTIVE.to_owned()
    } else {
        format!("{expression},{HEALTH_DIRECTIVE}")
    };
    EnvFilter::try_new(directives).map_err(|error| TelemetryError::Filter(error.to_string()))
}

/// Returns `true` when a directive in `expression` targets ignition.
fn mentions_ignition(expression: &str) -> bool {
    expression
        .split(',')
        .filter_map(|directive| directive.split('=').next())
        .map(str::trim)
        .any(|target| target == "ignition" || target.starts_with("ignition::"))
}
