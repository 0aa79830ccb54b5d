//! Connection lifecycle at boot milestones.
//!
//! The primary connection is opened while the host boots. Once boot is
//! complete every connection acquired along the way is handed back and idle
//! connections are closed, so worker processes forked afterwards never
//! inherit a live socket. Reconnecting lazily later is cheap.

use ignition_config::ConnectionSettings;
use thiserror::Error;

use crate::data_access::{ConnectionConfig, DataAccessError};
use crate::pool::ManagedPool;

/// Errors raised while managing boot-time connections.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection settings cannot describe a pool.
    #[error("invalid connection settings for {identity}: {reason}")]
    InvalidSettings {
        /// Configuration identity.
        identity: String,
        /// What is wrong with the settings.
        reason: &'static str,
    },
    /// Opening the primary connection failed.
    #[error("failed to establish connection {identity} ({url}): {source}")]
    Establish {
        /// Configuration identity.
        identity: String,
        /// Connection URL with credentials masked.
        url: String,
        /// Error reported by the data-access layer.
        #[source]
        source: DataAccessError,
    },
    /// Returning active connections failed.
    #[error("failed to clear active connections for {identity}: {source}")]
    ClearActive {
        /// Configuration identity.
        identity: String,
        /// Error reported by the data-access layer.
        #[source]
        source: DataAccessError,
    },
    /// Flushing idle connections failed.
    #[error("failed to flush idle connections for {identity}: {source}")]
    FlushIdle {
        /// Configuration identity.
        identity: String,
        /// Error reported by the data-access layer.
        #[source]
        source: DataAccessError,
    },
}

impl ConnectionError {
    /// Short, stable name of the error used in log records.
    ///
    /// Failures reported by the data-access layer use that layer's kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSettings { .. } => "InvalidConnectionSettings",
            Self::Establish { source, .. }
            | Self::ClearActive { source, .. }
            | Self::FlushIdle { source, .. } => source.kind(),
        }
    }
}

/// Checks that `settings` can describe a pool.
pub fn validate_settings(settings: &ConnectionSettings) -> Result<(), ConnectionError> {
    let reason = if settings.url.trim().is_empty() {
        "connection url is empty"
    } else if settings.pool_size == 0 {
        "pool size must be at least 1"
    } else if settings.connect_timeout.is_zero() {
        "connect timeout must be positive"
    } else {
        return Ok(());
    };
    Err(ConnectionError::InvalidSettings {
        identity: settings.identity.clone(),
        reason,
    })
}

/// Builds the configuration map handed to the data-access layer.
#[must_use]
pub fn connection_config(settings: &ConnectionSettings) -> ConnectionConfig {
    let mut config = ConnectionConfig::default();
    config.insert("name", settings.identity.as_str());
    config.insert("url", settings.url.as_str());
    config.insert("pool", settings.pool_size.to_string());
    config.insert(
        "connect_timeout_ms",
        settings.connect_timeout.as_millis().to_string(),
    );
    config.insert("environment", settings.environment.as_str());
    config
}

/// Opens the primary connection, replacing any existing one.
pub fn establish(settings: &ConnectionSettings, pool: &ManagedPool) -> Result<(), ConnectionError> {
    validate_settings(settings)?;
    let establish_error = |source| ConnectionError::Establish {
        identity: settings.identity.clone(),
        url: settings.redacted_url(),
        source,
    };
    if pool.is_connected() {
        pool.connection().disconnect().map_err(establish_error)?;
    }
    pool.connection()
        .establish(&connection_config(settings))
        .map_err(establish_error)?;
    tracing::info!(
        target: "ignition::connection",
        identity = %settings.identity,
        url = %settings.redacted_url(),
        pool_size = settings.pool_size,
        "primary connection established"
    );
    Ok(())
}

/// Returns connections acquired during boot and closes idle ones.
///
/// Idle connections are flushed even when clearing active ones fails; the
/// first failure is returned.
pub fn release_boot_connections(pool: &ManagedPool) -> Result<(), ConnectionError> {
    let cleared = pool.connection().clear_active();
    let flushed = pool.connection().flush_idle();
    let identity = || pool.identity().to_owned();
    match (cleared, flushed) {
        (Err(source), _) => Err(ConnectionError::ClearActive {
            identity: identity(),
            source,
        }),
        (Ok(()), Err(source)) => Err(ConnectionError::FlushIdle {
            identity: identity(),
            source,
        }),
        (Ok(()), Ok(())) => Ok(()),
    }
}
