//! Source of truth for the schema version a snapshot must match.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::ManagedPool;

/// Opaque, totally ordered schema version, e.g. a migration timestamp.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wraps a raw version string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for VersionToken {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for VersionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Raised when the oracle cannot answer.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The version could not be determined.
    #[error("version oracle unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
        /// Underlying error reported by the collaborator.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl OracleError {
    /// Builds an [`Self::Unavailable`] error without a source.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Builds an [`Self::Unavailable`] error wrapping `source`.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Short, stable name of the error used in log records.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "OracleUnavailable",
        }
    }
}

/// Reports the current canonical schema version.
pub trait VersionOracle {
    /// Returns the current version or explains why it is unknown.
    fn current(&self) -> Result<VersionToken, OracleError>;
}

impl<T> VersionOracle for Arc<T>
where
    T: VersionOracle + ?Sized,
{
    fn current(&self) -> Result<VersionToken, OracleError> {
        (**self).current()
    }
}

/// Oracle backed by the data-access layer's latest applied migration.
#[derive(Debug, Clone)]
pub struct PoolVersionOracle {
    pool: Arc<ManagedPool>,
}

impl PoolVersionOracle {
    /// Builds an oracle querying `pool`.
    #[must_use]
    pub const fn new(pool: Arc<ManagedPool>) -> Self {
        Self { pool }
    }
}

impl VersionOracle for PoolVersionOracle {
    fn current(&self) -> Result<VersionToken, OracleError> {
        self.pool.connection().current_version().map_err(|error| {
            OracleError::with_source(
                format!("failed to read schema version of {}", self.pool.identity()),
                error,
            )
        })
    }
}

/// Oracle returning a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticVersionOracle {
    version: Option<VersionToken>,
}

impl StaticVersionOracle {
    /// Oracle that always reports `version`.
    #[must_use]
    pub fn new(version: impl Into<VersionToken>) -> Self {
        Self {
            version: Some(version.into()),
        }
    }

    /// Oracle that always fails.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { version: None }
    }
}

impl VersionOracle for StaticVersionOracle {
    fn current(&self) -> Result<VersionToken, OracleError> {
        self.version
            .clone()
            .ok_or_else(|| OracleError::unavailable("no schema version configured"))
    }
}
