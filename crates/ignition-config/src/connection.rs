use std::fmt;
use std::time::Duration;

use crate::defaults;

/// Connection parameters for one pool, derived from the environment layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Configuration identity; also names the schema cache dump.
    pub identity: String,
    /// Connection URL handed to the data-access layer.
    pub url: String,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// Connect timeout enforced by the data-access layer.
    pub connect_timeout: Duration,
    /// Environment the settings were resolved for.
    pub environment: String,
}

impl ConnectionSettings {
    /// Returns `true` when these settings describe the primary pool.
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.identity == defaults::PRIMARY_IDENTITY
    }

    /// Returns the URL with any password component masked.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let Some((credentials, host)) = rest.split_once('@') else {
            return self.url.clone();
        };
        match credentials.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
            None => self.url.clone(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            identity: defaults::default_identity(),
            url: defaults::default_database_url(),
            pool_size: defaults::DEFAULT_POOL_SIZE,
            connect_timeout: Duration::from_millis(defaults::DEFAULT_CONNECT_TIMEOUT_MS),
            environment: defaults::default_environment(),
        }
    }
}

impl fmt::Display for ConnectionSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{} ({}) {}",
            self.identity,
            self.environment,
            self.redacted_url()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn with_url(url: &str) -> ConnectionSettings {
        ConnectionSettings {
            url: url.to_owned(),
            ..ConnectionSettings::default()
        }
    }

    #[rstest]
    #[case("postgres://app:secret@db:5432/app", "postgres://app:***@db:5432/app")]
    #[case("postgres://app@db/app", "postgres://app@db/app")]
    #[case("sqlite://db/development.sqlite3", "sqlite://db/development.sqlite3")]
    #[case("not a url", "not a url")]
    fn redacts_passwords(#[case] url: &str, #[case] expected: &str) {
        assert_eq!(with_url(url).redacted_url(), expected);
    }

    #[rstest]
    fn default_settings_describe_primary_pool() {
        assert!(ConnectionSettings::default().is_primary());
        let replica = ConnectionSettings {
            identity: "replica".to_owned(),
            ..ConnectionSettings::default()
        };
        assert!(!replica.is_primary());
    }
}
