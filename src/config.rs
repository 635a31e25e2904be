//! Environment-driven settings.

use std::env;

/// Environment variable holding the document store connection string.
pub const CONNECTION_STRING_VAR: &str = "SERVERLESS_DB_CONNECTION_STRING";

/// Environment variable holding the database name.
pub const DATABASE_NAME_VAR: &str = "SERVERLESS_DB_NAME";

/// Database name used when [`DATABASE_NAME_VAR`] is unset.
pub const DEFAULT_DATABASE_NAME: &str = "serverless";

/// Settings for the persistence capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// Connection string; `None` disables persistence
    pub connection_string: Option<String>,
    /// Database to open
    pub database_name: String,
}

impl DatabaseSettings {
    /// Creates settings for `connection_string` and the default database.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: Some(connection_string.into()),
            database_name: DEFAULT_DATABASE_NAME.to_string(),
        }
    }

    /// Settings with no connection string.
    pub fn disabled() -> Self {
        Self {
            connection_string: None,
            database_name: DEFAULT_DATABASE_NAME.to_string(),
        }
    }

    /// Sets the database name.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Reads settings from the process environment.
    ///
    /// Empty values are treated as unset.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps variable names to values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            connection_string: non_empty(CONNECTION_STRING_VAR),
            database_name: non_empty(DATABASE_NAME_VAR)
                .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
        }
    }
}
