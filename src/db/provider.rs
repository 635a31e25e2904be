use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use super::{Database, DocumentStore};
use crate::config::DatabaseSettings;
use crate::error::DatabaseError;
use crate::request::AuthenticatedUser;

/// Opens a [`DocumentStore`] from a connection string.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to `database_name` at `connection_string`.
    async fn connect(
        &self,
        connection_string: &str,
        database_name: &str,
    ) -> Result<Arc<dyn DocumentStore>, DatabaseError>;
}

/// Lazily connected, process-wide source of [`Database`] handles.
///
/// - The first call to [`database`](Self::database) connects; concurrent
///   callers wait for the same attempt.
/// - The outcome is kept: a failed connection fails every later call with
///   the same error and is never retried.
/// - Without a connection string the provider turns unavailable, logs one
///   warning, and answers `Ok(None)` from then on.
///
/// # Examples
///
/// ```
/// use std::sync::OnceLock;
/// use serverless_kit::config::DatabaseSettings;
/// use serverless_kit::db::{DatabaseProvider, MemoryConnector};
///
/// static PROVIDER: OnceLock<DatabaseProvider<MemoryConnector>> = OnceLock::new();
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let provider = PROVIDER.get_or_init(|| {
///     DatabaseProvider::new(MemoryConnector::new(), DatabaseSettings::new("memory://app"))
/// });
///
/// let db = provider.database(None).await.unwrap().expect("configured");
/// let _users = db.collection("users");
/// # });
/// ```
pub struct DatabaseProvider<C> {
    connector: C,
    settings: DatabaseSettings,
    store: OnceCell<Result<Arc<dyn DocumentStore>, DatabaseError>>,
    unavailable: AtomicBool,
}

impl<C: Connector> DatabaseProvider<C> {
    /// Creates a provider that connects with `connector` on first use.
    pub fn new(connector: C, settings: DatabaseSettings) -> Self {
        Self {
            connector,
            settings,
            store: OnceCell::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Creates a provider configured from the process environment.
    pub fn from_env(connector: C) -> Self {
        Self::new(connector, DatabaseSettings::from_env())
    }

    /// Settings the provider connects with.
    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    /// Returns true once the provider gave up for lack of configuration.
    pub fn is_unavailable(&self) -> bool {
        self.unavailable.load(Ordering::Acquire)
    }

    /// Returns a database bound to `user`, or `None` when persistence is
    /// not configured.
    pub async fn database(
        &self,
        user: Option<AuthenticatedUser>,
    ) -> Result<Option<Database>, DatabaseError> {
        if self.is_unavailable() {
            return Ok(None);
        }

        let Some(connection_string) = self.settings.connection_string.as_deref() else {
            if !self.unavailable.swap(true, Ordering::AcqRel) {
                tracing::warn!("no connection string configured, persistence disabled");
            }
            return Ok(None);
        };

        let store = self
            .store
            .get_or_init(|| self.connect(connection_string))
            .await
            .clone()?;
        Ok(Some(Database::new(store, user)))
    }

    async fn connect(
        &self,
        connection_string: &str,
    ) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        let database = self.settings.database_name.as_str();
        tracing::info!(database, "initializing database");

        match self.connector.connect(connection_string, database).await {
            Ok(store) => {
                tracing::info!(database, "database initialized");
                Ok(store)
            }
            Err(e) => {
                tracing::error!(database, error = %e, "database initialization failed");
                Err(match e {
                    DatabaseError::Initialization(_) => e,
                    other => DatabaseError::Initialization(other.to_string()),
                })
            }
        }
    }
}

impl<C> fmt::Debug for DatabaseProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseProvider")
            .field("database_name", &self.settings.database_name)
            .field("connected", &self.store.initialized())
            .field("unavailable", &self.unavailable.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
