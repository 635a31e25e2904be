//! Document persistence capability.
//!
//! Handlers reach storage through [`Database`] and [`Collection`], which are
//! bound to the acting user of the invocation. Every insert and replace is
//! audit-stamped (see [`audit`]) before it reaches the [`DocumentStore`].
//!
//! ```text
//! DatabaseProvider::database(user)   → Option<Database>
//!   ↓
//! Database::collection(name)         → Collection
//!   ↓
//! Collection::insert_document() etc  → AuditStamp::apply → DocumentStore
//! ```

pub mod audit;
mod memory;
mod provider;
mod store;

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

pub use memory::{MemoryConnector, MemoryStore, MEMORY_SCHEME};
pub use provider::{Connector, DatabaseProvider};
pub use store::DocumentStore;

use crate::error::DatabaseError;
use crate::request::AuthenticatedUser;
use audit::AuditStamp;

/// A stored document.
pub type Document = Map<String, Value>;

/// A query over documents: field equality or `{ "$op": arg }` conditions.
pub type Filter = Map<String, Value>;

/// Field holding a document's id.
pub const ID_FIELD: &str = "_id";

/// Sort direction for [`FindDocumentsOptions::sort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first
    Ascending,
    /// Largest first
    Descending,
}

/// Paging and ordering for [`Collection::find_documents`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindDocumentsOptions {
    /// Maximum number of documents returned
    pub limit: Option<usize>,
    /// Number of matching documents skipped
    pub skip: Option<usize>,
    /// Sort keys, applied in order
    pub sort: Vec<(String, SortOrder)>,
}

impl FindDocumentsOptions {
    /// Limits the result to `limit` documents.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `skip` matches.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Adds a sort key.
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }
}

/// Returns true if `id` has the shape of a document id (24 hex characters).
pub fn is_document_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

fn document_id(id: &str) -> Result<String, DatabaseError> {
    if is_document_id(id) {
        Ok(id.to_ascii_lowercase())
    } else {
        Err(DatabaseError::InvalidId(id.to_string()))
    }
}

fn id_filter(id: String, additional_query: Option<Filter>) -> Filter {
    let mut filter = Filter::new();
    filter.insert(ID_FIELD.to_string(), Value::String(id));
    if let Some(extra) = additional_query {
        filter.extend(extra);
    }
    filter
}

/// A database handle bound to the acting user.
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    user: Option<AuthenticatedUser>,
}

impl Database {
    /// Binds `store` to `user`.
    pub fn new(store: Arc<dyn DocumentStore>, user: Option<AuthenticatedUser>) -> Self {
        Self { store, user }
    }

    /// The acting user writes are stamped with.
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    /// Opens the collection `name`.
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            name: name.into(),
            store: Arc::clone(&self.store),
            user: self.user.clone(),
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("user", &self.user.as_ref().and_then(|u| u.user_id.as_deref()))
            .finish_non_exhaustive()
    }
}

/// A named collection of documents.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use serverless_kit::db::{Database, MemoryStore};
/// use serverless_kit::AuthenticatedUser;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let db = Database::new(Arc::new(MemoryStore::new()), Some(AuthenticatedUser::new("u-1")));
/// let orders = db.collection("orders");
///
/// let mut doc = serde_json::Map::new();
/// doc.insert("total".into(), 12.into());
/// let id = orders.insert_document(doc).await.unwrap();
///
/// let stored = orders.get_document(&id, None).await.unwrap().unwrap();
/// assert_eq!(stored["_userId"], "u-1");
/// # });
/// ```
#[derive(Clone)]
pub struct Collection {
    name: String,
    store: Arc<dyn DocumentStore>,
    user: Option<AuthenticatedUser>,
}

impl Collection {
    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn stamp(&self, doc: &mut Document) {
        AuditStamp::now(self.user.as_ref()).apply(doc);
    }

    /// Inserts `doc` and returns its id.
    ///
    /// A caller-supplied `_id` must be a valid document id; without one the
    /// store generates it.
    pub async fn insert_document(&self, mut doc: Document) -> Result<String, DatabaseError> {
        match doc.get(ID_FIELD) {
            None | Some(Value::Null) => {
                doc.remove(ID_FIELD);
            }
            Some(Value::String(id)) => {
                let id = document_id(id)?;
                doc.insert(ID_FIELD.to_string(), Value::String(id));
            }
            Some(other) => return Err(DatabaseError::InvalidId(other.to_string())),
        }
        self.stamp(&mut doc);
        self.store.insert_one(&self.name, doc).await
    }

    /// Replaces the document identified by `doc["_id"]`.
    ///
    /// `additional_query` narrows the match; its keys override `_id`. Fails
    /// with [`DatabaseError::ReplaceMismatch`] unless exactly one document
    /// matched, in which case nothing is written.
    pub async fn replace_document(
        &self,
        mut doc: Document,
        additional_query: Option<Filter>,
    ) -> Result<(), DatabaseError> {
        let id = match doc.remove(ID_FIELD) {
            None | Some(Value::Null) => return Err(DatabaseError::MissingId),
            Some(Value::String(id)) => document_id(&id)?,
            Some(other) => return Err(DatabaseError::InvalidId(other.to_string())),
        };
        self.stamp(&mut doc);

        let filter = id_filter(id, additional_query);
        let matched = self.store.replace_unique(&self.name, &filter, doc).await?;
        if matched != 1 {
            tracing::debug!(collection = %self.name, matched, "replace rejected");
            return Err(DatabaseError::ReplaceMismatch { matched });
        }
        Ok(())
    }

    /// Deletes the document `id` if it matches `additional_query`.
    ///
    /// Deleting a missing document is not an error.
    pub async fn delete_document(
        &self,
        id: &str,
        additional_query: Option<Filter>,
    ) -> Result<(), DatabaseError> {
        let filter = id_filter(document_id(id)?, additional_query);
        self.store.delete_one(&self.name, &filter).await?;
        Ok(())
    }

    /// Fetches the document `id` if it matches `additional_query`.
    pub async fn get_document(
        &self,
        id: &str,
        additional_query: Option<Filter>,
    ) -> Result<Option<Document>, DatabaseError> {
        let filter = id_filter(document_id(id)?, additional_query);
        self.store.find_one(&self.name, &filter).await
    }

    /// Returns all documents matching `query`, or every document when `None`.
    pub async fn find_documents(
        &self,
        query: Option<Filter>,
        options: FindDocumentsOptions,
    ) -> Result<Vec<Document>, DatabaseError> {
        let filter = query.unwrap_or_default();
        self.store.find(&self.name, &filter, &options).await
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
