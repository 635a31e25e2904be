use async_trait::async_trait;

use super::{Document, Filter, FindDocumentsOptions};
use crate::error::DatabaseError;

/// Low-level document operations a backing store provides.
///
/// Documents arrive already stamped and with validated ids. Implementations
/// only match, order and persist them.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `doc` in `collection` and returns its id, generating one when
    /// `doc` has no `_id`.
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<String, DatabaseError>;

    /// Replaces the single document matching `filter`, keeping its `_id`.
    ///
    /// Returns how many documents matched. Nothing is written unless that
    /// count is exactly one.
    async fn replace_unique(
        &self,
        collection: &str,
        filter: &Filter,
        replacement: Document,
    ) -> Result<usize, DatabaseError>;

    /// Deletes the first document matching `filter` and returns how many
    /// were deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<usize, DatabaseError>;

    /// Returns the first document matching `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DatabaseError>;

    /// Returns the documents matching `filter`, ordered and paged by `options`.
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindDocumentsOptions,
    ) -> Result<Vec<Document>, DatabaseError>;
}
