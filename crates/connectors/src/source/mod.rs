use crate::error::StoreError;
use async_trait::async_trait;
use model::core::identifiers::new_document_id;
use serde_json::Value;

pub mod memory;
pub mod seed;
pub mod sled;

/// A raw document as stored in a source collection.
pub type Document = Value;

/// Read access to a document store whose collections are ordered by `_id`.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Returns up to `limit` documents after skipping `skip`, in ascending `_id` order.
    async fn find(
        &self,
        collection: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError>;

    /// Returns every document of a collection in ascending `_id` order.
    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str) -> Result<usize, StoreError>;

    /// Stores a document, assigning an `_id` when it has none. Used for seeding.
    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError>;
}

/// Reads the `_id` of a document, generating and storing one if absent.
pub(crate) fn ensure_document_id(document: &mut Document) -> Result<String, StoreError> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| StoreError::Other("documents must be JSON objects".to_string()))?;

    match object.get("_id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(StoreError::Other(format!(
            "document _id must be a string, got {other}"
        ))),
        None => {
            let id = new_document_id();
            object.insert("_id".to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}
