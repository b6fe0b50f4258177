use crate::{
    error::StoreError,
    source::{Document, SourceStore, ensure_document_id},
};
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

/// Embedded document store: one sled tree per collection, JSON values keyed by `_id`.
///
/// Sled iterates keys in byte order, which gives the stable `_id` sort the
/// paginated readers rely on.
#[derive(Clone)]
pub struct SledSourceStore {
    db: sled::Db,
}

impl SledSourceStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// A store that is deleted when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Removes every document of a collection.
    pub fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.db.drop_tree(collection)?;
        Ok(())
    }

    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Document, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[async_trait]
impl SourceStore for SledSourceStore {
    async fn find(
        &self,
        collection: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        let tree = self.db.open_tree(collection)?;
        let mut page = Vec::with_capacity(limit);

        for item in tree.iter().skip(skip).take(limit) {
            let (_key, value) = item?;
            page.push(Self::decode(&value)?);
        }

        debug!(collection, skip, limit, returned = page.len(), "Fetched page");
        Ok(page)
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let tree = self.db.open_tree(collection)?;
        tree.iter()
            .map(|item| {
                let (_key, value) = item?;
                Self::decode(&value)
            })
            .collect()
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.db.open_tree(collection)?.len())
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<String, StoreError> {
        let id = ensure_document_id(&mut document)?;
        let tree = self.db.open_tree(collection)?;
        tree.insert(id.as_bytes(), serde_json::to_vec(&document)?)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn pages_follow_id_order() {
        let dir = tempdir().unwrap();
        let store = SledSourceStore::open(dir.path()).unwrap();

        for id in ["c", "a", "b", "d"] {
            store
                .insert("authors", json!({ "_id": id, "fullName": format!("Author_{id}") }))
                .await
                .unwrap();
        }

        let first = store.find("authors", 0, 3).await.unwrap();
        let ids: Vec<_> = first.iter().map(|d| d["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let rest = store.find("authors", 3, 3).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0]["_id"], "d");

        assert!(store.find("authors", 6, 3).await.unwrap().is_empty());
        assert_eq!(store.count("authors").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn generated_ids_preserve_insertion_order() {
        let store = SledSourceStore::temporary().unwrap();
        let first = store.insert("genres", json!({ "name": "first" })).await.unwrap();
        let second = store.insert("genres", json!({ "name": "second" })).await.unwrap();
        assert!(first < second);

        let all = store.find_all("genres").await.unwrap();
        assert_eq!(all[0]["name"], "first");
        assert_eq!(all[1]["name"], "second");
    }

    #[tokio::test]
    async fn missing_collection_is_empty() {
        let store = SledSourceStore::temporary().unwrap();
        assert!(store.find_all("comments").await.unwrap().is_empty());
        assert_eq!(store.count("comments").await.unwrap(), 0);
    }
}
