use crate::{
    error::StoreError,
    target::{TargetSession, TargetStore},
};
use async_trait::async_trait;
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::target::TargetRecord,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    rows: HashMap<EntityKind, BTreeMap<TargetId, TargetRecord>>,
    sequences: HashMap<EntityKind, TargetId>,
}

impl Tables {
    /// Sequences advance even for rows that are later rolled back.
    fn next_id(&mut self, kind: EntityKind) -> TargetId {
        let seq = self.sequences.entry(kind).or_insert(0);
        *seq += 1;
        *seq
    }

    fn find_key(&self, kind: EntityKind, key: &str) -> Option<TargetId> {
        self.rows.get(&kind).and_then(|rows| {
            rows.values()
                .find(|row| row.natural_key() == Some(key))
                .and_then(TargetRecord::id)
        })
    }

    fn contains(&self, kind: EntityKind, id: TargetId) -> bool {
        self.rows.get(&kind).is_some_and(|rows| rows.contains_key(&id))
    }

    fn insert(&mut self, record: TargetRecord) {
        if let Some(id) = record.id() {
            self.rows.entry(record.kind()).or_default().insert(id, record);
        }
    }

    /// Unique and foreign-key checks against committed rows plus `pending`.
    fn check(&self, record: &TargetRecord, pending: &[TargetRecord]) -> Result<(), StoreError> {
        let kind = record.kind();

        if let Some(key) = record.natural_key() {
            let staged = pending
                .iter()
                .any(|row| row.kind() == kind && row.natural_key() == Some(key));
            if staged || self.find_key(kind, key).is_some() {
                return Err(StoreError::DuplicateKey {
                    kind,
                    key: key.to_string(),
                });
            }
        }

        let parents: Vec<(EntityKind, TargetId)> = match record {
            TargetRecord::Book(book) => vec![
                (EntityKind::Author, book.author_id),
                (EntityKind::Genre, book.genre_id),
            ],
            TargetRecord::Comment(comment) => vec![(EntityKind::Book, comment.book_id)],
            TargetRecord::Author(_) | TargetRecord::Genre(_) => Vec::new(),
        };

        for (parent, id) in parents {
            let pending_parent = pending
                .iter()
                .any(|row| row.kind() == parent && row.id() == Some(id));
            if !pending_parent && !self.contains(parent, id) {
                return Err(StoreError::Constraint {
                    kind,
                    message: format!("{parent} {id} does not exist"),
                });
            }
        }

        Ok(())
    }
}

/// Transactional in-memory tables with per-entity sequences, unique natural
/// keys and foreign-key checks.
#[derive(Clone, Default)]
pub struct MemoryTargetStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryTargetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TargetStore for MemoryTargetStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn TargetSession>, StoreError> {
        Ok(Box::new(MemorySession {
            tables: Arc::clone(&self.tables),
            staged: Vec::new(),
            flushed: Vec::new(),
            identity: HashMap::new(),
        }))
    }

    async fn persist(&self, record: &TargetRecord) -> Result<TargetId, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut row = record.clone();
        tables.check(&row, &[])?;

        let id = tables.next_id(row.kind());
        row.set_id(id);
        tables.insert(row);
        Ok(id)
    }

    async fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError> {
        Ok(self.tables.lock().await.find_key(kind, key))
    }

    async fn natural_keys(&self, kind: EntityKind) -> Result<Vec<(String, TargetId)>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rows
            .get(&kind)
            .map(|rows| {
                rows.values()
                    .filter_map(|row| Some((row.natural_key()?.to_string(), row.id()?)))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.rows.get(&kind).map_or(0, |rows| rows.len() as u64))
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<TargetRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .rows
            .get(&kind)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}

pub struct MemorySession {
    tables: Arc<Mutex<Tables>>,
    staged: Vec<TargetRecord>,
    flushed: Vec<TargetRecord>,
    identity: HashMap<(EntityKind, String), TargetId>,
}

#[async_trait]
impl TargetSession for MemorySession {
    fn persist(&mut self, record: TargetRecord) {
        self.staged.push(record);
    }

    async fn find_by_natural_key(
        &mut self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError> {
        if let Some(id) = self.identity.get(&(kind, key.to_string())) {
            return Ok(Some(*id));
        }

        let in_session = self
            .flushed
            .iter()
            .find(|row| row.kind() == kind && row.natural_key() == Some(key))
            .and_then(TargetRecord::id);

        let found = match in_session {
            Some(id) => Some(id),
            None => self.tables.lock().await.find_key(kind, key),
        };

        if let Some(id) = found {
            self.identity.insert((kind, key.to_string()), id);
        }
        Ok(found)
    }

    async fn flush(&mut self) -> Result<Vec<TargetId>, StoreError> {
        let mut tables = self.tables.lock().await;
        let mut ids = Vec::with_capacity(self.staged.len());

        for mut row in self.staged.drain(..) {
            tables.check(&row, &self.flushed)?;
            let id = tables.next_id(row.kind());
            row.set_id(id);
            if let Some(key) = row.natural_key() {
                self.identity.insert((row.kind(), key.to_string()), id);
            }
            self.flushed.push(row);
            ids.push(id);
        }

        debug!(rows = ids.len(), "Flushed session");
        Ok(ids)
    }

    fn clear(&mut self) {
        self.identity.clear();
        self.staged.clear();
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let session = *self;
        let mut tables = session.tables.lock().await;

        // Another writer may have committed the same key since our flush.
        for row in &session.flushed {
            if let Some(key) = row.natural_key() {
                if tables.find_key(row.kind(), key).is_some() {
                    return Err(StoreError::DuplicateKey {
                        kind: row.kind(),
                        key: key.to_string(),
                    });
                }
            }
        }

        let rows = session.flushed.len();
        for row in session.flushed {
            tables.insert(row);
        }
        debug!(rows, "Committed session");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        debug!(
            rows = self.flushed.len() + self.staged.len(),
            "Rolled back session"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::target::{TargetBook, TargetComment};

    fn author(name: &str) -> TargetRecord {
        TargetRecord::root(EntityKind::Author, name).unwrap()
    }

    fn genre(name: &str) -> TargetRecord {
        TargetRecord::root(EntityKind::Genre, name).unwrap()
    }

    #[tokio::test]
    async fn flush_assigns_ids_in_staging_order() {
        let store = MemoryTargetStore::new();
        let mut session = store.begin().await.unwrap();
        session.persist(author("Author_1"));
        session.persist(author("Author_2"));

        let ids = session.flush().await.unwrap();
        assert_eq!(ids, vec![1, 2]);

        // Uncommitted rows are invisible outside the session.
        assert_eq!(store.count(EntityKind::Author).await.unwrap(), 0);
        assert_eq!(
            session
                .find_by_natural_key(EntityKind::Author, "Author_2")
                .await
                .unwrap(),
            Some(2)
        );

        session.commit().await.unwrap();
        assert_eq!(store.count(EntityKind::Author).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn rollback_discards_flushed_rows() {
        let store = MemoryTargetStore::new();
        let mut session = store.begin().await.unwrap();
        session.persist(genre("Genre_1"));
        session.flush().await.unwrap();
        session.rollback().await.unwrap();

        assert_eq!(store.count(EntityKind::Genre).await.unwrap(), 0);
        assert_eq!(
            store
                .find_by_natural_key(EntityKind::Genre, "Genre_1")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn rejects_duplicate_natural_keys() {
        let store = MemoryTargetStore::new();
        store.persist(&author("Author_1")).await.unwrap();

        let err = store.persist(&author("Author_1")).await.unwrap_err();
        assert!(err.is_duplicate_key());

        let mut session = store.begin().await.unwrap();
        session.persist(author("Author_1"));
        assert!(session.flush().await.unwrap_err().is_duplicate_key());
    }

    #[tokio::test]
    async fn enforces_foreign_keys() {
        let store = MemoryTargetStore::new();
        let author_id = store.persist(&author("Author_1")).await.unwrap();
        let genre_id = store.persist(&genre("Genre_1")).await.unwrap();

        let mut session = store.begin().await.unwrap();
        session.persist(TargetRecord::Book(TargetBook {
            id: None,
            title: "BookTitle_1".into(),
            author_id,
            genre_id,
        }));
        let book_ids = session.flush().await.unwrap();

        // A comment may reference a book flushed in the same session.
        session.persist(TargetRecord::Comment(TargetComment {
            id: None,
            text: "Great book!".into(),
            book_id: book_ids[0],
        }));
        session.flush().await.unwrap();
        session.commit().await.unwrap();

        let err = store
            .persist(&TargetRecord::Comment(TargetComment {
                id: None,
                text: "orphan".into(),
                book_id: 99,
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint { kind: EntityKind::Comment, .. }));
    }

    #[tokio::test]
    async fn clear_drops_unflushed_records() {
        let store = MemoryTargetStore::new();
        let mut session = store.begin().await.unwrap();
        session.persist(author("Author_1"));
        session.clear();
        assert!(session.flush().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn natural_keys_lists_committed_roots() {
        let store = MemoryTargetStore::new();
        store.persist(&author("Author_1")).await.unwrap();
        store.persist(&author("Author_2")).await.unwrap();

        let keys = store.natural_keys(EntityKind::Author).await.unwrap();
        assert_eq!(
            keys,
            vec![("Author_1".to_string(), 1), ("Author_2".to_string(), 2)]
        );
        assert!(store.natural_keys(EntityKind::Book).await.unwrap().is_empty());
    }
}
