use crate::error::MappingError;
use connectors::target::TargetStore;
use dashmap::DashMap;
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::target::TargetRecord,
};
use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::Mutex;
use tracing::{debug, info};

const LOCK_STRIPES: usize = 64;

/// Resolves natural keys of a root entity (author name, genre name) to
/// target ids, creating the row on first sight.
///
/// Within one run a key maps to exactly one id. Concurrent callers asking for
/// the same key are serialized on a striped lock; a unique-constraint
/// rejection from another writer is answered by re-querying.
pub struct ReferenceMapper {
    kind: EntityKind,
    store: Arc<dyn TargetStore>,
    cache: DashMap<String, TargetId>,
    stripes: Vec<Mutex<()>>,
    created: AtomicU64,
}

impl ReferenceMapper {
    pub fn new(kind: EntityKind, store: Arc<dyn TargetStore>) -> Self {
        Self {
            kind,
            store,
            cache: DashMap::new(),
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
            created: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub async fn get_or_create(&self, key: &str) -> Result<TargetId, MappingError> {
        if key.trim().is_empty() {
            return Err(MappingError::EmptyKey { kind: self.kind });
        }

        if let Some(id) = self.cached(key) {
            return Ok(id);
        }

        let _guard = self.stripe(key).lock().await;

        // Another task may have resolved it while we waited.
        if let Some(id) = self.cached(key) {
            return Ok(id);
        }

        if let Some(id) = self.store.find_by_natural_key(self.kind, key).await? {
            self.remember(key, id);
            return Ok(id);
        }

        let record =
            TargetRecord::root(self.kind, key).ok_or(MappingError::NotRoot { kind: self.kind })?;

        match self.store.persist(&record).await {
            Ok(id) => {
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!(kind = %self.kind, key, id, "Created reference row");
                self.remember(key, id);
                Ok(id)
            }
            Err(err) if err.is_duplicate_key() => {
                debug!(kind = %self.kind, key, "Reference created concurrently, re-querying");
                let id = self
                    .store
                    .find_by_natural_key(self.kind, key)
                    .await?
                    .ok_or_else(|| MappingError::Vanished {
                        kind: self.kind,
                        key: key.to_string(),
                    })?;
                self.remember(key, id);
                Ok(id)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Loads every existing row of this entity into the cache.
    pub async fn prewarm(&self) -> Result<usize, MappingError> {
        let keys = self.store.natural_keys(self.kind).await?;
        let loaded = keys.len();
        for (key, id) in keys {
            self.cache.insert(key, id);
        }
        info!(kind = %self.kind, loaded, "Prewarmed reference cache");
        Ok(loaded)
    }

    pub fn cached(&self, key: &str) -> Option<TargetId> {
        self.cache.get(key).map(|entry| *entry.value())
    }

    /// Caches a mapping established elsewhere, e.g. by a committed chunk.
    pub fn remember(&self, key: &str, id: TargetId) {
        self.cache.insert(key.to_string(), id);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Rows this mapper inserted itself.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    fn stripe(&self, key: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.stripes[(hasher.finish() as usize) % self.stripes.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connectors::{
        error::StoreError,
        target::{TargetSession, memory::MemoryTargetStore},
    };
    use std::sync::atomic::AtomicBool;
    use tracing_test::traced_test;

    fn mapper(store: Arc<dyn TargetStore>) -> ReferenceMapper {
        ReferenceMapper::new(EntityKind::Author, store)
    }

    #[tokio::test]
    async fn same_key_resolves_to_one_row() {
        let store = Arc::new(MemoryTargetStore::new());
        let authors = mapper(store.clone());

        let a = authors.get_or_create("Author_1").await.unwrap();
        let b = authors.get_or_create("Author_1").await.unwrap();
        let c = authors.get_or_create("Author_2").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.count(EntityKind::Author).await.unwrap(), 2);
        assert_eq!(authors.created(), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_create_once() {
        let store = Arc::new(MemoryTargetStore::new());
        let authors = Arc::new(mapper(store.clone()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let authors = Arc::clone(&authors);
                tokio::spawn(async move { authors.get_or_create("Author_1").await.unwrap() })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.count(EntityKind::Author).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reuses_rows_already_in_the_store() {
        let store = Arc::new(MemoryTargetStore::new());
        let existing = store
            .persist(&TargetRecord::root(EntityKind::Author, "Author_1").unwrap())
            .await
            .unwrap();

        let authors = mapper(store.clone());
        assert_eq!(authors.get_or_create("Author_1").await.unwrap(), existing);
        assert_eq!(authors.created(), 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn prewarm_fills_cache() {
        let store = Arc::new(MemoryTargetStore::new());
        for name in ["Author_1", "Author_2"] {
            store
                .persist(&TargetRecord::root(EntityKind::Author, name).unwrap())
                .await
                .unwrap();
        }

        let authors = mapper(store);
        assert_eq!(authors.prewarm().await.unwrap(), 2);
        assert!(authors.cached("Author_2").is_some());
        assert!(logs_contain("Prewarmed reference cache"));
    }

    #[tokio::test]
    async fn rejects_empty_keys() {
        let authors = mapper(Arc::new(MemoryTargetStore::new()));
        let err = authors.get_or_create("  ").await.unwrap_err();
        assert!(matches!(err, MappingError::EmptyKey { .. }));
    }

    /// Hides its rows from the first lookup, as if another writer inserted
    /// the key between our query and our insert.
    struct RacingStore {
        inner: MemoryTargetStore,
        hidden: AtomicBool,
    }

    #[async_trait]
    impl TargetStore for RacingStore {
        fn name(&self) -> &str {
            "racing"
        }

        async fn begin(&self) -> Result<Box<dyn TargetSession>, StoreError> {
            self.inner.begin().await
        }

        async fn persist(&self, record: &TargetRecord) -> Result<TargetId, StoreError> {
            self.inner.persist(record).await
        }

        async fn find_by_natural_key(
            &self,
            kind: EntityKind,
            key: &str,
        ) -> Result<Option<TargetId>, StoreError> {
            if self.hidden.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_by_natural_key(kind, key).await
        }

        async fn natural_keys(
            &self,
            kind: EntityKind,
        ) -> Result<Vec<(String, TargetId)>, StoreError> {
            self.inner.natural_keys(kind).await
        }

        async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
            self.inner.count(kind).await
        }

        async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<TargetRecord>, StoreError> {
            self.inner.fetch_all(kind).await
        }
    }

    #[tokio::test]
    async fn duplicate_rejection_is_answered_by_requery() {
        let inner = MemoryTargetStore::new();
        let winner = inner
            .persist(&TargetRecord::root(EntityKind::Author, "Author_1").unwrap())
            .await
            .unwrap();

        let store = Arc::new(RacingStore {
            inner,
            hidden: AtomicBool::new(true),
        });
        let authors = mapper(store.clone());

        assert_eq!(authors.get_or_create("Author_1").await.unwrap(), winner);
        assert_eq!(authors.created(), 0);
        assert_eq!(store.count(EntityKind::Author).await.unwrap(), 1);
    }
}
