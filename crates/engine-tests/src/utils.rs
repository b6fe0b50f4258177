use async_trait::async_trait;
use connectors::{
    error::StoreError,
    source::{Document, SourceStore, memory::MemorySourceStore},
    target::{TargetSession, TargetStore, memory::MemoryTargetStore},
};
use engine_config::settings::{ResolutionMode, validated::ValidatedSettings};
use engine_runtime::execution::job::MigrationJob;
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::target::TargetRecord,
};
use serde_json::json;
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

pub fn settings(chunk_size: usize, resolution: ResolutionMode) -> ValidatedSettings {
    ValidatedSettings {
        chunk_size,
        page_size: chunk_size,
        resolution,
        prewarm_cache: false,
    }
}

pub fn job(
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    settings: ValidatedSettings,
) -> MigrationJob {
    MigrationJob::new(source, target, settings)
}

/// A small library where every book references an author and a genre by id
/// and embeds their natural keys.
pub async fn small_library(
    authors: usize,
    genres: usize,
    books: usize,
    comments: usize,
) -> Arc<MemorySourceStore> {
    let store = Arc::new(MemorySourceStore::new());

    for i in 1..=authors {
        store
            .insert(
                "authors",
                json!({ "_id": format!("a{i:03}"), "fullName": format!("Author_{i}") }),
            )
            .await
            .unwrap();
    }
    for i in 1..=genres {
        store
            .insert(
                "genres",
                json!({ "_id": format!("g{i:03}"), "name": format!("Genre_{i}") }),
            )
            .await
            .unwrap();
    }
    for i in 1..=books {
        let a = (i - 1) % authors.max(1) + 1;
        let g = (i - 1) % genres.max(1) + 1;
        store
            .insert(
                "books",
                book_doc(&format!("b{i:03}"), &format!("BookTitle_{i}"), a, g),
            )
            .await
            .unwrap();
    }
    for i in 1..=comments {
        let b = (i - 1) % books.max(1) + 1;
        store
            .insert(
                "comments",
                json!({
                    "_id": format!("c{i:03}"),
                    "text": format!("Comment_{i}"),
                    "book": { "_id": format!("b{b:03}") },
                }),
            )
            .await
            .unwrap();
    }

    store
}

pub fn book_doc(id: &str, title: &str, author: usize, genre: usize) -> Document {
    json!({
        "_id": id,
        "title": title,
        "author": { "_id": format!("a{author:03}"), "fullName": format!("Author_{author}") },
        "genre": { "_id": format!("g{genre:03}"), "name": format!("Genre_{genre}") },
    })
}

/// Asserts every book and comment points at an existing row.
pub async fn assert_foreign_keys(store: &dyn TargetStore) {
    let ids = |records: Vec<TargetRecord>| -> HashSet<TargetId> {
        records.iter().filter_map(TargetRecord::id).collect()
    };
    let authors = ids(store.fetch_all(EntityKind::Author).await.unwrap());
    let genres = ids(store.fetch_all(EntityKind::Genre).await.unwrap());
    let books = store.fetch_all(EntityKind::Book).await.unwrap();
    let book_ids = ids(books.clone());

    for book in books {
        let TargetRecord::Book(book) = book else {
            panic!("non-book row in books");
        };
        assert!(authors.contains(&book.author_id), "dangling author {}", book.author_id);
        assert!(genres.contains(&book.genre_id), "dangling genre {}", book.genre_id);
    }

    for comment in store.fetch_all(EntityKind::Comment).await.unwrap() {
        let TargetRecord::Comment(comment) = comment else {
            panic!("non-comment row in comments");
        };
        assert!(book_ids.contains(&comment.book_id), "dangling book {}", comment.book_id);
    }
}

/// Counts page fetches per collection.
pub struct CountingSource {
    inner: Arc<dyn SourceStore>,
    pub fetches: AtomicUsize,
}

impl CountingSource {
    pub fn new(inner: Arc<dyn SourceStore>) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceStore for CountingSource {
    async fn find(
        &self,
        collection: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Document>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.find(collection, skip, limit).await
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.find_all(collection).await
    }

    async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        self.inner.count(collection).await
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        self.inner.insert(collection, document).await
    }
}

/// Fails the flush of any session in which the `fail_at`-th record of
/// `kind` (counted across the store's lifetime, starting at 1) was staged.
pub struct FlakyTarget {
    inner: MemoryTargetStore,
    kind: EntityKind,
    fail_at: usize,
    staged: Arc<AtomicUsize>,
}

impl FlakyTarget {
    pub fn new(inner: MemoryTargetStore, kind: EntityKind, fail_at: usize) -> Self {
        Self {
            inner,
            kind,
            fail_at,
            staged: Arc::new(AtomicUsize::new(0)),
        }
    }
}

struct FlakySession {
    inner: Box<dyn TargetSession>,
    kind: EntityKind,
    fail_at: usize,
    staged: Arc<AtomicUsize>,
    poisoned: bool,
}

#[async_trait]
impl TargetSession for FlakySession {
    fn persist(&mut self, record: TargetRecord) {
        if record.kind() == self.kind {
            let n = self.staged.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_at {
                self.poisoned = true;
            }
        }
        self.inner.persist(record);
    }

    async fn find_by_natural_key(
        &mut self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError> {
        self.inner.find_by_natural_key(kind, key).await
    }

    async fn flush(&mut self) -> Result<Vec<TargetId>, StoreError> {
        // Let the healthy rows reach the session first, then fail.
        let ids = self.inner.flush().await?;
        if self.poisoned {
            return Err(StoreError::Unavailable(format!(
                "injected failure after {} staged rows",
                ids.len()
            )));
        }
        Ok(ids)
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl TargetStore for FlakyTarget {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn begin(&self) -> Result<Box<dyn TargetSession>, StoreError> {
        Ok(Box::new(FlakySession {
            inner: self.inner.begin().await?,
            kind: self.kind,
            fail_at: self.fail_at,
            staged: Arc::clone(&self.staged),
            poisoned: false,
        }))
    }

    async fn persist(&self, record: &TargetRecord) -> Result<TargetId, StoreError> {
        self.inner.persist(record).await
    }

    async fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError> {
        self.inner.find_by_natural_key(kind, key).await
    }

    async fn natural_keys(&self, kind: EntityKind) -> Result<Vec<(String, TargetId)>, StoreError> {
        self.inner.natural_keys(kind).await
    }

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        self.inner.count(kind).await
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<TargetRecord>, StoreError> {
        self.inner.fetch_all(kind).await
    }
}
