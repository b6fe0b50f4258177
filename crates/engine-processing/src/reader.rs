use crate::{error::ReaderError, item::ItemReader};
use async_trait::async_trait;
use connectors::source::{Document, SourceStore};
use engine_core::metrics::Metrics;
use model::{documents::SourceDocument, pagination::cursor::PageCursor};
use std::{collections::VecDeque, marker::PhantomData, sync::Arc};
use tracing::debug;

/// Streams one source collection page by page, in stable `_id` order.
///
/// Only the current page is held in memory. The traversal is exhaustive and
/// duplicate-free as long as the collection is not modified during the run.
pub struct PagedReader<D> {
    store: Arc<dyn SourceStore>,
    collection: &'static str,
    cursor: PageCursor,
    page: VecDeque<Document>,
    pages_fetched: u64,
    metrics: Option<Metrics>,
    _marker: PhantomData<fn() -> D>,
}

impl<D: SourceDocument> PagedReader<D> {
    pub fn new(store: Arc<dyn SourceStore>, page_size: usize) -> Self {
        Self {
            store,
            collection: D::KIND.collection(),
            cursor: PageCursor::new(page_size),
            page: VecDeque::new(),
            pages_fetched: 0,
            metrics: None,
            _marker: PhantomData,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn fetch_page(&mut self) -> Result<(), ReaderError> {
        let skip = self.cursor.skip;
        let docs = self
            .store
            .find(self.collection, skip, self.cursor.page_size)
            .await
            .map_err(|source| ReaderError::Fetch {
                collection: self.collection,
                skip,
                source,
            })?;

        self.pages_fetched += 1;
        if let Some(metrics) = &self.metrics {
            metrics.increment_pages(1);
        }

        self.cursor.advance(docs.len());
        debug!(
            collection = self.collection,
            skip,
            returned = docs.len(),
            has_more = self.cursor.has_more,
            "Fetched source page"
        );

        self.page = docs.into();
        Ok(())
    }

    fn decode(&self, doc: Document) -> Result<D, ReaderError> {
        let document_id = doc
            .get("_id")
            .and_then(|id| id.as_str())
            .unwrap_or("<no id>")
            .to_string();

        serde_json::from_value(doc).map_err(|source| ReaderError::Malformed {
            collection: self.collection,
            document_id,
            source,
        })
    }
}

#[async_trait]
impl<D: SourceDocument> ItemReader<D> for PagedReader<D> {
    async fn read(&mut self) -> Result<Option<D>, ReaderError> {
        if self.page.is_empty() {
            if !self.cursor.has_more {
                return Ok(None);
            }
            self.fetch_page().await?;
        }

        match self.page.pop_front() {
            Some(doc) => self.decode(doc).map(Some),
            // A fresh page came back empty.
            None => Ok(None),
        }
    }

    fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::source::memory::MemorySourceStore;
    use model::documents::SourceAuthor;
    use serde_json::json;

    async fn authors(n: usize) -> Arc<MemorySourceStore> {
        let store = Arc::new(MemorySourceStore::new());
        for i in 1..=n {
            store
                .insert(
                    "authors",
                    json!({ "_id": format!("a{i:03}"), "fullName": format!("Author_{i}") }),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn reads_every_document_once_in_order() {
        let store = authors(25).await;
        let mut reader = PagedReader::<SourceAuthor>::new(store, 10);

        let mut ids = Vec::new();
        while let Some(author) = reader.read().await.unwrap() {
            ids.push(author.id);
        }

        assert_eq!(ids.len(), 25);
        assert_eq!(ids.first().map(String::as_str), Some("a001"));
        assert_eq!(ids.last().map(String::as_str), Some("a025"));
        assert_eq!(reader.pages_fetched(), 3);

        // Exhausted readers stay exhausted without fetching again.
        assert!(reader.read().await.unwrap().is_none());
        assert_eq!(reader.pages_fetched(), 3);
    }

    #[tokio::test]
    async fn full_last_page_needs_one_empty_fetch() {
        let store = authors(20).await;
        let metrics = Metrics::new();
        let mut reader = PagedReader::<SourceAuthor>::new(store, 10).with_metrics(metrics.clone());

        let mut count = 0;
        while reader.read().await.unwrap().is_some() {
            count += 1;
        }

        assert_eq!(count, 20);
        assert_eq!(metrics.snapshot().pages_fetched, 3);
    }

    #[tokio::test]
    async fn empty_collection_ends_immediately() {
        let store = Arc::new(MemorySourceStore::new());
        let mut reader = PagedReader::<SourceAuthor>::new(store, 10);
        assert!(reader.read().await.unwrap().is_none());
        assert_eq!(reader.pages_fetched(), 1);
    }

    #[tokio::test]
    async fn malformed_documents_are_reported() {
        let store = Arc::new(MemorySourceStore::new());
        store
            .insert("authors", json!({ "_id": "a1", "name": "no fullName here" }))
            .await
            .unwrap();

        let mut reader = PagedReader::<SourceAuthor>::new(store, 10);
        let err = reader.read().await.unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Malformed { ref document_id, .. } if document_id == "a1"
        ));
    }
}
