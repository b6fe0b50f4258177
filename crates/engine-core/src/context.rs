use crate::{cross_mapping::IdCrossMapping, error::MappingError, mapper::ReferenceMapper};
use connectors::target::TargetStore;
use model::core::{entity::EntityKind, identifiers::RunId};
use std::sync::Arc;

/// Everything one migration run shares between its steps.
///
/// Built fresh for every run, so no mapping leaks from one run into the next.
pub struct MigrationContext {
    pub run_id: RunId,
    pub authors: Arc<ReferenceMapper>,
    pub genres: Arc<ReferenceMapper>,
    pub author_ids: Arc<IdCrossMapping>,
    pub genre_ids: Arc<IdCrossMapping>,
    pub book_ids: Arc<IdCrossMapping>,
}

impl MigrationContext {
    pub fn new(run_id: RunId, store: Arc<dyn TargetStore>) -> Self {
        Self {
            run_id,
            authors: Arc::new(ReferenceMapper::new(EntityKind::Author, Arc::clone(&store))),
            genres: Arc::new(ReferenceMapper::new(EntityKind::Genre, store)),
            author_ids: Arc::new(IdCrossMapping::new(EntityKind::Author)),
            genre_ids: Arc::new(IdCrossMapping::new(EntityKind::Genre)),
            book_ids: Arc::new(IdCrossMapping::new(EntityKind::Book)),
        }
    }

    pub fn mapper(&self, kind: EntityKind) -> Option<&Arc<ReferenceMapper>> {
        match kind {
            EntityKind::Author => Some(&self.authors),
            EntityKind::Genre => Some(&self.genres),
            EntityKind::Book | EntityKind::Comment => None,
        }
    }

    /// The cross mapping a step of `kind` registers into, if any.
    pub fn cross_mapping(&self, kind: EntityKind) -> Option<&Arc<IdCrossMapping>> {
        match kind {
            EntityKind::Author => Some(&self.author_ids),
            EntityKind::Genre => Some(&self.genre_ids),
            EntityKind::Book => Some(&self.book_ids),
            EntityKind::Comment => None,
        }
    }

    /// Loads existing author and genre rows into the mapper caches.
    pub async fn prewarm(&self) -> Result<usize, MappingError> {
        Ok(self.authors.prewarm().await? + self.genres.prewarm().await?)
    }
}
