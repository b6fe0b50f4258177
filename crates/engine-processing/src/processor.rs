use crate::{error::TransformError, item::ItemProcessor};
use async_trait::async_trait;
use engine_config::settings::ResolutionMode;
use engine_core::{context::MigrationContext, cross_mapping::IdCrossMapping, mapper::ReferenceMapper};
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    documents::{AuthorRef, GenreRef, SourceAuthor, SourceBook, SourceComment, SourceGenre},
    records::{
        chunk::Transformed,
        target::{TargetAuthor, TargetBook, TargetComment, TargetGenre, TargetRecord},
    },
};
use std::sync::Arc;
use tracing::trace;

fn require_text(
    kind: EntityKind,
    source_id: &str,
    field: &str,
    value: &str,
) -> Result<(), TransformError> {
    if value.trim().is_empty() {
        return Err(TransformError::Validation {
            kind,
            source_id: source_id.to_string(),
            message: format!("{field} is empty"),
        });
    }
    Ok(())
}

pub struct AuthorProcessor;

#[async_trait]
impl ItemProcessor<SourceAuthor> for AuthorProcessor {
    async fn process(&self, author: SourceAuthor) -> Result<Transformed, TransformError> {
        require_text(EntityKind::Author, &author.id, "fullName", &author.full_name)?;
        Ok(Transformed::new(
            author.id,
            TargetRecord::Author(TargetAuthor {
                id: None,
                full_name: author.full_name,
            }),
        ))
    }
}

pub struct GenreProcessor;

#[async_trait]
impl ItemProcessor<SourceGenre> for GenreProcessor {
    async fn process(&self, genre: SourceGenre) -> Result<Transformed, TransformError> {
        require_text(EntityKind::Genre, &genre.id, "name", &genre.name)?;
        Ok(Transformed::new(
            genre.id,
            TargetRecord::Genre(TargetGenre {
                id: None,
                name: genre.name,
            }),
        ))
    }
}

/// How a book finds the target ids of its author and genre.
pub enum ReferenceResolver {
    /// Source id lookups in the mappings filled by the author and genre steps.
    Strict {
        authors: Arc<IdCrossMapping>,
        genres: Arc<IdCrossMapping>,
    },
    /// Get-or-create by the natural key embedded in each reference.
    ResolveOrCreate {
        authors: Arc<ReferenceMapper>,
        genres: Arc<ReferenceMapper>,
    },
}

impl ReferenceResolver {
    pub fn for_mode(mode: ResolutionMode, ctx: &MigrationContext) -> Self {
        match mode {
            ResolutionMode::Strict => ReferenceResolver::Strict {
                authors: Arc::clone(&ctx.author_ids),
                genres: Arc::clone(&ctx.genre_ids),
            },
            ResolutionMode::ResolveOrCreate => ReferenceResolver::ResolveOrCreate {
                authors: Arc::clone(&ctx.authors),
                genres: Arc::clone(&ctx.genres),
            },
        }
    }

    async fn author(&self, book_id: &str, author: &AuthorRef) -> Result<TargetId, TransformError> {
        match self {
            ReferenceResolver::Strict { authors, .. } => {
                lookup(authors, EntityKind::Author, &author.id, book_id)
            }
            ReferenceResolver::ResolveOrCreate { authors, .. } => {
                get_or_create(authors, book_id, author.full_name.as_deref(), "author.fullName")
                    .await
            }
        }
    }

    async fn genre(&self, book_id: &str, genre: &GenreRef) -> Result<TargetId, TransformError> {
        match self {
            ReferenceResolver::Strict { genres, .. } => {
                lookup(genres, EntityKind::Genre, &genre.id, book_id)
            }
            ReferenceResolver::ResolveOrCreate { genres, .. } => {
                get_or_create(genres, book_id, genre.name.as_deref(), "genre.name").await
            }
        }
    }
}

fn lookup(
    mapping: &IdCrossMapping,
    referenced: EntityKind,
    reference_id: &str,
    source_id: &str,
) -> Result<TargetId, TransformError> {
    mapping
        .get(reference_id)
        .ok_or_else(|| TransformError::MissingMapping {
            referenced,
            reference_id: reference_id.to_string(),
            source_id: source_id.to_string(),
        })
}

async fn get_or_create(
    mapper: &ReferenceMapper,
    book_id: &str,
    natural_key: Option<&str>,
    field: &str,
) -> Result<TargetId, TransformError> {
    let key = natural_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| TransformError::Validation {
            kind: EntityKind::Book,
            source_id: book_id.to_string(),
            message: format!("{field} is not embedded in the reference"),
        })?;

    mapper
        .get_or_create(key)
        .await
        .map_err(|source| TransformError::Resolve {
            source_id: book_id.to_string(),
            source,
        })
}

pub struct BookProcessor {
    resolver: ReferenceResolver,
}

impl BookProcessor {
    pub fn new(resolver: ReferenceResolver) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ItemProcessor<SourceBook> for BookProcessor {
    async fn process(&self, book: SourceBook) -> Result<Transformed, TransformError> {
        require_text(EntityKind::Book, &book.id, "title", &book.title)?;

        let author_id = self.resolver.author(&book.id, &book.author).await?;
        let genre_id = self.resolver.genre(&book.id, &book.genre).await?;
        trace!(book = %book.id, author_id, genre_id, "Resolved book references");

        Ok(Transformed::new(
            book.id,
            TargetRecord::Book(TargetBook {
                id: None,
                title: book.title,
                author_id,
                genre_id,
            }),
        ))
    }
}

pub struct CommentProcessor {
    books: Arc<IdCrossMapping>,
}

impl CommentProcessor {
    pub fn new(books: Arc<IdCrossMapping>) -> Self {
        Self { books }
    }
}

#[async_trait]
impl ItemProcessor<SourceComment> for CommentProcessor {
    async fn process(&self, comment: SourceComment) -> Result<Transformed, TransformError> {
        let book_id = lookup(&self.books, EntityKind::Book, &comment.book.id, &comment.id)?;
        Ok(Transformed::new(
            comment.id,
            TargetRecord::Comment(TargetComment {
                id: None,
                text: comment.text,
                book_id,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::target::{TargetStore, memory::MemoryTargetStore};
    use model::{core::identifiers::RunId, documents::BookRef};

    fn context() -> (Arc<MemoryTargetStore>, MigrationContext) {
        let store = Arc::new(MemoryTargetStore::new());
        let ctx = MigrationContext::new(RunId::generate(), store.clone());
        (store, ctx)
    }

    fn book(author_name: Option<&str>, genre_name: Option<&str>) -> SourceBook {
        SourceBook {
            id: "b1".into(),
            title: "BookTitle_1".into(),
            author: AuthorRef {
                id: "a1".into(),
                full_name: author_name.map(str::to_string),
            },
            genre: GenreRef {
                id: "g1".into(),
                name: genre_name.map(str::to_string),
            },
        }
    }

    #[tokio::test]
    async fn rejects_empty_natural_keys() {
        let err = AuthorProcessor
            .process(SourceAuthor {
                id: "a1".into(),
                full_name: " ".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::Validation { kind: EntityKind::Author, .. }));
    }

    #[tokio::test]
    async fn strict_books_use_cross_mappings() {
        let (_store, ctx) = context();
        ctx.author_ids.register("a1", 7);
        ctx.genre_ids.register("g1", 3);

        let processor =
            BookProcessor::new(ReferenceResolver::for_mode(ResolutionMode::Strict, &ctx));
        let out = processor.process(book(None, None)).await.unwrap();

        assert_eq!(out.source_id, "b1");
        assert_eq!(
            out.record,
            TargetRecord::Book(TargetBook {
                id: None,
                title: "BookTitle_1".into(),
                author_id: 7,
                genre_id: 3,
            })
        );
    }

    #[tokio::test]
    async fn strict_books_fail_on_unmapped_author() {
        let (_store, ctx) = context();
        ctx.genre_ids.register("g1", 3);

        let processor =
            BookProcessor::new(ReferenceResolver::for_mode(ResolutionMode::Strict, &ctx));
        let err = processor.process(book(Some("Author_1"), None)).await.unwrap_err();

        assert!(matches!(
            err,
            TransformError::MissingMapping { referenced: EntityKind::Author, ref reference_id, .. }
                if reference_id == "a1"
        ));
    }

    #[tokio::test]
    async fn resolve_mode_creates_references_on_demand() {
        let (store, ctx) = context();
        let processor = BookProcessor::new(ReferenceResolver::for_mode(
            ResolutionMode::ResolveOrCreate,
            &ctx,
        ));

        processor
            .process(book(Some("Author_1"), Some("Genre_1")))
            .await
            .unwrap();
        processor
            .process(book(Some("Author_1"), Some("Genre_1")))
            .await
            .unwrap();

        assert_eq!(store.count(EntityKind::Author).await.unwrap(), 1);
        assert_eq!(store.count(EntityKind::Genre).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn resolve_mode_needs_embedded_keys() {
        let (_store, ctx) = context();
        let processor = BookProcessor::new(ReferenceResolver::for_mode(
            ResolutionMode::ResolveOrCreate,
            &ctx,
        ));

        let err = processor.process(book(Some("Author_1"), None)).await.unwrap_err();
        assert!(matches!(err, TransformError::Validation { kind: EntityKind::Book, .. }));
    }

    #[tokio::test]
    async fn comments_need_a_migrated_book() {
        let (_store, ctx) = context();
        let processor = CommentProcessor::new(Arc::clone(&ctx.book_ids));
        let comment = SourceComment {
            id: "c1".into(),
            text: "Great book!".into(),
            book: BookRef { id: "b1".into() },
        };

        let err = processor.process(comment.clone()).await.unwrap_err();
        assert!(matches!(err, TransformError::MissingMapping { referenced: EntityKind::Book, .. }));

        ctx.book_ids.register("b1", 42);
        let out = processor.process(comment).await.unwrap();
        assert!(matches!(out.record, TargetRecord::Comment(TargetComment { book_id: 42, .. })));
    }
}
