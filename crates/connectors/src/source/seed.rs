use crate::{error::StoreError, source::SourceStore};
use model::core::entity::EntityKind;
use serde_json::json;
use tracing::info;

const COMMENT_TEXTS: [&str; 5] = [
    "Great book!",
    "Could be better",
    "Not bad",
    "Excellent read",
    "Highly recommend",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub authors: usize,
    pub genres: usize,
    pub books: usize,
    pub comments: usize,
}

/// Writes the demo library: 5 authors, 4 genres, 10 books and 15 comments.
///
/// Books embed their author's `fullName` and genre's `name` next to the
/// referenced ids, the way a document store denormalises references.
pub async fn seed_library(store: &dyn SourceStore) -> Result<SeedSummary, StoreError> {
    let mut authors = Vec::new();
    for i in 1..=5 {
        let name = format!("Author_{i}");
        let id = store
            .insert(EntityKind::Author.collection(), json!({ "fullName": name }))
            .await?;
        authors.push((id, name));
    }

    let mut genres = Vec::new();
    for i in 1..=4 {
        let name = format!("Genre_{i}");
        let id = store
            .insert(EntityKind::Genre.collection(), json!({ "name": name }))
            .await?;
        genres.push((id, name));
    }

    let mut books = Vec::new();
    for i in 1..=10usize {
        let (author_id, author_name) = &authors[(i - 1) % authors.len()];
        let (genre_id, genre_name) = &genres[(i - 1) % genres.len()];
        let id = store
            .insert(
                EntityKind::Book.collection(),
                json!({
                    "title": format!("BookTitle_{i}"),
                    "author": { "_id": author_id, "fullName": author_name },
                    "genre": { "_id": genre_id, "name": genre_name },
                }),
            )
            .await?;
        books.push(id);
    }

    let mut comments = 0;
    for (i, book_id) in books.iter().enumerate() {
        for j in 0..1 + (i % 2) {
            let text = COMMENT_TEXTS[(i + j) % COMMENT_TEXTS.len()];
            store
                .insert(
                    EntityKind::Comment.collection(),
                    json!({ "text": text, "book": { "_id": book_id } }),
                )
                .await?;
            comments += 1;
        }
    }

    let summary = SeedSummary {
        authors: authors.len(),
        genres: genres.len(),
        books: books.len(),
        comments,
    };
    info!(?summary, "Seeded source store");
    Ok(summary)
}
