//! Documents as they are stored in the source document store.
//!
//! Field names follow the document store's conventions (`_id`, camelCase).
//! References between documents carry the referenced id and, for authors and
//! genres, the embedded natural key when the store denormalised it.

use crate::core::entity::EntityKind;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A typed document that can be read from one source collection.
pub trait SourceDocument: DeserializeOwned + Serialize + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAuthor {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceGenre {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBook {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    pub author: AuthorRef,
    pub genre: GenreRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceComment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub text: String,
    pub book: BookRef,
}

impl SourceDocument for SourceAuthor {
    const KIND: EntityKind = EntityKind::Author;

    fn id(&self) -> &str {
        &self.id
    }
}

impl SourceDocument for SourceGenre {
    const KIND: EntityKind = EntityKind::Genre;

    fn id(&self) -> &str {
        &self.id
    }
}

impl SourceDocument for SourceBook {
    const KIND: EntityKind = EntityKind::Book;

    fn id(&self) -> &str {
        &self.id
    }
}

impl SourceDocument for SourceComment {
    const KIND: EntityKind = EntityKind::Comment;

    fn id(&self) -> &str {
        &self.id
    }
}

impl From<&SourceAuthor> for AuthorRef {
    fn from(author: &SourceAuthor) -> Self {
        AuthorRef {
            id: author.id.clone(),
            full_name: Some(author.full_name.clone()),
        }
    }
}

impl From<&SourceGenre> for GenreRef {
    fn from(genre: &SourceGenre) -> Self {
        GenreRef {
            id: genre.id.clone(),
            name: Some(genre.name.clone()),
        }
    }
}

impl From<&SourceBook> for BookRef {
    fn from(book: &SourceBook) -> Self {
        BookRef {
            id: book.id.clone(),
        }
    }
}
