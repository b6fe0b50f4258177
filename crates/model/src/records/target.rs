use crate::core::{entity::EntityKind, identifiers::TargetId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetAuthor {
    pub id: Option<TargetId>,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGenre {
    pub id: Option<TargetId>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBook {
    pub id: Option<TargetId>,
    pub title: String,
    pub author_id: TargetId,
    pub genre_id: TargetId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetComment {
    pub id: Option<TargetId>,
    pub text: String,
    pub book_id: TargetId,
}

/// A row of the relational target. `id` stays `None` until the store assigns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TargetRecord {
    Author(TargetAuthor),
    Genre(TargetGenre),
    Book(TargetBook),
    Comment(TargetComment),
}

impl TargetRecord {
    /// Builds an id-less root row (author or genre) for a natural key.
    pub fn root(kind: EntityKind, natural_key: &str) -> Option<Self> {
        match kind {
            EntityKind::Author => Some(TargetRecord::Author(TargetAuthor {
                id: None,
                full_name: natural_key.to_string(),
            })),
            EntityKind::Genre => Some(TargetRecord::Genre(TargetGenre {
                id: None,
                name: natural_key.to_string(),
            })),
            EntityKind::Book | EntityKind::Comment => None,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            TargetRecord::Author(_) => EntityKind::Author,
            TargetRecord::Genre(_) => EntityKind::Genre,
            TargetRecord::Book(_) => EntityKind::Book,
            TargetRecord::Comment(_) => EntityKind::Comment,
        }
    }

    pub fn id(&self) -> Option<TargetId> {
        match self {
            TargetRecord::Author(a) => a.id,
            TargetRecord::Genre(g) => g.id,
            TargetRecord::Book(b) => b.id,
            TargetRecord::Comment(c) => c.id,
        }
    }

    pub fn set_id(&mut self, id: TargetId) {
        match self {
            TargetRecord::Author(a) => a.id = Some(id),
            TargetRecord::Genre(g) => g.id = Some(id),
            TargetRecord::Book(b) => b.id = Some(id),
            TargetRecord::Comment(c) => c.id = Some(id),
        }
    }

    /// Natural key used for deduplication, if this entity has one.
    pub fn natural_key(&self) -> Option<&str> {
        match self {
            TargetRecord::Author(a) => Some(&a.full_name),
            TargetRecord::Genre(g) => Some(&g.name),
            TargetRecord::Book(_) | TargetRecord::Comment(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_rows_carry_natural_key() {
        let mut author = TargetRecord::root(EntityKind::Author, "Author_1").unwrap();
        assert_eq!(author.natural_key(), Some("Author_1"));
        assert_eq!(author.id(), None);

        author.set_id(7);
        assert_eq!(author.id(), Some(7));
        assert!(TargetRecord::root(EntityKind::Book, "x").is_none());
    }
}
