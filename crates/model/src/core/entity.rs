use serde::{Deserialize, Serialize};
use std::fmt;

/// The four entity types moved by the migration, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Author,
    Genre,
    Book,
    Comment,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Author,
        EntityKind::Genre,
        EntityKind::Book,
        EntityKind::Comment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Author => "author",
            EntityKind::Genre => "genre",
            EntityKind::Book => "book",
            EntityKind::Comment => "comment",
        }
    }

    /// Collection name in the source document store.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Author => "authors",
            EntityKind::Genre => "genres",
            EntityKind::Book => "books",
            EntityKind::Comment => "comments",
        }
    }

    /// Table name in the relational target.
    pub fn table(&self) -> &'static str {
        self.collection()
    }

    /// Name of the natural-key column, for entities deduplicated by one.
    pub fn natural_key_column(&self) -> Option<&'static str> {
        match self {
            EntityKind::Author => Some("full_name"),
            EntityKind::Genre => Some("name"),
            EntityKind::Book | EntityKind::Comment => None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.natural_key_column().is_some()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
