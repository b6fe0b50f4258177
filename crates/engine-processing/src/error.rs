use connectors::error::StoreError;
use engine_core::error::MappingError;
use model::core::entity::EntityKind;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Category of a migration failure, reported with the job result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// The source or target store failed or could not be reached.
    TransientStore,
    /// A reference points at a record that was never migrated.
    MissingMapping,
    /// A uniqueness constraint rejected a row outside reference resolution.
    DuplicateKey,
    /// A source record is malformed or lacks a required value.
    Validation,
    /// The run was interrupted before finishing.
    Cancelled,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientStore => "TRANSIENT_STORE",
            FailureKind::MissingMapping => "MISSING_MAPPING",
            FailureKind::DuplicateKey => "DUPLICATE_KEY",
            FailureKind::Validation => "VALIDATION",
            FailureKind::Cancelled => "CANCELLED",
            FailureKind::Internal => "INTERNAL",
        }
    }

    pub fn of_store(err: &StoreError) -> Self {
        if err.is_duplicate_key() {
            FailureKind::DuplicateKey
        } else if err.is_transient() {
            FailureKind::TransientStore
        } else {
            match err {
                StoreError::Constraint { .. } => FailureKind::Validation,
                StoreError::Sled(_) | StoreError::Postgres(_) => FailureKind::TransientStore,
                _ => FailureKind::Internal,
            }
        }
    }

    pub fn of_mapping(err: &MappingError) -> Self {
        match err {
            MappingError::EmptyKey { .. } => FailureKind::Validation,
            MappingError::Store(store) => FailureKind::of_store(store),
            MappingError::NotRoot { .. } | MappingError::Vanished { .. } => FailureKind::Internal,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Failed to fetch page at offset {skip} from '{collection}': {source}")]
    Fetch {
        collection: &'static str,
        skip: usize,
        #[source]
        source: StoreError,
    },

    #[error("Malformed document '{document_id}' in '{collection}': {source}")]
    Malformed {
        collection: &'static str,
        document_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ReaderError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ReaderError::Fetch { source, .. } => FailureKind::of_store(source),
            ReaderError::Malformed { .. } => FailureKind::Validation,
        }
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Invalid {kind} '{source_id}': {message}")]
    Validation {
        kind: EntityKind,
        source_id: String,
        message: String,
    },

    #[error("{referenced} id '{reference_id}' referenced by '{source_id}' has no target id")]
    MissingMapping {
        referenced: EntityKind,
        reference_id: String,
        source_id: String,
    },

    #[error("Failed to resolve references of '{source_id}': {source}")]
    Resolve {
        source_id: String,
        #[source]
        source: MappingError,
    },
}

impl TransformError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TransformError::Validation { .. } => FailureKind::Validation,
            TransformError::MissingMapping { .. } => FailureKind::MissingMapping,
            TransformError::Resolve { source, .. } => FailureKind::of_mapping(source),
        }
    }
}

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Failed to write chunk {chunk}: {source}")]
    Store {
        chunk: u64,
        #[source]
        source: StoreError,
    },

    #[error("Chunk {chunk}: store returned {returned} ids for {expected} records")]
    IdCountMismatch {
        chunk: u64,
        expected: usize,
        returned: usize,
    },
}

impl WriterError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            WriterError::Store { source, .. } => FailureKind::of_store(source),
            WriterError::IdCountMismatch { .. } => FailureKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_failures() {
        let dup = WriterError::Store {
            chunk: 1,
            source: StoreError::DuplicateKey {
                kind: EntityKind::Genre,
                key: "Genre_1".into(),
            },
        };
        assert_eq!(dup.failure_kind(), FailureKind::DuplicateKey);

        let missing = TransformError::MissingMapping {
            referenced: EntityKind::Book,
            reference_id: "b9".into(),
            source_id: "c1".into(),
        };
        assert_eq!(missing.failure_kind(), FailureKind::MissingMapping);

        let down = ReaderError::Fetch {
            collection: "books",
            skip: 10,
            source: StoreError::Unavailable("connection refused".into()),
        };
        assert_eq!(down.failure_kind(), FailureKind::TransientStore);

        let empty = TransformError::Resolve {
            source_id: "b1".into(),
            source: MappingError::EmptyKey {
                kind: EntityKind::Author,
            },
        };
        assert_eq!(empty.failure_kind(), FailureKind::Validation);
    }
}
