use connectors::error::StoreError;
use model::core::entity::EntityKind;
use thiserror::Error;

/// Failures of reference resolution.
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Empty {kind} natural key")]
    EmptyKey { kind: EntityKind },

    #[error("{kind} has no natural key and cannot be resolved by one")]
    NotRoot { kind: EntityKind },

    /// The store reported a duplicate but the row could not be found afterwards.
    #[error("{kind} '{key}' was reported as duplicate but is not visible")]
    Vanished { kind: EntityKind, key: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Journal storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Failed to encode journal entry: {0}")]
    Encoding(#[from] bincode::Error),
}
