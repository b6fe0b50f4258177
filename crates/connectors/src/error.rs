use model::core::entity::EntityKind;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Errors raised by source and target store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or dropped the connection.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A uniqueness constraint rejected a row.
    #[error("Duplicate {kind} for natural key '{key}'")]
    DuplicateKey { kind: EntityKind, key: String },

    /// A row referenced a parent that does not exist.
    #[error("Constraint violation on {kind}: {message}")]
    Constraint { kind: EntityKind, message: String },

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Embedded document store error.
    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    /// A document could not be encoded or decoded.
    #[error("Document serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The connection string could not be parsed.
    #[error("Invalid connection string: {0}")]
    InvalidUrl(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),

    #[error("Session is already closed")]
    SessionClosed,

    #[error("Store error: {0}")]
    Other(String),
}

impl StoreError {
    /// Whether the failure came from connectivity rather than the data.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Postgres(err) => is_transient_pg_error(err),
            StoreError::Sled(sled::Error::Io(_)) => true,
            _ => false,
        }
    }

    pub fn is_duplicate_key(&self) -> bool {
        match self {
            StoreError::DuplicateKey { .. } => true,
            StoreError::Postgres(err) => err.code() == Some(&SqlState::UNIQUE_VIOLATION),
            _ => false,
        }
    }
}

fn is_transient_pg_error(err: &tokio_postgres::Error) -> bool {
    if err.is_closed() {
        return true;
    }

    err.code().is_some_and(is_transient_pg_code)
}

fn is_transient_pg_code(code: &SqlState) -> bool {
    matches!(
        *code,
        SqlState::T_R_SERIALIZATION_FAILURE
            | SqlState::T_R_DEADLOCK_DETECTED
            | SqlState::LOCK_NOT_AVAILABLE
            | SqlState::TOO_MANY_CONNECTIONS
            | SqlState::ADMIN_SHUTDOWN
            | SqlState::CRASH_SHUTDOWN
            | SqlState::CANNOT_CONNECT_NOW
            | SqlState::CONNECTION_FAILURE
            | SqlState::CONNECTION_DOES_NOT_EXIST
            | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
            | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
            | SqlState::CONNECTION_EXCEPTION
            | SqlState::QUERY_CANCELED
            | SqlState::OPERATOR_INTERVENTION
    )
}
