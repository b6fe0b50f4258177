use crate::error::StoreError;
use async_trait::async_trait;
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::target::TargetRecord,
};

pub mod memory;
pub mod postgres;

/// The relational store records are migrated into.
///
/// Chunk writes go through a [`TargetSession`]; reference resolution uses the
/// auto-committing methods so a created row is visible to every later chunk.
#[async_trait]
pub trait TargetStore: Send + Sync {
    fn name(&self) -> &str;

    /// Opens a unit of work spanning one chunk.
    async fn begin(&self) -> Result<Box<dyn TargetSession>, StoreError>;

    /// Inserts a single row outside any session and returns its assigned id.
    ///
    /// A natural-key collision surfaces as [`StoreError::DuplicateKey`].
    async fn persist(&self, record: &TargetRecord) -> Result<TargetId, StoreError>;

    async fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError>;

    /// Every `(natural key, id)` pair of a root entity.
    async fn natural_keys(&self, kind: EntityKind) -> Result<Vec<(String, TargetId)>, StoreError>;

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError>;

    /// Every committed row of an entity, ordered by id.
    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<TargetRecord>, StoreError>;
}

/// One transaction against the target.
///
/// Records passed to [`persist`](TargetSession::persist) are only staged;
/// [`flush`](TargetSession::flush) sends them to the store inside the
/// transaction and returns their ids in staging order. Nothing is visible
/// outside the session until [`commit`](TargetSession::commit).
#[async_trait]
pub trait TargetSession: Send {
    fn persist(&mut self, record: TargetRecord);

    /// Looks a natural key up, including rows flushed earlier in this session.
    async fn find_by_natural_key(
        &mut self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError>;

    async fn flush(&mut self) -> Result<Vec<TargetId>, StoreError>;

    /// Drops the session's identity cache and any record not yet flushed.
    fn clear(&mut self);

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
