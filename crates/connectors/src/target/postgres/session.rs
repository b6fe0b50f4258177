use crate::{error::StoreError, target::TargetSession};
use async_trait::async_trait;
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::target::TargetRecord,
};
use std::collections::HashMap;
use tokio::sync::OwnedRwLockWriteGuard;
use tokio_postgres::Client;
use tracing::{debug, warn};

use super::queries;

/// A transaction on the store's dedicated session connection.
///
/// The connection stays locked for the lifetime of the session, so sessions
/// on the same store are serialized.
pub struct PgSession {
    client: Option<OwnedRwLockWriteGuard<Client>>,
    staged: Vec<TargetRecord>,
    identity: HashMap<(EntityKind, String), TargetId>,
}

impl PgSession {
    pub(crate) async fn begin(client: OwnedRwLockWriteGuard<Client>) -> Result<Self, StoreError> {
        client.batch_execute("BEGIN").await?;
        Ok(Self {
            client: Some(client),
            staged: Vec::new(),
            identity: HashMap::new(),
        })
    }

    fn client(&self) -> Result<&Client, StoreError> {
        self.client.as_deref().ok_or(StoreError::SessionClosed)
    }

    async fn finish(mut self, statement: &str) -> Result<(), StoreError> {
        let client = self.client.take().ok_or(StoreError::SessionClosed)?;
        client.batch_execute(statement).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetSession for PgSession {
    fn persist(&mut self, record: TargetRecord) {
        self.staged.push(record);
    }

    async fn find_by_natural_key(
        &mut self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError> {
        if let Some(id) = self.identity.get(&(kind, key.to_string())) {
            return Ok(Some(*id));
        }

        let found = queries::find_by_natural_key(self.client()?, kind, key).await?;
        if let Some(id) = found {
            self.identity.insert((kind, key.to_string()), id);
        }
        Ok(found)
    }

    async fn flush(&mut self) -> Result<Vec<TargetId>, StoreError> {
        let staged = std::mem::take(&mut self.staged);
        let mut ids = Vec::with_capacity(staged.len());

        for record in &staged {
            let id = queries::insert(self.client()?, record).await?;
            if let Some(key) = record.natural_key() {
                self.identity.insert((record.kind(), key.to_string()), id);
            }
            ids.push(id);
        }

        debug!(rows = ids.len(), "Flushed session");
        Ok(ids)
    }

    fn clear(&mut self) {
        self.identity.clear();
        self.staged.clear();
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        (*self).finish("COMMIT").await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        (*self).finish("ROLLBACK").await
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        // Abandoned without commit or rollback; release the transaction in the background.
        if let (Some(client), Ok(handle)) =
            (self.client.take(), tokio::runtime::Handle::try_current())
        {
            handle.spawn(async move {
                if let Err(error) = client.batch_execute("ROLLBACK").await {
                    warn!(%error, "Failed to roll back abandoned session");
                }
            });
        }
    }
}
