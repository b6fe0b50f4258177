use crate::{
    error::StoreError,
    target::{
        TargetSession, TargetStore,
        postgres::{queries, session::PgSession, utils::connect_client},
    },
};
use async_trait::async_trait;
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::target::TargetRecord,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::Client;
use tracing::info;

/// PostgreSQL target.
///
/// Holds two connections: one reserved for chunk sessions and one for
/// auto-committed statements, so reference rows created while a chunk is
/// open do not join (or wait on) its transaction.
#[derive(Clone)]
pub struct PgTargetStore {
    session_client: Arc<RwLock<Client>>,
    auto_client: Arc<RwLock<Client>>,
}

impl PgTargetStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let session_client = connect_client(url).await?;
        let auto_client = connect_client(url).await?;
        Ok(Self {
            session_client: Arc::new(RwLock::new(session_client)),
            auto_client: Arc::new(RwLock::new(auto_client)),
        })
    }

    /// Creates the target tables, unique natural keys and foreign keys if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.auto_client.read().await;
        client.batch_execute(queries::SCHEMA_SQL).await?;
        info!("Target schema ready");
        Ok(())
    }

    /// Empties every target table and resets the id sequences.
    pub async fn truncate(&self) -> Result<(), StoreError> {
        let client = self.auto_client.read().await;
        client.batch_execute(queries::TRUNCATE_SQL).await?;
        Ok(())
    }
}

#[async_trait]
impl TargetStore for PgTargetStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn TargetSession>, StoreError> {
        let client = Arc::clone(&self.session_client).write_owned().await;
        Ok(Box::new(PgSession::begin(client).await?))
    }

    async fn persist(&self, record: &TargetRecord) -> Result<TargetId, StoreError> {
        let client = self.auto_client.read().await;
        queries::insert(&client, record).await
    }

    async fn find_by_natural_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<TargetId>, StoreError> {
        let client = self.auto_client.read().await;
        queries::find_by_natural_key(&client, kind, key).await
    }

    async fn natural_keys(&self, kind: EntityKind) -> Result<Vec<(String, TargetId)>, StoreError> {
        let client = self.auto_client.read().await;
        queries::natural_keys(&client, kind).await
    }

    async fn count(&self, kind: EntityKind) -> Result<u64, StoreError> {
        let client = self.auto_client.read().await;
        queries::count(&client, kind).await
    }

    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<TargetRecord>, StoreError> {
        let client = self.auto_client.read().await;
        queries::fetch_all(&client, kind).await
    }
}
