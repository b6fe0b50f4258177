use crate::{
    error::WriterError,
    item::{ItemWriter, WriteResult},
};
use async_trait::async_trait;
use connectors::{
    error::StoreError,
    target::{TargetSession, TargetStore},
};
use engine_core::{cross_mapping::IdCrossMapping, mapper::ReferenceMapper, metrics::Metrics};
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::chunk::Chunk,
};
use std::{collections::HashMap, sync::Arc, time::Instant};
use tracing::{info, warn};

/// Writes each chunk in its own target session: persist, flush, clear, commit.
///
/// Any failure rolls the whole chunk back. Cross mappings and mapper caches
/// are only updated after the commit succeeded, so they never point at rows
/// that were rolled back.
pub struct ChunkWriter {
    store: Arc<dyn TargetStore>,
    kind: EntityKind,
    dedup: Option<Arc<ReferenceMapper>>,
    cross_mapping: Option<Arc<IdCrossMapping>>,
    metrics: Metrics,
}

/// Outcome of the in-session part of a write.
struct Staged {
    ids: Vec<TargetId>,
    created: Vec<(String, TargetId)>,
    rows_created: usize,
}

impl ChunkWriter {
    pub fn new(store: Arc<dyn TargetStore>, kind: EntityKind) -> Self {
        Self {
            store,
            kind,
            dedup: None,
            cross_mapping: None,
            metrics: Metrics::new(),
        }
    }

    /// Reuse existing rows with the same natural key instead of inserting.
    pub fn with_dedup(mut self, mapper: Arc<ReferenceMapper>) -> Self {
        self.dedup = Some(mapper);
        self
    }

    /// Register `source id -> target id` for every committed record.
    pub fn with_cross_mapping(mut self, mapping: Arc<IdCrossMapping>) -> Self {
        self.cross_mapping = Some(mapping);
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    async fn stage(
        &self,
        session: &mut dyn TargetSession,
        chunk: &Chunk,
    ) -> Result<Staged, WriterError> {
        let store_err = |source: StoreError| WriterError::Store {
            chunk: chunk.seq,
            source,
        };

        let mut ids: Vec<Option<TargetId>> = vec![None; chunk.len()];
        let mut inserted: Vec<usize> = Vec::new();
        let mut staged_keys: HashMap<&str, usize> = HashMap::new();
        let mut aliases: Vec<(usize, usize)> = Vec::new();

        for (idx, item) in chunk.items.iter().enumerate() {
            if let (Some(mapper), Some(key)) = (&self.dedup, item.record.natural_key()) {
                if let Some(id) = mapper.cached(key) {
                    ids[idx] = Some(id);
                    continue;
                }
                if let Some(id) = session
                    .find_by_natural_key(self.kind, key)
                    .await
                    .map_err(store_err)?
                {
                    ids[idx] = Some(id);
                    continue;
                }
                if let Some(&first) = staged_keys.get(key) {
                    aliases.push((idx, first));
                    continue;
                }
                staged_keys.insert(key, idx);
            }

            session.persist(item.record.clone());
            inserted.push(idx);
        }

        let flushed = session.flush().await.map_err(store_err)?;
        if flushed.len() != inserted.len() {
            return Err(WriterError::IdCountMismatch {
                chunk: chunk.seq,
                expected: inserted.len(),
                returned: flushed.len(),
            });
        }
        session.clear();

        for (&idx, id) in inserted.iter().zip(flushed) {
            ids[idx] = Some(id);
        }
        for (idx, first) in aliases {
            ids[idx] = ids[first];
        }

        let created = staged_keys
            .into_iter()
            .filter_map(|(key, idx)| Some((key.to_string(), ids[idx]?)))
            .collect();

        let ids = ids
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(WriterError::IdCountMismatch {
                chunk: chunk.seq,
                expected: chunk.len(),
                returned: inserted.len(),
            })?;

        Ok(Staged {
            ids,
            created,
            rows_created: inserted.len(),
        })
    }
}

#[async_trait]
impl ItemWriter for ChunkWriter {
    async fn write(&self, chunk: &Chunk) -> Result<WriteResult, WriterError> {
        let start = Instant::now();
        let store_err = |source: StoreError| WriterError::Store {
            chunk: chunk.seq,
            source,
        };

        let mut session = self.store.begin().await.map_err(store_err)?;

        let staged = match self.stage(session.as_mut(), chunk).await {
            Ok(staged) => staged,
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!(chunk = chunk.seq, error = %rollback_err, "Rollback failed");
                }
                self.metrics.increment_rollbacks(1);
                warn!(kind = %self.kind, chunk = chunk.seq, error = %err, "Chunk rolled back");
                return Err(err);
            }
        };

        session.commit().await.map_err(store_err)?;

        if let Some(mapping) = &self.cross_mapping {
            for (item, id) in chunk.items.iter().zip(&staged.ids) {
                mapping.register(item.source_id.as_str(), *id);
            }
        }
        if let Some(mapper) = &self.dedup {
            for (key, id) in &staged.created {
                mapper.remember(key, *id);
            }
        }

        let duration = start.elapsed();
        self.metrics.increment_written(chunk.len() as u64);
        self.metrics.increment_chunks(1);

        info!(
            kind = %self.kind,
            chunk = chunk.seq,
            rows = chunk.len(),
            created = staged.rows_created,
            duration_ms = duration.as_millis(),
            "Chunk committed"
        );

        Ok(WriteResult {
            rows_written: chunk.len(),
            rows_created: staged.rows_created,
            ids: staged.ids,
            duration,
        })
    }
}
