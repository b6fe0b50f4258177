use crate::error::{ReaderError, TransformError, WriterError};
use async_trait::async_trait;
use model::{
    core::identifiers::TargetId,
    records::chunk::{Chunk, Transformed},
};
use std::time::Duration;

/// Pulls source records one at a time; `None` marks the end of the stream.
#[async_trait]
pub trait ItemReader<T: Send>: Send {
    async fn read(&mut self) -> Result<Option<T>, ReaderError>;

    /// Pages fetched from the source so far.
    fn pages_fetched(&self) -> u64 {
        0
    }
}

/// Turns one source record into one target record.
#[async_trait]
pub trait ItemProcessor<I: Send + 'static>: Send + Sync {
    async fn process(&self, item: I) -> Result<Transformed, TransformError>;
}

/// Persists a chunk as a single transaction.
#[async_trait]
pub trait ItemWriter: Send + Sync {
    async fn write(&self, chunk: &Chunk) -> Result<WriteResult, WriterError>;
}

#[derive(Debug, Clone)]
pub struct WriteResult {
    pub rows_written: usize,
    /// Rows inserted by this chunk; the rest reused an existing natural key.
    pub rows_created: usize,
    /// Target id of every item, in chunk order.
    pub ids: Vec<TargetId>,
    pub duration: Duration,
}
