use crate::{error::StepError, execution::report::StepReport};
use async_trait::async_trait;
use engine_core::{
    metrics::Metrics,
    state::{RunJournal, models::JournalEntry},
};
use engine_processing::item::{ItemProcessor, ItemReader, ItemWriter};
use model::{
    core::{entity::EntityKind, identifiers::RunId},
    records::chunk::{Chunk, Transformed},
};
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Reader, processor and writer for one entity, driven in chunks.
pub struct Step<I: Send + 'static> {
    name: &'static str,
    kind: EntityKind,
    reader: Box<dyn ItemReader<I>>,
    processor: Box<dyn ItemProcessor<I>>,
    writer: Box<dyn ItemWriter>,
    chunk_size: usize,
    metrics: Metrics,
    cancel: CancellationToken,
    journal: Option<(RunId, Arc<dyn RunJournal>)>,
}

impl<I: Send + 'static> Step<I> {
    pub fn new(
        kind: EntityKind,
        reader: Box<dyn ItemReader<I>>,
        processor: Box<dyn ItemProcessor<I>>,
        writer: Box<dyn ItemWriter>,
        chunk_size: usize,
    ) -> Self {
        Self {
            name: kind.collection(),
            kind,
            reader,
            processor,
            writer,
            chunk_size: chunk_size.max(1),
            metrics: Metrics::new(),
            cancel: CancellationToken::new(),
            journal: None,
        }
    }

    /// Counters shared with the reader and writer built for this step.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_journal(mut self, run_id: RunId, journal: Arc<dyn RunJournal>) -> Self {
        self.journal = Some((run_id, journal));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reads until the end of the stream, writing every `chunk_size` records
    /// and once more for the remainder.
    ///
    /// Cancellation is only observed between records: a chunk that has been
    /// handed to the writer is always committed or rolled back.
    pub async fn execute(mut self) -> Result<StepReport, StepError> {
        let started = Instant::now();
        let step = self.name;
        info!(step, chunk_size = self.chunk_size, "Step started");

        let mut buffer: Vec<Transformed> = Vec::with_capacity(self.chunk_size);
        let mut seq = 0u64;
        let mut created = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                warn!(
                    step,
                    pending = buffer.len(),
                    "Shutdown requested, dropping uncommitted records"
                );
                return Err(StepError::Cancelled { step });
            }

            let Some(item) = self
                .reader
                .read()
                .await
                .map_err(|source| StepError::Read { step, source })?
            else {
                break;
            };
            self.metrics.increment_read(1);

            let transformed = self
                .processor
                .process(item)
                .await
                .map_err(|source| StepError::Process { step, source })?;
            buffer.push(transformed);

            if buffer.len() >= self.chunk_size {
                seq += 1;
                created += self.write_chunk(seq, &mut buffer).await?;
            }
        }

        if !buffer.is_empty() {
            seq += 1;
            created += self.write_chunk(seq, &mut buffer).await?;
        }

        let snapshot = self.metrics.snapshot();
        let report = StepReport {
            name: step,
            kind: self.kind,
            read: snapshot.records_read,
            written: snapshot.records_written,
            created,
            chunks: snapshot.chunks_committed,
            pages: self.reader.pages_fetched(),
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            step,
            read = report.read,
            written = report.written,
            chunks = report.chunks,
            duration_ms = report.duration_ms,
            "Step completed"
        );
        Ok(report)
    }

    async fn write_chunk(
        &mut self,
        seq: u64,
        buffer: &mut Vec<Transformed>,
    ) -> Result<u64, StepError> {
        let items = std::mem::replace(buffer, Vec::with_capacity(self.chunk_size));
        let chunk = Chunk::new(seq, items);

        let result = self
            .writer
            .write(&chunk)
            .await
            .map_err(|source| StepError::Write {
                step: self.name,
                source,
            })?;

        if let Some((run_id, journal)) = &self.journal {
            let entry = JournalEntry::ChunkCommitted {
                run_id: run_id.to_string(),
                step: self.name.to_string(),
                chunk: seq,
                rows: result.rows_written as u64,
            };
            if let Err(error) = journal.append(&entry).await {
                warn!(step = self.name, chunk = seq, %error, "Failed to journal chunk");
            }
        }

        Ok(result.rows_created as u64)
    }
}

/// A step with its item type erased, so a job can hold steps of every entity.
#[async_trait]
pub trait StepRunner: Send {
    fn name(&self) -> &'static str;

    fn kind(&self) -> EntityKind;

    async fn run(self: Box<Self>) -> Result<StepReport, StepError>;
}

#[async_trait]
impl<I: Send + 'static> StepRunner for Step<I> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn run(self: Box<Self>) -> Result<StepReport, StepError> {
        (*self).execute().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_processing::{
        error::{ReaderError, TransformError, WriterError},
        item::WriteResult,
    };
    use model::records::target::TargetRecord;
    use std::{collections::VecDeque, sync::Mutex, time::Duration};
    use tracing_test::traced_test;

    struct VecReader(VecDeque<String>);

    #[async_trait]
    impl ItemReader<String> for VecReader {
        async fn read(&mut self) -> Result<Option<String>, ReaderError> {
            Ok(self.0.pop_front())
        }
    }

    struct NameProcessor;

    #[async_trait]
    impl ItemProcessor<String> for NameProcessor {
        async fn process(&self, name: String) -> Result<Transformed, TransformError> {
            if name == "bad" {
                return Err(TransformError::Validation {
                    kind: EntityKind::Genre,
                    source_id: name,
                    message: "rejected".into(),
                });
            }
            let record = TargetRecord::root(EntityKind::Genre, &name).unwrap();
            Ok(Transformed::new(name, record))
        }
    }

    /// Records chunk sizes instead of writing anywhere.
    struct RecordingWriter {
        chunks: Arc<Mutex<Vec<usize>>>,
        metrics: Metrics,
    }

    #[async_trait]
    impl ItemWriter for RecordingWriter {
        async fn write(&self, chunk: &Chunk) -> Result<WriteResult, WriterError> {
            self.chunks.lock().unwrap().push(chunk.len());
            self.metrics.increment_written(chunk.len() as u64);
            self.metrics.increment_chunks(1);
            Ok(WriteResult {
                rows_written: chunk.len(),
                rows_created: chunk.len(),
                ids: (1..=chunk.len() as i64).collect(),
                duration: Duration::ZERO,
            })
        }
    }

    fn step(names: &[&str], chunk_size: usize) -> (Step<String>, Arc<Mutex<Vec<usize>>>) {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let metrics = Metrics::new();
        let step = Step::new(
            EntityKind::Genre,
            Box::new(VecReader(names.iter().map(|n| n.to_string()).collect())),
            Box::new(NameProcessor),
            Box::new(RecordingWriter {
                chunks: Arc::clone(&chunks),
                metrics: metrics.clone(),
            }),
            chunk_size,
        )
        .with_metrics(metrics);
        (step, chunks)
    }

    #[tokio::test]
    async fn writes_full_chunks_then_remainder() {
        let names: Vec<String> = (1..=25).map(|i| format!("Genre_{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (step, chunks) = step(&refs, 10);

        let report = step.execute().await.unwrap();
        assert_eq!(*chunks.lock().unwrap(), vec![10, 10, 5]);
        assert_eq!(report.read, 25);
        assert_eq!(report.written, 25);
        assert_eq!(report.chunks, 3);
        assert_eq!(report.name, "genres");
    }

    fn assert_send<T: Send>(_: &T) {}

    // Jobs hold steps as boxed runners and drive them from spawned tasks.
    #[test]
    fn step_futures_are_send() {
        let (boxed, _) = step(&["Genre_1"], 1);
        let runner: Box<dyn StepRunner> = Box::new(boxed);
        assert_send(&runner.run());

        let (owned, _) = step(&["Genre_1"], 1);
        assert_send(&owned.execute());
    }

    #[tokio::test]
    async fn empty_source_writes_nothing() {
        let (step, chunks) = step(&[], 10);
        let report = step.execute().await.unwrap();
        assert!(chunks.lock().unwrap().is_empty());
        assert_eq!(report.chunks, 0);
    }

    #[tokio::test]
    async fn processing_error_stops_before_the_chunk_is_written() {
        let (step, chunks) = step(&["Genre_1", "bad", "Genre_3"], 10);
        let err = step.execute().await.unwrap_err();

        assert!(matches!(err, StepError::Process { step: "genres", .. }));
        assert!(chunks.lock().unwrap().is_empty());
    }

    #[traced_test]
    #[tokio::test]
    async fn cancelled_step_stops_between_records() {
        let cancel = CancellationToken::new();
        let (step, chunks) = step(&["Genre_1", "Genre_2"], 1);
        cancel.cancel();

        let err = step.with_cancellation(cancel).execute().await.unwrap_err();
        assert!(matches!(err, StepError::Cancelled { .. }));
        assert!(chunks.lock().unwrap().is_empty());
        assert!(logs_contain("dropping uncommitted records"));
    }
}
