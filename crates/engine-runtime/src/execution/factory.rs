use crate::execution::step::{Step, StepRunner};
use connectors::{source::SourceStore, target::TargetStore};
use engine_config::settings::validated::ValidatedSettings;
use engine_core::{
    context::MigrationContext,
    metrics::Metrics,
    state::{NoopJournal, RunJournal},
};
use engine_processing::{
    item::ItemProcessor,
    processor::{AuthorProcessor, BookProcessor, CommentProcessor, GenreProcessor, ReferenceResolver},
    reader::PagedReader,
    writer::ChunkWriter,
};
use model::{
    core::entity::EntityKind,
    documents::{SourceAuthor, SourceBook, SourceComment, SourceDocument, SourceGenre},
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wires readers, processors and writers for each entity against one run's context.
pub struct StepFactory {
    ctx: Arc<MigrationContext>,
    source: Arc<dyn SourceStore>,
    target: Arc<dyn TargetStore>,
    settings: ValidatedSettings,
    cancel: CancellationToken,
    journal: Arc<dyn RunJournal>,
}

impl StepFactory {
    pub fn new(
        ctx: Arc<MigrationContext>,
        source: Arc<dyn SourceStore>,
        target: Arc<dyn TargetStore>,
        settings: ValidatedSettings,
    ) -> Self {
        Self {
            ctx,
            source,
            target,
            settings,
            cancel: CancellationToken::new(),
            journal: Arc::new(NoopJournal),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_journal(mut self, journal: Arc<dyn RunJournal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn author_step(&self) -> Step<SourceAuthor> {
        self.assemble::<SourceAuthor>(Box::new(AuthorProcessor), self.root_writer(EntityKind::Author))
    }

    pub fn genre_step(&self) -> Step<SourceGenre> {
        self.assemble::<SourceGenre>(Box::new(GenreProcessor), self.root_writer(EntityKind::Genre))
    }

    pub fn book_step(&self) -> Step<SourceBook> {
        let resolver = ReferenceResolver::for_mode(self.settings.resolution(), &self.ctx);
        let writer = ChunkWriter::new(Arc::clone(&self.target), EntityKind::Book)
            .with_cross_mapping(Arc::clone(&self.ctx.book_ids));
        self.assemble::<SourceBook>(Box::new(BookProcessor::new(resolver)), writer)
    }

    pub fn comment_step(&self) -> Step<SourceComment> {
        let processor = CommentProcessor::new(Arc::clone(&self.ctx.book_ids));
        let writer = ChunkWriter::new(Arc::clone(&self.target), EntityKind::Comment);
        self.assemble::<SourceComment>(Box::new(processor), writer)
    }

    pub fn build(&self, kind: EntityKind) -> Box<dyn StepRunner> {
        match kind {
            EntityKind::Author => Box::new(self.author_step()),
            EntityKind::Genre => Box::new(self.genre_step()),
            EntityKind::Book => Box::new(self.book_step()),
            EntityKind::Comment => Box::new(self.comment_step()),
        }
    }

    /// Authors and genres reuse rows by natural key and feed their cross mapping.
    fn root_writer(&self, kind: EntityKind) -> ChunkWriter {
        let mut writer = ChunkWriter::new(Arc::clone(&self.target), kind);
        if let Some(mapper) = self.ctx.mapper(kind) {
            writer = writer.with_dedup(Arc::clone(mapper));
        }
        if let Some(mapping) = self.ctx.cross_mapping(kind) {
            writer = writer.with_cross_mapping(Arc::clone(mapping));
        }
        writer
    }

    fn assemble<D: SourceDocument>(
        &self,
        processor: Box<dyn ItemProcessor<D>>,
        writer: ChunkWriter,
    ) -> Step<D> {
        let metrics = Metrics::new();
        let reader = PagedReader::<D>::new(Arc::clone(&self.source), self.settings.page_size())
            .with_metrics(metrics.clone());
        let writer = writer.with_metrics(metrics.clone());

        Step::new(
            D::KIND,
            Box::new(reader),
            processor,
            Box::new(writer),
            self.settings.chunk_size(),
        )
        .with_metrics(metrics)
        .with_cancellation(self.cancel.clone())
        .with_journal(self.ctx.run_id.clone(), Arc::clone(&self.journal))
    }
}
