use crate::settings::{DEFAULT_CHUNK_SIZE, ResolutionMode};
use serde::Serialize;

/// Immutable, validated configuration for one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedSettings {
    /// Records per write transaction
    pub chunk_size: usize,
    /// Documents fetched from the source per page
    pub page_size: usize,
    pub resolution: ResolutionMode,
    /// Whether to load existing authors and genres before the first step
    pub prewarm_cache: bool,
}

impl ValidatedSettings {
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn resolution(&self) -> ResolutionMode {
        self.resolution
    }

    pub fn prewarm_cache(&self) -> bool {
        self.prewarm_cache
    }

    /// Compact one-line form used in logs and the run journal.
    pub fn describe(&self) -> String {
        format!(
            "chunk_size={} page_size={} resolution={} prewarm_cache={}",
            self.chunk_size, self.page_size, self.resolution, self.prewarm_cache
        )
    }
}

impl Default for ValidatedSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_size: DEFAULT_CHUNK_SIZE,
            resolution: ResolutionMode::Strict,
            prewarm_cache: false,
        }
    }
}
