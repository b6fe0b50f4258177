use clap::{Args, Subcommand};
use engine_config::settings::{MigrationSettings, ResolutionMode};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Copy authors, genres, books and comments into the target database
    RunMigration(RunMigrationArgs),

    /// Write the demo library into a document store
    Seed {
        #[arg(long, help = "Document store directory")]
        source: PathBuf,
    },

    /// List past runs recorded in the run journal
    History {
        #[arg(long, help = "Journal directory (default: ~/.libmigrate/journal)")]
        journal: Option<PathBuf>,

        #[arg(long, help = "Print the runs as JSON instead of a table")]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunMigrationArgs {
    #[arg(long, help = "Records per committed chunk")]
    pub chunk_size: Option<usize>,

    #[arg(long, help = "Documents fetched per source page (default: chunk size)")]
    pub page_size: Option<usize>,

    #[arg(long, value_name = "strict|resolve", help = "How book references are resolved")]
    pub mode: Option<ResolutionMode>,

    #[arg(long, help = "Load existing author and genre keys before the first step")]
    pub prewarm: bool,

    #[arg(long, help = "JSON settings file")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "KEY=VALUE file with LIBMIGRATE_* connection variables")]
    pub env_file: Option<PathBuf>,

    #[arg(long, help = "Document store directory")]
    pub source: Option<PathBuf>,

    #[arg(long, help = "PostgreSQL URL, or 'memory' for a throwaway target")]
    pub target: Option<String>,

    #[arg(long, help = "Empty the target tables before migrating")]
    pub truncate: bool,
}

impl RunMigrationArgs {
    /// Settings given on the command line; unset flags leave the config file value.
    pub fn overrides(&self) -> MigrationSettings {
        MigrationSettings {
            chunk_size: self.chunk_size,
            page_size: self.page_size,
            resolution: self.mode,
            prewarm_cache: self.prewarm.then_some(true),
        }
    }
}
