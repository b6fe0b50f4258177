use crate::{
    commands::{Commands, RunMigrationArgs},
    env::EnvManager,
    error::CliError,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{
    source::{seed::seed_library, sled::SledSourceStore},
    target::{TargetStore, memory::MemoryTargetStore, postgres::PgTargetStore},
};
use engine_config::{
    connection::ConnectionSettings,
    settings::{MigrationSettings, validator::SettingsValidator},
};
use engine_core::state::{NoopJournal, RunJournal, sled_store::SledRunJournal};
use engine_runtime::execution::executor;
use model::core::entity::EntityKind;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod shutdown;

const MEMORY_TARGET: &str = "memory";

#[derive(Parser)]
#[command(
    name = "libmigrate",
    version = "0.1.0",
    about = "Migrates a library catalogue from a document store to PostgreSQL"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let code = match run(cli.command).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("error: {err}");
            ExitCode::GeneralError
        }
    };

    std::process::exit(code.as_i32());
}

async fn run(command: Commands) -> Result<ExitCode, CliError> {
    match command {
        Commands::RunMigration(args) => run_migration(args).await,
        Commands::Seed { source } => {
            seed(source).await?;
            Ok(ExitCode::Success)
        }
        Commands::History { journal, json } => {
            let path = match journal {
                Some(path) => path,
                None => default_journal_path()?,
            };
            let journal = SledRunJournal::open(&path)?;
            output::print_history(&journal.runs().await?, json)?;
            Ok(ExitCode::Success)
        }
    }
}

async fn run_migration(args: RunMigrationArgs) -> Result<ExitCode, CliError> {
    let mut env = EnvManager::new();
    if let Some(path) = &args.env_file {
        env.load_from_file(path)?;
    }

    let connection = ConnectionSettings::from_lookup(|key| env.get(key)).merge(
        ConnectionSettings {
            source_path: args.source.clone(),
            target_url: args.target.clone(),
            journal_path: None,
        },
    );

    let file_settings = match &args.config {
        Some(path) => MigrationSettings::from_file(path)?,
        None => MigrationSettings::default(),
    };
    let settings = SettingsValidator::validate(&file_settings.merge(args.overrides()))?;

    let source_path = connection.require_source()?;
    info!(source = %source_path.display(), "Opening document store");
    let source = Arc::new(SledSourceStore::open(source_path)?);
    let target = open_target(connection.require_target()?, args.truncate).await?;
    let journal = open_journal(connection.journal_path.clone());

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let result = executor::run(
        source,
        Arc::clone(&target),
        settings,
        journal,
        shutdown.cancel_token(),
    )
    .await;

    output::print_result(&result, target.as_ref()).await;

    Ok(ExitCode::for_result(&result, shutdown.is_shutdown_requested()))
}

async fn open_target(url: &str, truncate: bool) -> Result<Arc<dyn TargetStore>, CliError> {
    if url == MEMORY_TARGET {
        warn!("Using an in-memory target; migrated rows are discarded on exit");
        return Ok(Arc::new(MemoryTargetStore::new()));
    }

    let store = PgTargetStore::connect(url).await?;
    store.ensure_schema().await?;
    if truncate {
        store.truncate().await?;
        info!("Target tables truncated");
    }
    Ok(Arc::new(store))
}

/// A journal that cannot be opened only disables journaling.
fn open_journal(path: Option<PathBuf>) -> Arc<dyn RunJournal> {
    let path = match path.map(Ok).unwrap_or_else(default_journal_path) {
        Ok(path) => path,
        Err(err) => {
            warn!(error = %err, "Run journal disabled");
            return Arc::new(NoopJournal);
        }
    };

    match SledRunJournal::open(&path) {
        Ok(journal) => Arc::new(journal),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Run journal disabled");
            Arc::new(NoopJournal)
        }
    }
}

fn default_journal_path() -> Result<PathBuf, CliError> {
    if let Some(path) = ConnectionSettings::from_env().journal_path {
        return Ok(path);
    }
    let home = dirs::home_dir()
        .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?;
    Ok(home.join(".libmigrate/journal"))
}

async fn seed(path: PathBuf) -> Result<(), CliError> {
    let store = SledSourceStore::open(&path)?;
    for kind in EntityKind::ALL {
        store.drop_collection(kind.collection())?;
    }

    let summary = seed_library(&store).await?;
    store.flush().await?;

    info!(
        path = %path.display(),
        authors = summary.authors,
        genres = summary.genres,
        books = summary.books,
        comments = summary.comments,
        "Demo library written"
    );
    println!(
        "seeded {}: {} authors, {} genres, {} books, {} comments",
        path.display(),
        summary.authors,
        summary.genres,
        summary.books,
        summary.comments
    );
    Ok(())
}
