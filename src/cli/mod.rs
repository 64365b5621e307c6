use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigLoader;
use crate::storage::{self, KeyValueStore, MemoryStore};

pub mod commands;

use self::commands::{ExpenseArgs, PrefsArgs, ProjectArgs, TaskArgs};

#[derive(Parser, Debug)]
#[command(
    name = "taskly",
    version,
    about = "Local-first task manager and expense tracker"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over TASKLY_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over TASKLY_DATA)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Keep everything in memory for this invocation
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add, list and edit tasks
    Task(TaskArgs),
    /// Manage the project list
    Project(ProjectArgs),
    /// Record and summarise expenses
    Expense(ExpenseArgs),
    /// Show or toggle persisted UI preferences
    Prefs(PrefsArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("TASKLY_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("TASKLY_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;
    let store: Arc<dyn KeyValueStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(storage::init(&paths, &config.storage)?)
    };

    let config = Arc::new(config);
    let output = match cli.command {
        Commands::Task(args) => commands::handle_task_command(store, config, args)?,
        Commands::Project(args) => commands::handle_project_command(store, config, args)?,
        Commands::Expense(args) => commands::handle_expense_command(store, config, args)?,
        Commands::Prefs(args) => commands::handle_prefs_command(store, config, args)?,
    };
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
