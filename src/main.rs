use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use taskmaster::config::AppConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "taskmaster")]
#[command(version, about = "AI-powered task management for development projects")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new taskmaster project
    Init,
    /// Parse a PRD into tasks with a live progress display
    ParsePrd {
        /// Path to the PRD markdown file
        prd: PathBuf,

        /// Approximate number of tasks to request
        #[arg(short, long)]
        num_tasks: Option<usize>,

        /// Write tasks here instead of .taskmaster/tasks.json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable the interactive progress display
        #[arg(long)]
        headless: bool,

        /// Overwrite an existing task file without asking
        #[arg(long)]
        force: bool,
    },
    /// Expand a task into subtasks
    Expand {
        /// Task id to expand
        id: u64,

        /// Approximate number of subtasks to request
        #[arg(short, long, default_value = "5")]
        num_subtasks: usize,

        /// Replace existing subtasks without asking
        #[arg(long)]
        force: bool,
    },
    /// List tasks
    List {
        /// Only show tasks with this status
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Set the status of a task
    SetStatus {
        /// Task id
        id: u64,
        /// New status: pending, in_progress, done, deferred, cancelled
        status: String,
    },
    /// Show the next workable task
    Next,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "taskmaster=debug"
    } else {
        "taskmaster=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // Init runs before a config can exist.
    if let Commands::Init = cli.command {
        return cmd::cmd_init(&project_dir);
    }

    let config = AppConfig::with_cli_args(project_dir, cli.verbose, cli.yes)?;
    for warning in config.validate() {
        eprintln!("warning: {}", warning);
    }

    match &cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::ParsePrd {
            prd,
            num_tasks,
            output,
            headless,
            force,
        } => {
            cmd::cmd_parse_prd(&config, prd, *num_tasks, output.clone(), *headless, *force)
                .await?;
        }
        Commands::Expand {
            id,
            num_subtasks,
            force,
        } => {
            cmd::cmd_expand(&config, *id, *num_subtasks, *force).await?;
        }
        Commands::List { status } => cmd::cmd_list(&config, status.as_deref())?,
        Commands::SetStatus { id, status } => cmd::cmd_set_status(&config, *id, status)?,
        Commands::Next => cmd::cmd_next(&config)?,
    }

    Ok(())
}
