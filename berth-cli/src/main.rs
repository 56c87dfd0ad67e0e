use anyhow::{Context, Result};
use berth_core::{Config, DockerRuntime, Reconciler};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

mod commands;

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Converge containers, networks and volumes toward a compose file", long_about = None)]
struct Cli {
    /// Path to the compose file
    #[arg(short, long, global = true, default_value = "compose.yaml")]
    file: PathBuf,

    /// Project name (defaults to the file's `name`, then its directory name)
    #[arg(short = 'n', long = "project-name", global = true)]
    project_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update the project's resources
    Up {
        /// Print the plan without changing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove every resource of the project
    Down,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load configuration")?;
    if let Err(e) = berth_core::init_observability(&config.log_level) {
        eprintln!("warning: logging disabled: {}", e);
    }

    let runtime = DockerRuntime::connect(&config).context("Failed to connect to the container runtime")?;
    let reconciler = Reconciler::new(Arc::new(runtime))
        .with_progress(Arc::new(commands::compose::ConsoleProgress))
        .with_pull_images(config.pull_missing_images);

    match cli.command {
        Commands::Up { dry_run } => {
            commands::compose::up(&reconciler, &cli.file, cli.project_name.as_deref(), dry_run).await
        }
        Commands::Down => commands::compose::down(&reconciler, &cli.file, cli.project_name.as_deref()).await,
    }
}
