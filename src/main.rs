mod commands;
mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shadowcal")]
#[command(about = "Mirror your calendar onto a shadow calendar shared with a fixed set of guests")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the shadow calendar with the main calendar
    Sync {
        /// Only fetch changes since the last sync
        #[arg(long)]
        incremental: bool,
    },
    /// Show configuration and persisted sync state
    Status,
    /// Forget the persisted sync state
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Sync { incremental } => {
            let succeeded = commands::sync::run(incremental).await?;
            if !succeeded {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Status => commands::status::run(),
        Commands::Reset => commands::reset::run(),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
