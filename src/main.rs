//! safecrate CLI entry point.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cli;

/// safecrate - disposable container sandboxes for untrusted code
#[derive(Parser, Debug)]
#[command(name = "safecrate")]
#[command(about = "Open and build untrusted code inside isolated containers")]
#[command(
    long_about = "safecrate maps each project directory to its own sandbox image and \
container, and runs all tooling (editor, language server, compiler) inside it.\n\n\
Only the project directory is mounted; networking can be cut entirely.\n\n\
Quick start:\n  \
safecrate init ~/src/untrusted-project\n  \
safecrate open ~/src/untrusted-project --no-network"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the sandbox image for a project
    Init(cli::commands::InitCmd),

    /// Open a project in an isolated container
    Open(cli::commands::OpenCmd),

    /// Resume a previously kept session
    Resume(cli::commands::ResumeCmd),

    /// Remove a project's container and sandbox image
    #[command(visible_alias = "rm")]
    Remove(cli::commands::RemoveCmd),

    /// Show the sandbox state for a project
    Status(cli::commands::StatusCmd),
}

fn main() {
    let cli = Cli::parse();

    init_logging();

    tracing::debug!(version = safecrate::VERSION, "starting safecrate");

    let result = match cli.command {
        Commands::Init(cmd) => cmd.run(),
        Commands::Open(cmd) => cmd.run(),
        Commands::Resume(cmd) => cmd.run(),
        Commands::Remove(cmd) => cmd.run(),
        Commands::Status(cmd) => cmd.run(),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("safecrate=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
