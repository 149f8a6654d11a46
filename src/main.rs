// Opsvault: Application Entry Point
//
// Parses CLI arguments, sets up logging and dispatches to the command
// handler. The tokio runtime is only needed by `opsvault serve`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use opsvault::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // Logs go to stderr: `opsvault reveal` writes the bare secret to stdout
    // for piping. Events carry credential and actor ids, never secret material.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("opsvault=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
