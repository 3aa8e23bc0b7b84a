// CmsVault — Application Entry Point
//
// Parses CLI arguments, initializes structured logging (with a filter that
// never emits secret values), and dispatches to the command handler.
// Logs go to stderr: in `agent` mode stdout carries JSON-RPC only.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cmsvault::cli::{execute, Cli};

fn main() {
    // RUST_LOG=cmsvault=debug for verbose output. The default level is
    // `info`, which never includes secret values.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cmsvault=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
