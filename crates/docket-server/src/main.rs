//! docket-server — in-memory document store served over stdio.

use anyhow::Result;
use clap::Parser;
use docket_server::{DocServer, DocumentStore};
use std::io;
use tracing::info;

#[derive(Parser)]
#[command(name = "docket-server", version, about = "Document MCP server over stdio")]
struct Cli {
    /// Start with an empty store instead of the seeded documents
    #[arg(long)]
    empty: bool,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to the protocol.
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let store = if cli.empty {
        DocumentStore::new()
    } else {
        DocumentStore::seeded()
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        documents = store.len(),
        "Starting docket-server"
    );

    let mut server = DocServer::new(store);
    server.run().await?;

    info!("Server shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
