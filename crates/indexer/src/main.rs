//! # RPC Indexer
//!
//! Validator RPC measurement service.

use rpc_indexer::cli::handlers::HandlerUtils;
use rpc_indexer::cli::{Args, Cli};
use tracing::error;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    let cli = Cli::new();

    if let Err(e) = cli.run(args).await {
        error!(error = %format!("{e:#}"), "RPC Indexer exited with error");
        HandlerUtils::print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
