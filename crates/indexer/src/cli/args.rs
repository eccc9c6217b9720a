use crate::cli::Command;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rpc-indexer")]
#[command(about = "RPC Indexer - measures validator RPC endpoint health")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file, layered over defaults and under environment variables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
