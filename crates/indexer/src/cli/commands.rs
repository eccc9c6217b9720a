use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run measurement cycles on interval boundaries until interrupted
    Start,

    /// Run a single measurement cycle and exit
    RunOnce,

    GenConfig {
        #[arg(short, long, default_value = "rpc-indexer.toml")]
        output: PathBuf,
    },

    /// Load and validate the configuration without starting
    CheckConfig,
}
