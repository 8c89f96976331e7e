pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "relaycheck")]
#[command(about = "Checks that documents replicate through a relay and its hubs")]
pub struct Args {
    /// Path to the relaycheck config directory (defaults to ~/.relaycheck)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
