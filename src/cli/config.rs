//! Configuration management commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show config file path
    Path,

    /// Show current config
    Show,

    /// Write a starter config file if none exists
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
