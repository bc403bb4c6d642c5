//! RPC endpoint commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum EndpointCommands {
    /// List the candidate endpoints a run would probe
    List,

    /// Probe every candidate and show which one would be selected
    Probe,
}
