//! RPC endpoint selection and chain access

mod client;
mod probe;
mod selector;

pub use client::{AlloyChainClient, ChainClient};
pub use probe::LatencyProber;
pub use selector::{select_fastest, Selection};
