//! Pruner (C10): proposes deletion of deployments with no on-chain code and transactions with
//! no receipt, returning a delete-only changeset for the caller to apply.

pub mod client;
mod prune;

pub use client::ChainClient;
pub use prune::{prune, PruneOptions, PruneReport, DEFAULT_CONCURRENCY};
