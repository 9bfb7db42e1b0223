//! Safe/Governor sync (C9): polls pending multisig batches and governor proposals and advances
//! them to their terminal on-chain state.

pub mod model;
pub mod services;
mod sync;

pub use model::{GovernorStatusReport, RecordOutcome, RemoteGovernorStatus, RemoteSafeStatus, SafeStatusReport, SyncReport};
pub use services::{GovernorClient, HttpGovernorClient, HttpSafeTransactionService, SafeTransactionService};
pub use sync::{sync, SyncContext, DEFAULT_CONCURRENCY};
