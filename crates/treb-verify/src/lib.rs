//! Verifier (C11): submits each (deployment, explorer) pair to the external verify helper and
//! derives the deployment's overall verification status from the per-explorer results.

pub mod explorer;
mod verify;

pub use explorer::{ExplorerClient, VerifyOutcome, VerifyRequest};
pub use verify::{verify, ExplorerTarget, VerifyOptions, VerifyReport, DEFAULT_CONCURRENCY};
