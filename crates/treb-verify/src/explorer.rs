//! The external verify helper's contract: one invocation per (deployment, explorer) pair.

use async_trait::async_trait;
use treb_common::error::Result;

/// What the verifier needs to hand the external verify helper for one submission.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub artifact_path: String,
    pub compiler_version: String,
    pub constructor_args: String,
    pub contract_address: String,
    pub explorer_name: String,
    pub explorer_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified { url: Option<String> },
    AlreadyVerified { url: Option<String> },
    Failed { reason: String },
}

#[async_trait]
pub trait ExplorerClient: Send + Sync {
    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyOutcome>;
}
