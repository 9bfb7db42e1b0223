//! Trait objects for the two external services the syncer polls, so tests inject fakes instead
//! of a live `reqwest::Client`. The real implementations carry the 30-second per-request timeout
//! spec'd for HTTP calls to multisig and explorer services.

use crate::model::{GovernorStatusReport, SafeStatusReport};
use async_trait::async_trait;
use std::time::Duration;
use treb_common::error::Result;
use treb_common::ids::ChainId;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait SafeTransactionService: Send + Sync {
    async fn status(&self, chain_id: ChainId, safe_address: &str, safe_tx_hash: &str) -> Result<SafeStatusReport>;
}

#[async_trait]
pub trait GovernorClient: Send + Sync {
    async fn status(&self, chain_id: ChainId, governor_address: &str, proposal_id: &str) -> Result<GovernorStatusReport>;
}

/// Queries a Safe transaction service instance (one base URL per chain, selected by the caller).
pub struct HttpSafeTransactionService {
    client: reqwest::Client,
    base_urls: std::collections::BTreeMap<ChainId, String>,
}

impl HttpSafeTransactionService {
    pub fn new(base_urls: std::collections::BTreeMap<ChainId, String>) -> Self {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default();
        Self { client, base_urls }
    }
}

#[async_trait]
impl SafeTransactionService for HttpSafeTransactionService {
    async fn status(&self, chain_id: ChainId, safe_address: &str, safe_tx_hash: &str) -> Result<SafeStatusReport> {
        let base = self
            .base_urls
            .get(&chain_id)
            .ok_or_else(|| treb_common::error::TrebError::NotFound(format!("no Safe transaction service configured for chain {chain_id}")))?;
        let url = format!("{base}/v1/safes/{safe_address}/multisig-transactions/{safe_tx_hash}/");
        let report = self.client.get(url).send().await?.error_for_status()?.json::<SafeStatusReport>().await?;
        Ok(report)
    }
}

/// Queries a governor proposal's state via an indexer HTTP endpoint (one base URL per chain).
pub struct HttpGovernorClient {
    client: reqwest::Client,
    base_urls: std::collections::BTreeMap<ChainId, String>,
}

impl HttpGovernorClient {
    pub fn new(base_urls: std::collections::BTreeMap<ChainId, String>) -> Self {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default();
        Self { client, base_urls }
    }
}

#[async_trait]
impl GovernorClient for HttpGovernorClient {
    async fn status(&self, chain_id: ChainId, governor_address: &str, proposal_id: &str) -> Result<GovernorStatusReport> {
        let base = self
            .base_urls
            .get(&chain_id)
            .ok_or_else(|| treb_common::error::TrebError::NotFound(format!("no governor indexer configured for chain {chain_id}")))?;
        let url = format!("{base}/governors/{governor_address}/proposals/{proposal_id}");
        let report = self.client.get(url).send().await?.error_for_status()?.json::<GovernorStatusReport>().await?;
        Ok(report)
    }
}
