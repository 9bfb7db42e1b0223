//! Pruner (C10): proposes deletions for deployments with no on-chain code and transactions with
//! no receipt, as a delete-only changeset the caller applies after optionally prompting.

use crate::client::ChainClient;
use futures::stream::{self, StreamExt};
use treb_common::error::Result;
use treb_common::ids::ChainId;
use treb_registry::model::{TransactionStatus, VerificationStatus};
use treb_registry::{Changeset, DeploymentFilter, RegistryStore};

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub deployments_pruned: Vec<String>,
    pub transactions_pruned: Vec<String>,
}

pub struct PruneOptions {
    pub chain_id: ChainId,
    pub include_pending: bool,
    pub concurrency: usize,
}

impl PruneOptions {
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id, include_pending: false, concurrency: DEFAULT_CONCURRENCY }
    }
}

fn is_verified(deployment: &treb_registry::model::Deployment) -> bool {
    deployment.verification.status == Some(VerificationStatus::Verified)
}

/// Walks every registry entry for `options.chain_id` and returns a delete-only [`Changeset`]
/// plus a human-readable report. Never consults the network for entries skipped by
/// `includePending` or already-verified deployments.
pub async fn prune(registry: &RegistryStore, client: &dyn ChainClient, options: &PruneOptions) -> Result<(Changeset, PruneReport)> {
    let concurrency = options.concurrency.max(1);
    let mut changeset = Changeset::default();
    let mut report = PruneReport::default();

    let deployments = registry.list(&DeploymentFilter { chain_id: Some(options.chain_id), ..Default::default() });
    let candidates: Vec<_> = deployments.into_iter().filter(|d| !is_verified(d)).collect();

    let checks = stream::iter(candidates.into_iter().map(|d| {
        let client = client;
        async move {
            let empty = client.code_at(options.chain_id, &d.address).await.map(|code| code.is_empty()).unwrap_or(false);
            (d, empty)
        }
    }))
    .buffer_unordered(concurrency)
    .collect::<Vec<_>>()
    .await;

    for (deployment, has_no_code) in checks {
        if has_no_code {
            changeset.deployments.delete.push(deployment.id.clone());
            report.deployments_pruned.push(deployment.id);
        }
    }

    let transactions = registry.list_transactions(options.chain_id);
    let prunable_transactions: Vec<_> = transactions
        .into_iter()
        .filter(|t| t.hash.is_some())
        .filter(|t| options.include_pending || !matches!(t.status, TransactionStatus::Queued | TransactionStatus::Simulated))
        .collect();

    let tx_checks = stream::iter(prunable_transactions.into_iter().map(|t| {
        let client = client;
        async move {
            let hash = t.hash.clone().unwrap_or_default();
            let exists = client.tx_receipt_exists(options.chain_id, &hash).await.unwrap_or(true);
            (t, exists)
        }
    }))
    .buffer_unordered(concurrency)
    .collect::<Vec<_>>()
    .await;

    for (tx, has_receipt) in tx_checks {
        if !has_receipt {
            changeset.transactions.delete.push(tx.id.clone());
            report.transactions_pruned.push(tx.id);
        }
    }

    Ok((changeset, report))
}
