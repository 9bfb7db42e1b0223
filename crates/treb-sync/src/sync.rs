//! Safe/Governor sync (C9): polls pending Safe batches and governor proposals and folds any
//! state transitions into a single changeset applied atomically by the caller.

use crate::model::{GovernorStatusReport, RecordOutcome, RemoteGovernorStatus, RemoteSafeStatus, SafeStatusReport, SyncReport};
use crate::services::{GovernorClient, SafeTransactionService};
use futures::stream::{self, StreamExt};
use treb_common::error::Result;
use treb_registry::model::{GovernorStatus, TransactionStatus};
use treb_registry::{Changeset, RegistryStore};

/// Default bound on concurrent in-flight requests, per the concurrency model's "bounded worker
/// pool" sizing for C9/C10/C11.
pub const DEFAULT_CONCURRENCY: usize = 8;

pub struct SyncContext<'a> {
    pub registry: &'a RegistryStore,
    pub safe_service: &'a dyn SafeTransactionService,
    pub governor_client: &'a dyn GovernorClient,
    pub concurrency: usize,
}

impl<'a> SyncContext<'a> {
    pub fn new(registry: &'a RegistryStore, safe_service: &'a dyn SafeTransactionService, governor_client: &'a dyn GovernorClient) -> Self {
        Self { registry, safe_service, governor_client, concurrency: DEFAULT_CONCURRENCY }
    }
}

enum SafePoll {
    Unchanged,
    Executed { hash: String, report: SafeStatusReport },
    Canceled { hash: String },
    Failed { hash: String, error: String },
}

async fn poll_safe_tx(registry: &RegistryStore, service: &dyn SafeTransactionService, safe_tx_hash: String) -> SafePoll {
    let safe_tx = match registry.get_safe_tx(&safe_tx_hash) {
        Ok(tx) => tx,
        Err(e) => return SafePoll::Failed { hash: safe_tx_hash, error: e.to_string() },
    };
    match service.status(safe_tx.chain_id, &safe_tx.safe_address, &safe_tx_hash).await {
        Ok(report) => match report.status {
            RemoteSafeStatus::Executed => SafePoll::Executed { hash: safe_tx_hash, report },
            RemoteSafeStatus::Canceled => SafePoll::Canceled { hash: safe_tx_hash },
            RemoteSafeStatus::Pending => SafePoll::Unchanged,
        },
        Err(e) => SafePoll::Failed { hash: safe_tx_hash, error: e.to_string() },
    }
}

enum GovernorPoll {
    Unchanged,
    Executed { id: String, report: GovernorStatusReport },
    Terminated { id: String, status: GovernorStatus },
    Failed { id: String, error: String },
}

async fn poll_governor_proposal(registry: &RegistryStore, client: &dyn GovernorClient, proposal_id: String) -> GovernorPoll {
    let proposal = match registry.get_governor_proposal(&proposal_id) {
        Ok(p) => p,
        Err(e) => return GovernorPoll::Failed { id: proposal_id, error: e.to_string() },
    };
    match client.status(proposal.chain_id, &proposal.governor_address, &proposal_id).await {
        Ok(report) => match report.status {
            RemoteGovernorStatus::Executed => GovernorPoll::Executed { id: proposal_id, report },
            RemoteGovernorStatus::Canceled => GovernorPoll::Terminated { id: proposal_id, status: GovernorStatus::Canceled },
            RemoteGovernorStatus::Defeated => GovernorPoll::Terminated { id: proposal_id, status: GovernorStatus::Defeated },
            _ => GovernorPoll::Unchanged,
        },
        Err(e) => GovernorPoll::Failed { id: proposal_id, error: e.to_string() },
    }
}

/// Polls every `Queued` Safe batch and non-terminal governor proposal, applies resulting
/// transitions as a single changeset, and returns a per-record report. A network failure on one
/// record never blocks the others, nor does it fail the whole sync.
pub async fn sync(ctx: &SyncContext<'_>) -> Result<SyncReport> {
    let concurrency = ctx.concurrency.max(1);
    let mut changeset = Changeset::default();
    let mut outcomes = Vec::new();

    let safe_hashes = ctx.registry.pending_safe_tx_hashes();
    let safe_polls: Vec<SafePoll> = stream::iter(safe_hashes.into_iter().map(|hash| poll_safe_tx(ctx.registry, ctx.safe_service, hash)))
        .buffer_unordered(concurrency)
        .collect()
        .await;

    for poll in safe_polls {
        match poll {
            SafePoll::Unchanged => outcomes.push(RecordOutcome::Unchanged),
            SafePoll::Failed { hash, error } => {
                tracing::warn!(safe_tx_hash = %hash, %error, "safe transaction service poll failed");
                outcomes.push(RecordOutcome::Failed { record_id: hash, error });
            }
            SafePoll::Canceled { hash } => {
                if let Ok(mut safe_tx) = ctx.registry.get_safe_tx(&hash) {
                    safe_tx.status = TransactionStatus::Failed;
                    changeset.safe_txs.update.push(safe_tx);
                }
                outcomes.push(RecordOutcome::Terminated { record_id: hash });
            }
            SafePoll::Executed { hash, report } => {
                if let Ok(mut safe_tx) = ctx.registry.get_safe_tx(&hash) {
                    safe_tx.status = TransactionStatus::Executed;
                    safe_tx.execution_tx_hash = report.execution_tx_hash.clone();
                    for tx_id in &safe_tx.transaction_ids {
                        if let Ok(mut tx) = ctx.registry.get_transaction(tx_id) {
                            tx.status = TransactionStatus::Executed;
                            tx.hash = report.execution_tx_hash.clone();
                            tx.block_number = report.block_number.or(tx.block_number);
                            changeset.transactions.update.push(tx);
                        }
                    }
                    changeset.safe_txs.update.push(safe_tx);
                }
                outcomes.push(RecordOutcome::Executed { record_id: hash });
            }
        }
    }

    let proposal_ids = ctx.registry.pending_governor_proposal_ids();
    let governor_polls: Vec<GovernorPoll> = stream::iter(
        proposal_ids.into_iter().map(|id| poll_governor_proposal(ctx.registry, ctx.governor_client, id)),
    )
    .buffer_unordered(concurrency)
    .collect()
    .await;

    for poll in governor_polls {
        match poll {
            GovernorPoll::Unchanged => outcomes.push(RecordOutcome::Unchanged),
            GovernorPoll::Failed { id, error } => {
                tracing::warn!(proposal_id = %id, %error, "governor client poll failed");
                outcomes.push(RecordOutcome::Failed { record_id: id, error });
            }
            GovernorPoll::Terminated { id, status } => {
                if let Ok(mut proposal) = ctx.registry.get_governor_proposal(&id) {
                    proposal.status = status;
                    changeset.governor_proposals.update.push(proposal);
                }
                outcomes.push(RecordOutcome::Terminated { record_id: id });
            }
            GovernorPoll::Executed { id, report } => {
                if let Ok(mut proposal) = ctx.registry.get_governor_proposal(&id) {
                    proposal.status = GovernorStatus::Executed;
                    proposal.execution_tx_hash = report.execution_tx_hash.clone();
                    for tx_id in &proposal.transaction_ids {
                        if let Ok(mut tx) = ctx.registry.get_transaction(tx_id) {
                            tx.status = TransactionStatus::Executed;
                            tx.hash = report.execution_tx_hash.clone();
                            tx.block_number = report.block_number.or(tx.block_number);
                            changeset.transactions.update.push(tx);
                        }
                    }
                    changeset.governor_proposals.update.push(proposal);
                }
                outcomes.push(RecordOutcome::Executed { record_id: id });
            }
        }
    }

    if !changeset.is_empty() {
        ctx.registry.apply_changeset(changeset)?;
    }

    Ok(SyncReport { outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use treb_common::error::TrebError;
    use treb_registry::model::{SafeTransaction, SafeTxEntry, SafeTxOperation, Transaction};

    struct FakeSafeService {
        reports: Mutex<std::collections::BTreeMap<String, Result<SafeStatusReport>>>,
    }

    #[async_trait]
    impl SafeTransactionService for FakeSafeService {
        async fn status(&self, _chain_id: u64, _safe_address: &str, safe_tx_hash: &str) -> Result<SafeStatusReport> {
            match self.reports.lock().unwrap().remove(safe_tx_hash) {
                Some(Ok(report)) => Ok(report),
                Some(Err(e)) => Err(e),
                None => Err(TrebError::NotFound("no fake report registered".into())),
            }
        }
    }

    struct FakeGovernorClient;

    #[async_trait]
    impl GovernorClient for FakeGovernorClient {
        async fn status(&self, _chain_id: u64, _governor_address: &str, _proposal_id: &str) -> Result<GovernorStatusReport> {
            Err(TrebError::NotFound("not used in this test".into()))
        }
    }

    struct FakeGovernorClientWithStatus(RemoteGovernorStatus);

    #[async_trait]
    impl GovernorClient for FakeGovernorClientWithStatus {
        async fn status(&self, _chain_id: u64, _governor_address: &str, _proposal_id: &str) -> Result<GovernorStatusReport> {
            Ok(GovernorStatusReport { status: self.0, execution_tx_hash: None, block_number: None, gas_used: None })
        }
    }

    fn sample_governor_proposal(id: &str) -> treb_registry::model::GovernorProposal {
        treb_registry::model::GovernorProposal {
            proposal_id: id.to_string(),
            governor_address: "0xGov".into(),
            timelock_address: None,
            chain_id: 1,
            status: GovernorStatus::Active,
            transactions: Vec::new(),
            transaction_ids: Vec::new(),
            proposed_by: "0xP".into(),
            proposed_at: Utc::now(),
            executed_at: None,
            execution_tx_hash: None,
        }
    }

    fn sample_safe_tx(hash: &str) -> SafeTransaction {
        SafeTransaction {
            safe_tx_hash: hash.to_string(),
            chain_id: 1,
            safe_address: "0xSafe".into(),
            nonce: 0,
            status: TransactionStatus::Queued,
            transactions: vec![SafeTxEntry { to: "0xT".into(), value: "0".into(), data: "0x".into(), operation: SafeTxOperation::Call }],
            transaction_ids: vec!["tx-1".into()],
            proposed_by: "0xP".into(),
            proposed_at: Utc::now(),
            confirmations: Vec::new(),
            executed_at: None,
            execution_tx_hash: None,
        }
    }

    fn sample_transaction(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            chain_id: 1,
            hash: None,
            block_number: None,
            sender: "0xS".into(),
            nonce: None,
            status: TransactionStatus::Queued,
            deployments: Vec::new(),
            operations: Vec::new(),
            safe_context: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn executed_safe_tx_advances_status_and_links_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(dir.path()).unwrap();
        registry.save_safe_tx(sample_safe_tx("0xhash1")).unwrap();
        registry.save_transaction(sample_transaction("tx-1")).unwrap();

        let mut reports = std::collections::BTreeMap::new();
        reports.insert(
            "0xhash1".to_string(),
            Ok(SafeStatusReport { status: RemoteSafeStatus::Executed, execution_tx_hash: Some("0xexec".into()), block_number: Some(42), gas_used: Some(21000) }),
        );
        let safe_service = FakeSafeService { reports: Mutex::new(reports) };
        let governor_client = FakeGovernorClient;
        let ctx = SyncContext::new(&registry, &safe_service, &governor_client);

        let report = sync(&ctx).await.unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(report.outcomes[0], RecordOutcome::Executed { .. }));

        let safe_tx = registry.get_safe_tx("0xhash1").unwrap();
        assert_eq!(safe_tx.status, TransactionStatus::Executed);
        let tx = registry.get_transaction("tx-1").unwrap();
        assert_eq!(tx.status, TransactionStatus::Executed);
        assert_eq!(tx.hash.as_deref(), Some("0xexec"));
        assert_eq!(tx.block_number, Some(42));
    }

    #[tokio::test]
    async fn network_failure_is_non_fatal_and_leaves_record_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(dir.path()).unwrap();
        registry.save_safe_tx(sample_safe_tx("0xhash2")).unwrap();

        let mut reports = std::collections::BTreeMap::new();
        reports.insert("0xhash2".to_string(), Err(TrebError::ExternalToolFailure { tool: "safe-service".into(), reason: "timeout".into() }));
        let safe_service = FakeSafeService { reports: Mutex::new(reports) };
        let governor_client = FakeGovernorClient;
        let ctx = SyncContext::new(&registry, &safe_service, &governor_client);

        let report = sync(&ctx).await.unwrap();
        assert!(matches!(report.outcomes[0], RecordOutcome::Failed { .. }));
        let safe_tx = registry.get_safe_tx("0xhash2").unwrap();
        assert_eq!(safe_tx.status, TransactionStatus::Queued);
    }

    #[tokio::test]
    async fn canceled_and_defeated_proposals_map_to_distinct_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(dir.path()).unwrap();
        registry.save_governor_proposal(sample_governor_proposal("prop-canceled")).unwrap();

        let safe_service = FakeSafeService { reports: Mutex::new(std::collections::BTreeMap::new()) };
        let governor_client = FakeGovernorClientWithStatus(RemoteGovernorStatus::Canceled);
        let ctx = SyncContext::new(&registry, &safe_service, &governor_client);
        sync(&ctx).await.unwrap();
        let proposal = registry.get_governor_proposal("prop-canceled").unwrap();
        assert_eq!(proposal.status, GovernorStatus::Canceled);

        registry.save_governor_proposal(sample_governor_proposal("prop-defeated")).unwrap();
        let governor_client = FakeGovernorClientWithStatus(RemoteGovernorStatus::Defeated);
        let ctx = SyncContext::new(&registry, &safe_service, &governor_client);
        sync(&ctx).await.unwrap();
        let proposal = registry.get_governor_proposal("prop-defeated").unwrap();
        assert_eq!(proposal.status, GovernorStatus::Defeated);
    }
}
