//! The registry store (C1): a single directory holding the four JSON files, guarded by a
//! process-wide reader/writer lock plus a best-effort cross-process advisory lock around
//! mutation, with lookup indices rebuilt after every change.

use crate::changeset::Changeset;
use crate::indices::Indices;
use crate::model::{
    Deployment, GovernorProposal, GovernorStatus, SafeTransaction, Transaction, TransactionStatus,
    VerificationStatus, VerifierResult,
};
use crate::registry_json;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use treb_common::error::{Result, TrebError};
use treb_common::ids::ChainId;
use treb_common::lock::AdvisoryLock;
use treb_common::{fs as tfs, time::now};

const DEPLOYMENTS_FILE: &str = "deployments.json";
const TRANSACTIONS_FILE: &str = "transactions.json";
const SAFE_TXS_FILE: &str = "safe-txs.json";
const GOVERNOR_PROPOSALS_FILE: &str = "governor-proposals.json";
const REGISTRY_FILE: &str = "registry.json";

/// Conjunctive filter for [`RegistryStore::list`]; an empty field matches all.
#[derive(Debug, Clone, Default)]
pub struct DeploymentFilter {
    pub namespace: Option<String>,
    pub chain_id: Option<ChainId>,
    pub contract_name: Option<String>,
    pub label: Option<String>,
    pub kind: Option<crate::model::DeploymentType>,
}

impl DeploymentFilter {
    fn matches(&self, d: &Deployment) -> bool {
        self.namespace.as_deref().map(|n| n == d.namespace).unwrap_or(true)
            && self.chain_id.map(|c| c == d.chain_id).unwrap_or(true)
            && self.contract_name.as_deref().map(|c| c == d.contract_name).unwrap_or(true)
            && self.label.as_deref().map(|l| l == d.label).unwrap_or(true)
            && self.kind.map(|k| k == d.kind).unwrap_or(true)
    }
}

/// Outcome of [`RegistryStore::tag`]: tagging is idempotent, but the caller can still observe
/// whether the tag was newly added or already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    Added,
    AlreadyExists,
}

struct RegistryState {
    deployments: BTreeMap<String, Deployment>,
    transactions: BTreeMap<String, Transaction>,
    safe_txs: BTreeMap<String, SafeTransaction>,
    governor_proposals: BTreeMap<String, GovernorProposal>,
    indices: Indices,
}

impl RegistryState {
    fn rebuild_indices(&mut self) {
        self.indices = Indices::rebuild(self.deployments.values(), self.safe_txs.values());
    }
}

pub struct RegistryStore {
    dir: PathBuf,
    state: RwLock<RegistryState>,
}

impl RegistryStore {
    /// Opens (creating if absent) the registry directory and loads its four JSON files. A
    /// missing file is treated as empty, per the on-disk registry layout.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let deployments: BTreeMap<String, Deployment> =
            tfs::read_json_or_default(&dir.join(DEPLOYMENTS_FILE))?;
        let transactions: BTreeMap<String, Transaction> =
            tfs::read_json_or_default(&dir.join(TRANSACTIONS_FILE))?;
        let safe_txs: BTreeMap<String, SafeTransaction> =
            tfs::read_json_or_default(&dir.join(SAFE_TXS_FILE))?;
        let governor_proposals: BTreeMap<String, GovernorProposal> =
            tfs::read_json_or_default(&dir.join(GOVERNOR_PROPOSALS_FILE))?;

        let mut state = RegistryState {
            deployments,
            transactions,
            safe_txs,
            governor_proposals,
            indices: Indices::default(),
        };
        state.rebuild_indices();

        Ok(Self { dir, state: RwLock::new(state) })
    }

    fn persist(&self, state: &RegistryState) -> Result<()> {
        let _lock = AdvisoryLock::acquire(&self.dir)?;
        tfs::write_json_atomic(&self.dir.join(DEPLOYMENTS_FILE), &state.deployments)?;
        tfs::write_json_atomic(&self.dir.join(TRANSACTIONS_FILE), &state.transactions)?;
        tfs::write_json_atomic(&self.dir.join(SAFE_TXS_FILE), &state.safe_txs)?;
        tfs::write_json_atomic(&self.dir.join(GOVERNOR_PROPOSALS_FILE), &state.governor_proposals)?;
        let flattened = registry_json::build(state.deployments.values());
        tfs::write_json_atomic(&self.dir.join(REGISTRY_FILE), &flattened)?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    // ---- reads ----

    pub fn get(&self, id: &str) -> Result<Deployment> {
        self.state
            .read()
            .deployments
            .get(id)
            .cloned()
            .ok_or_else(|| TrebError::NotFound(format!("deployment `{id}`")))
    }

    pub fn get_by_address(&self, chain_id: ChainId, address: &str) -> Result<Deployment> {
        let state = self.state.read();
        let id = state
            .indices
            .by_address
            .get(&chain_id)
            .and_then(|m| m.get(address))
            .ok_or_else(|| TrebError::NotFound(format!("deployment at {chain_id}/{address}")))?;
        state
            .deployments
            .get(id)
            .cloned()
            .ok_or_else(|| TrebError::NotFound(format!("deployment `{id}`")))
    }

    pub fn get_transaction(&self, id: &str) -> Result<Transaction> {
        self.state
            .read()
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| TrebError::NotFound(format!("transaction `{id}`")))
    }

    pub fn get_safe_tx(&self, safe_tx_hash: &str) -> Result<SafeTransaction> {
        self.state
            .read()
            .safe_txs
            .get(safe_tx_hash)
            .cloned()
            .ok_or_else(|| TrebError::NotFound(format!("safe tx `{safe_tx_hash}`")))
    }

    pub fn list(&self, filter: &DeploymentFilter) -> Vec<Deployment> {
        self.state.read().deployments.values().filter(|d| filter.matches(d)).cloned().collect()
    }

    pub fn list_transactions(&self, chain_id: ChainId) -> Vec<Transaction> {
        self.state.read().transactions.values().filter(|t| t.chain_id == chain_id).cloned().collect()
    }

    pub fn pending_safe_tx_hashes(&self) -> Vec<String> {
        self.state.read().indices.pending_safe_txs.clone()
    }

    pub fn get_governor_proposal(&self, id: &str) -> Result<GovernorProposal> {
        self.state
            .read()
            .governor_proposals
            .get(id)
            .cloned()
            .ok_or_else(|| TrebError::NotFound(format!("governor proposal `{id}`")))
    }

    /// Ids of proposals not yet in a terminal state (`Executed`, `Canceled`, `Defeated`).
    pub fn pending_governor_proposal_ids(&self) -> Vec<String> {
        self.state
            .read()
            .governor_proposals
            .values()
            .filter(|p| matches!(p.status, GovernorStatus::Pending | GovernorStatus::Active | GovernorStatus::Succeeded | GovernorStatus::Queued))
            .map(|p| p.proposal_id.clone())
            .collect()
    }

    pub fn proxy_implementation(&self, proxy_address: &str) -> Option<String> {
        self.state.read().indices.proxies.proxy_to_impl.get(proxy_address).cloned()
    }

    // ---- writes ----

    pub fn save_deployment(&self, mut deployment: Deployment) -> Result<()> {
        if deployment.id.is_empty() {
            return Err(TrebError::InvalidArgument("deployment id must not be empty".into()));
        }
        let mut state = self.state.write();
        let timestamp = now();
        if let Some(existing) = state.deployments.get(&deployment.id) {
            deployment.created_at = existing.created_at;
        } else {
            deployment.created_at = timestamp;
        }
        deployment.updated_at = timestamp;
        deployment.validate()?;
        state.deployments.insert(deployment.id.clone(), deployment);
        state.rebuild_indices();
        self.persist(&state)
    }

    pub fn save_transaction(&self, mut tx: Transaction) -> Result<()> {
        if tx.id.is_empty() {
            return Err(TrebError::InvalidArgument("transaction id must not be empty".into()));
        }
        let mut state = self.state.write();
        let timestamp = now();
        if let Some(existing) = state.transactions.get(&tx.id) {
            tx.created_at = existing.created_at;
        } else {
            tx.created_at = timestamp;
        }
        tx.updated_at = timestamp;
        tx.validate()?;
        state.transactions.insert(tx.id.clone(), tx);
        state.rebuild_indices();
        self.persist(&state)
    }

    pub fn save_safe_tx(&self, safe_tx: SafeTransaction) -> Result<()> {
        if safe_tx.safe_tx_hash.is_empty() {
            return Err(TrebError::InvalidArgument("safeTxHash must not be empty".into()));
        }
        safe_tx.validate()?;
        let mut state = self.state.write();
        state.safe_txs.insert(safe_tx.safe_tx_hash.clone(), safe_tx);
        state.rebuild_indices();
        self.persist(&state)
    }

    pub fn save_governor_proposal(&self, proposal: GovernorProposal) -> Result<()> {
        if proposal.proposal_id.is_empty() {
            return Err(TrebError::InvalidArgument("proposalId must not be empty".into()));
        }
        let mut state = self.state.write();
        state.governor_proposals.insert(proposal.proposal_id.clone(), proposal);
        state.rebuild_indices();
        self.persist(&state)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();
        if state.deployments.remove(id).is_none() {
            return Err(TrebError::NotFound(format!("deployment `{id}`")));
        }
        state.rebuild_indices();
        self.persist(&state)
    }

    pub fn tag(&self, id: &str, tag: &str) -> Result<TagOutcome> {
        let mut state = self.state.write();
        let deployment = state
            .deployments
            .get_mut(id)
            .ok_or_else(|| TrebError::NotFound(format!("deployment `{id}`")))?;
        if !deployment.tags.insert(tag.to_string()) {
            return Ok(TagOutcome::AlreadyExists);
        }
        deployment.updated_at = now();
        self.persist(&state)?;
        Ok(TagOutcome::Added)
    }

    pub fn update_verification(
        &self,
        id: &str,
        status: VerificationStatus,
        verifiers: BTreeMap<String, VerifierResult>,
        reason: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let deployment = state
            .deployments
            .get_mut(id)
            .ok_or_else(|| TrebError::NotFound(format!("deployment `{id}`")))?;
        deployment.verification.verifiers = verifiers;
        let was_verified = deployment.verification.status == Some(VerificationStatus::Verified);
        deployment.verification.status = Some(status);
        deployment.verification.reason = reason;
        if status == VerificationStatus::Verified && !was_verified {
            deployment.verification.verified_at = Some(now());
        }
        if let Some(first_verified_url) =
            deployment.verification.verifiers.values().find_map(|v| {
                (v.status == VerificationStatus::Verified).then(|| v.url.clone()).flatten()
            })
        {
            deployment.verification.etherscan_url = Some(first_verified_url);
        }
        deployment.updated_at = now();
        deployment.validate()?;
        self.persist(&state)
    }

    /// Applies a changeset's create/update/delete sets in that order within a single lock.
    /// All-or-nothing on serialization failure, not on semantic conflict — a transaction whose
    /// incoming status would be a lattice downgrade is simply skipped rather than aborting the
    /// whole changeset, which is what makes applying the same changeset twice idempotent.
    pub fn apply_changeset(&self, changeset: Changeset) -> Result<()> {
        let mut state = self.state.write();
        let timestamp = now();

        for d in changeset.deployments.create.into_iter().chain(changeset.deployments.update) {
            upsert_deployment(&mut state.deployments, d, timestamp)?;
        }
        for id in changeset.deployments.delete {
            state.deployments.remove(&id);
        }

        for tx in changeset.transactions.create.into_iter().chain(changeset.transactions.update) {
            upsert_transaction(&mut state.transactions, tx, timestamp)?;
        }
        for id in changeset.transactions.delete {
            state.transactions.remove(&id);
        }

        for safe_tx in changeset.safe_txs.create.into_iter().chain(changeset.safe_txs.update) {
            upsert_safe_tx(&mut state.safe_txs, safe_tx)?;
        }
        for id in changeset.safe_txs.delete {
            state.safe_txs.remove(&id);
        }

        for proposal in
            changeset.governor_proposals.create.into_iter().chain(changeset.governor_proposals.update)
        {
            state.governor_proposals.insert(proposal.proposal_id.clone(), proposal);
        }
        for id in changeset.governor_proposals.delete {
            state.governor_proposals.remove(&id);
        }

        state.rebuild_indices();
        self.persist(&state)
    }
}

fn upsert_deployment(
    table: &mut BTreeMap<String, Deployment>,
    mut incoming: Deployment,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    match table.get(&incoming.id) {
        Some(existing) => {
            incoming.created_at = existing.created_at;
        }
        None => incoming.created_at = timestamp,
    }
    incoming.updated_at = timestamp;
    incoming.validate()?;
    table.insert(incoming.id.clone(), incoming);
    Ok(())
}

/// Merges an incoming transaction on `(hash or transactionId)`, upgrading status only in the
/// lattice `Simulated < Queued < Executed` and `Simulated < Failed`. Downgrades are dropped.
fn upsert_transaction(
    table: &mut BTreeMap<String, Transaction>,
    mut incoming: Transaction,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> Result<()> {
    incoming.validate()?;
    match table.get(&incoming.id) {
        None => {
            incoming.created_at = timestamp;
            incoming.updated_at = timestamp;
            table.insert(incoming.id.clone(), incoming);
        }
        Some(existing) => {
            if !existing.status.can_advance_to(incoming.status) {
                tracing::debug!(
                    target: "treb::registry",
                    tx = %incoming.id,
                    from = ?existing.status,
                    to = ?incoming.status,
                    "dropping transaction status downgrade"
                );
                return Ok(());
            }
            let created_at = existing.created_at;
            incoming.created_at = created_at;
            incoming.updated_at = timestamp;
            table.insert(incoming.id.clone(), incoming);
        }
    }
    Ok(())
}

/// Merges on `safeTxHash`; a `Queued -> Executed` transition requires a non-empty
/// `executionTxHash`.
fn upsert_safe_tx(table: &mut BTreeMap<String, SafeTransaction>, incoming: SafeTransaction) -> Result<()> {
    incoming.validate()?;
    if let Some(existing) = table.get(&incoming.safe_tx_hash) {
        if existing.status == TransactionStatus::Queued
            && incoming.status == TransactionStatus::Executed
            && incoming.execution_tx_hash.is_none()
        {
            return Err(TrebError::InvalidArgument(format!(
                "safe tx `{}` transitioning to Executed needs an executionTxHash",
                incoming.safe_tx_hash
            )));
        }
        if !existing.status.can_advance_to(incoming.status) {
            return Ok(());
        }
    }
    table.insert(incoming.safe_tx_hash.clone(), incoming);
    Ok(())
}
