//! Changeset builder (C8): converts a hydrated run result plus inferred proxy relationships
//! into the create/update/delete sets `RegistryStore::apply_changeset` applies atomically.

use crate::model::HydratedRunResult;
use crate::proxy::ProxyRelationship;
use chrono::Utc;
use treb_common::ids::{deployment_id, transaction_id_from_hash, transaction_id_from_script_id, ChainId};
use treb_registry::model::{
    ArtifactInfo, Deployment, DeploymentMethod, DeploymentStrategy, DeploymentType, ProxyInfo, ProxyUpgrade,
    SafeContext, SafeTransaction, SafeTxEntry, SafeTxOperation, Transaction, TransactionStatus, VerificationInfo,
};
use treb_registry::{Changeset, RegistryStore};
use std::collections::BTreeMap;

/// Context the builder needs beyond the hydrated result: the active namespace/chain and the
/// existing registry state used to decide create-vs-update.
pub struct BuildContext<'a> {
    pub namespace: String,
    pub chain_id: ChainId,
    pub registry: &'a RegistryStore,
    pub script_path: String,
}

fn contract_name_from_artifact(artifact: &str) -> String {
    artifact.rsplit(':').next().unwrap_or(artifact).to_string()
}

/// Builds a [`Changeset`] from `result`, folding in `proxies` (the C7 output) per deployment.
pub fn build(result: &HydratedRunResult, proxies: &BTreeMap<String, ProxyRelationship>, ctx: &BuildContext<'_>) -> Changeset {
    let mut changeset = Changeset::default();
    let now = Utc::now();

    // Maps a script-level `transactionId` (the raw bytes32 hex from the event) to the id the
    // matching `Transaction` row is stored under in the registry, so back-references from
    // deployments and proxy history point at a real row instead of the raw script id.
    let tx_ids: BTreeMap<String, String> = result
        .transactions
        .iter()
        .filter_map(|tx| {
            let script_id = tx.transaction_id.clone()?;
            let id = match &tx.hash {
                Some(hash) => transaction_id_from_hash(hash),
                None => transaction_id_from_script_id(&script_id),
            };
            Some((script_id, id))
        })
        .collect();

    let resolve_tx_id = |script_id: &str| -> String {
        tx_ids.get(script_id).cloned().unwrap_or_else(|| transaction_id_from_script_id(script_id))
    };

    for event in &result.deployments {
        let contract_name = contract_name_from_artifact(&event.artifact);
        let proxy_relationship = proxies.get(&event.location);
        let transaction_id = resolve_tx_id(&event.transaction_id);

        let proxy_info = proxy_relationship.map(|rel| ProxyInfo {
            kind: rel.kind,
            implementation: rel.implementation.clone().unwrap_or_default(),
            admin: rel.admin.clone(),
            beacon: rel.beacon.clone(),
            history: rel
                .implementation
                .as_ref()
                .map(|imp| vec![ProxyUpgrade { implementation: imp.clone(), upgraded_at: now, transaction_id: Some(transaction_id.clone()) }])
                .unwrap_or_default(),
        });

        let kind = if proxy_info.is_some() { DeploymentType::Proxy } else { DeploymentType::Singleton };

        let method = event.create_strategy.parse::<DeploymentMethod>().unwrap_or(DeploymentMethod::Create2);

        let mut deployment = Deployment {
            id: deployment_id(&ctx.namespace, ctx.chain_id, &contract_name, &event.label),
            namespace: ctx.namespace.clone(),
            chain_id: ctx.chain_id,
            contract_name,
            label: event.label.clone(),
            address: event.location.clone(),
            kind,
            deployment_strategy: DeploymentStrategy {
                method,
                salt: Some(event.salt.clone()),
                init_code_hash: Some(event.init_code_hash.clone()),
                factory: None,
                constructor_args: Some(event.constructor_args.clone()),
                entropy: Some(event.entropy.clone()),
            },
            proxy_info,
            artifact: ArtifactInfo {
                path: event.artifact.clone(),
                compiler_version: String::new(),
                bytecode_hash: event.bytecode_hash.clone(),
                script_path: ctx.script_path.clone(),
                git_commit: None,
            },
            verification: VerificationInfo::default(),
            transaction_id: Some(transaction_id),
            tags: Default::default(),
            created_at: now,
            updated_at: now,
        };

        match ctx.registry.get_by_address(ctx.chain_id, &event.location) {
            Ok(existing) if existing.id != deployment.id => {
                deployment.id = existing.id.clone();
                deployment.created_at = existing.created_at;
                deployment.tags = existing.tags.clone();
                changeset.deployments.update.push(deployment);
            }
            Ok(existing) => {
                deployment.created_at = existing.created_at;
                deployment.tags = existing.tags.clone();
                changeset.deployments.update.push(deployment);
            }
            Err(_) => changeset.deployments.create.push(deployment),
        }
    }

    for tx in &result.transactions {
        let id = match (&tx.hash, &tx.transaction_id) {
            (Some(hash), _) => transaction_id_from_hash(hash),
            (None, Some(script_id)) => transaction_id_from_script_id(script_id),
            (None, None) => format!("tx-unresolved-{}", tx.sender),
        };
        let status = if tx.executed && tx.hash.is_some() { TransactionStatus::Executed } else { TransactionStatus::Simulated };

        let deployments: Vec<String> = result
            .deployments
            .iter()
            .filter(|d| tx.transaction_id.as_deref() == Some(d.transaction_id.as_str()))
            .map(|d| deployment_id(&ctx.namespace, ctx.chain_id, &contract_name_from_artifact(&d.artifact), &d.label))
            .collect();

        let transaction = Transaction {
            id,
            chain_id: ctx.chain_id,
            hash: tx.hash.clone(),
            block_number: tx.block_number,
            sender: tx.sender.clone(),
            nonce: None,
            status,
            deployments,
            operations: Vec::new(),
            safe_context: None,
            created_at: now,
            updated_at: now,
        };
        changeset.transactions.create.push(transaction);
    }

    for queued in &result.safe_queued {
        let safe_tx = SafeTransaction {
            safe_tx_hash: queued.safe_tx_hash.clone(),
            chain_id: ctx.chain_id,
            safe_address: queued.safe.clone(),
            nonce: 0,
            status: TransactionStatus::Queued,
            transactions: queued
                .transaction_ids
                .iter()
                .map(|_| SafeTxEntry { to: String::new(), value: "0".to_string(), data: "0x".to_string(), operation: SafeTxOperation::Call })
                .collect(),
            transaction_ids: queued.transaction_ids.clone(),
            proposed_by: queued.proposer.clone(),
            proposed_at: now,
            confirmations: Vec::new(),
            executed_at: None,
            execution_tx_hash: None,
        };
        changeset.safe_txs.create.push(safe_tx);
    }

    for executed in &result.safe_executed {
        if let Ok(mut existing) = ctx.registry.get_safe_tx(&executed.safe_tx_hash) {
            existing.status = TransactionStatus::Executed;
            existing.executed_at = Some(now);
            changeset.safe_txs.update.push(existing);
        }
    }

    for tx in &result.transactions {
        if let Some(safe_hash) = result.safe_queued.iter().find(|q| q.transaction_ids.iter().any(|id| Some(id.as_str()) == tx.transaction_id.as_deref())) {
            if let Some(last) = changeset.transactions.create.last_mut() {
                last.safe_context = Some(SafeContext {
                    safe_address: safe_hash.safe.clone(),
                    safe_tx_hash: safe_hash.safe_tx_hash.clone(),
                    batch_index: 0,
                    proposer_address: safe_hash.proposer.clone(),
                });
            }
        }
    }

    changeset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeploymentEvent;

    fn sample_event() -> DeploymentEvent {
        DeploymentEvent {
            deployer: "0xd".into(),
            location: "0x1111111111111111111111111111111111111111".into(),
            transaction_id: "0xtx".into(),
            artifact: "src/Counter.sol:Counter".into(),
            label: String::new(),
            entropy: "e".into(),
            salt: "0x0".into(),
            bytecode_hash: "0xbc".into(),
            init_code_hash: "0xic".into(),
            constructor_args: "0x".into(),
            create_strategy: "CREATE2".into(),
        }
    }

    #[test]
    fn contract_name_extracted_from_artifact_path() {
        assert_eq!(contract_name_from_artifact("src/Counter.sol:Counter"), "Counter");
        assert_eq!(contract_name_from_artifact("Counter"), "Counter");
    }

    #[test]
    fn new_deployment_creates_fresh_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(dir.path()).unwrap();
        let mut result = HydratedRunResult::default();
        result.deployments.push(sample_event());
        let ctx = BuildContext { namespace: "default".into(), chain_id: 1, registry: &registry, script_path: "script/Deploy.s.sol".into() };
        let changeset = build(&result, &BTreeMap::new(), &ctx);
        assert_eq!(changeset.deployments.create.len(), 1);
        assert_eq!(changeset.deployments.update.len(), 0);
    }

    #[test]
    fn deployment_transaction_id_matches_the_stored_transaction_row() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(dir.path()).unwrap();
        let mut result = HydratedRunResult::default();
        result.deployments.push(sample_event());
        result.transactions.push(crate::model::HydratedTransaction {
            transaction_id: Some("0xtx".into()),
            hash: None,
            block_number: None,
            sender: "0xd".into(),
            to: String::new(),
            data: "0x".into(),
            value: "0".into(),
            executed: false,
        });
        let ctx = BuildContext { namespace: "default".into(), chain_id: 1, registry: &registry, script_path: "script/Deploy.s.sol".into() };
        let changeset = build(&result, &BTreeMap::new(), &ctx);

        let transaction = &changeset.transactions.create[0];
        assert!(transaction.id.starts_with("tx-"));
        assert_ne!(transaction.id, "0xtx");

        let deployment = &changeset.deployments.create[0];
        assert_eq!(deployment.transaction_id.as_deref(), Some(transaction.id.as_str()));
    }
}
