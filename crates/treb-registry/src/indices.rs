//! Lookup indices, rebuilt from the canonical tables after every mutation — never persisted.

use crate::model::{Deployment, SafeTransaction, TransactionStatus};
use std::collections::BTreeMap;
use treb_common::ids::ChainId;

#[derive(Debug, Clone, Default)]
pub struct ProxyIndex {
    pub implementations: BTreeMap<String, Vec<String>>,
    pub proxy_to_impl: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Indices {
    pub by_address: BTreeMap<ChainId, BTreeMap<String, String>>,
    pub by_namespace: BTreeMap<String, BTreeMap<ChainId, Vec<String>>>,
    pub by_contract: BTreeMap<String, Vec<String>>,
    pub proxies: ProxyIndex,
    pub pending_safe_txs: Vec<String>,
}

impl Indices {
    pub fn rebuild<'a>(
        deployments: impl Iterator<Item = &'a Deployment>,
        safe_txs: impl Iterator<Item = &'a SafeTransaction>,
    ) -> Self {
        let mut indices = Indices::default();
        for d in deployments {
            indices
                .by_address
                .entry(d.chain_id)
                .or_default()
                .insert(d.address.clone(), d.id.clone());
            indices
                .by_namespace
                .entry(d.namespace.clone())
                .or_default()
                .entry(d.chain_id)
                .or_default()
                .push(d.id.clone());
            indices.by_contract.entry(d.contract_name.clone()).or_default().push(d.id.clone());

            if let Some(info) = &d.proxy_info {
                indices
                    .proxies
                    .implementations
                    .entry(info.implementation.clone())
                    .or_default()
                    .push(d.id.clone());
                indices.proxies.proxy_to_impl.insert(d.address.clone(), info.implementation.clone());
            }
        }
        for tx in safe_txs {
            if tx.status == TransactionStatus::Queued {
                indices.pending_safe_txs.push(tx.safe_tx_hash.clone());
            }
        }
        indices
    }
}
