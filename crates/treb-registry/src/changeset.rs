//! The changeset the hydration pipeline's changeset builder (C8) produces and the registry's
//! `applyChangeset` (C1) consumes: an ordered (create, update, delete) triple applied
//! atomically.

use crate::model::{Deployment, GovernorProposal, SafeTransaction, Transaction};
use serde::{Deserialize, Serialize};

/// Create/update/delete sets for a single entity kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityChangeset<T> {
    pub create: Vec<T>,
    pub update: Vec<T>,
    pub delete: Vec<String>,
}

impl<T> EntityChangeset<T> {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Changeset {
    pub deployments: EntityChangeset<Deployment>,
    pub transactions: EntityChangeset<Transaction>,
    pub safe_txs: EntityChangeset<SafeTransaction>,
    pub governor_proposals: EntityChangeset<GovernorProposal>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.deployments.is_empty()
            && self.transactions.is_empty()
            && self.safe_txs.is_empty()
            && self.governor_proposals.is_empty()
    }
}
