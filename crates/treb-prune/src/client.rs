//! Chain adapter the pruner needs: a trait object so tests inject a fake instead of a live RPC
//! client.

use async_trait::async_trait;
use treb_common::error::Result;
use treb_common::ids::ChainId;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Returns the contract code at `address`, empty if none is deployed there.
    async fn code_at(&self, chain_id: ChainId, address: &str) -> Result<Vec<u8>>;

    /// Returns whether `tx_hash` has a receipt on-chain.
    async fn tx_receipt_exists(&self, chain_id: ChainId, tx_hash: &str) -> Result<bool>;
}
