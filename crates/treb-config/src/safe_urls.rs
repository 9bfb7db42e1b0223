//! Built-in table of official Safe transaction service URLs, selected by chain id per the
//! multisig transaction service contract in the external interfaces spec.

use treb_common::ids::ChainId;

/// Returns the official Safe transaction service base URL for well-known chains, or `None` for
/// chains this table doesn't recognize (callers must configure `safe_service_url` explicitly).
pub fn default_safe_service_url(chain_id: ChainId) -> Option<&'static str> {
    Some(match chain_id {
        1 => "https://safe-transaction-mainnet.safe.global",
        11155111 => "https://safe-transaction-sepolia.safe.global",
        137 => "https://safe-transaction-polygon.safe.global",
        8453 => "https://safe-transaction-base.safe.global",
        84532 => "https://safe-transaction-base-sepolia.safe.global",
        42161 => "https://safe-transaction-arbitrum.safe.global",
        10 => "https://safe-transaction-optimism.safe.global",
        _ => return None,
    })
}
