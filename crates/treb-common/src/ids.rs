//! Deterministic identifier construction and the canonical address format.
//!
//! All ids in the registry are plain strings built from these helpers so that the same
//! deployment yields the same registry row across machines, per the data model's opening
//! invariant.

use crate::error::{Result, TrebError};
use alloy_primitives::Address;

/// A chain id, always the unsigned 64-bit form used on the wire and in every identifier.
pub type ChainId = u64;

/// Canonicalizes an address to lowercase `0x`-prefixed hex, the form stored in every
/// `Deployment.address` field and used as the `byAddress` index key.
pub fn canonical_address(address: Address) -> String {
    format!("{address:#x}")
}

/// Parses a 42-character `0x`-prefixed hex string into an [`Address`], the validation rule the
/// parameter resolver and sender resolver both apply to `address`-typed values.
pub fn parse_address(raw: &str) -> Result<Address> {
    if raw.len() != 42 || !raw.starts_with("0x") {
        return Err(TrebError::InvalidArgument(format!(
            "expected a 42-character 0x-prefixed address, got `{raw}`"
        )));
    }
    raw.parse::<Address>()
        .map_err(|e| TrebError::InvalidArgument(format!("invalid address `{raw}`: {e}")))
}

/// Builds a deployment id: `"<namespace>/<chainId>/<contractName>[:<label>]"`.
pub fn deployment_id(namespace: &str, chain_id: ChainId, contract_name: &str, label: &str) -> String {
    if label.is_empty() {
        format!("{namespace}/{chain_id}/{contract_name}")
    } else {
        format!("{namespace}/{chain_id}/{contract_name}:{label}")
    }
}

/// The parsed components of a deployment id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentIdParts {
    pub namespace: String,
    pub chain_id: ChainId,
    pub contract_name: String,
    pub label: String,
}

/// Parses a deployment id produced by [`deployment_id`] back into its components.
pub fn parse_deployment_id(id: &str) -> Result<DeploymentIdParts> {
    let mut parts = id.splitn(3, '/');
    let namespace = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TrebError::InvalidArgument(format!("malformed deployment id `{id}`")))?;
    let chain_id_raw = parts
        .next()
        .ok_or_else(|| TrebError::InvalidArgument(format!("malformed deployment id `{id}`")))?;
    let rest = parts
        .next()
        .ok_or_else(|| TrebError::InvalidArgument(format!("malformed deployment id `{id}`")))?;
    let chain_id = chain_id_raw
        .parse::<ChainId>()
        .map_err(|_| TrebError::InvalidArgument(format!("malformed chain id in `{id}`")))?;
    let (contract_name, label) = match rest.split_once(':') {
        Some((name, label)) => (name, label),
        None => (rest, ""),
    };
    Ok(DeploymentIdParts {
        namespace: namespace.to_owned(),
        chain_id,
        contract_name: contract_name.to_owned(),
        label: label.to_owned(),
    })
}

/// Builds a transaction id: `"tx-<hash>"` when a hash exists, else a hex-derived id from the
/// script-level transaction id bytes.
pub fn transaction_id_from_hash(hash: &str) -> String {
    format!("tx-{}", hash.trim_start_matches("0x"))
}

/// Builds a transaction id from the script-level `bytes32 transactionId` hex string when no
/// on-chain hash is yet known (the simulated-only case).
pub fn transaction_id_from_script_id(script_transaction_id: &str) -> String {
    format!("tx-{}", script_transaction_id.trim_start_matches("0x"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_label() {
        let id = deployment_id("production", 1, "Counter", "primary");
        assert_eq!(id, "production/1/Counter:primary");
        let parts = parse_deployment_id(&id).unwrap();
        assert_eq!(parts.namespace, "production");
        assert_eq!(parts.chain_id, 1);
        assert_eq!(parts.contract_name, "Counter");
        assert_eq!(parts.label, "primary");
    }

    #[test]
    fn round_trips_without_label() {
        let id = deployment_id("default", 31337, "Counter", "");
        assert_eq!(id, "default/31337/Counter");
        let parts = parse_deployment_id(&id).unwrap();
        assert_eq!(parts.label, "");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(parse_deployment_id("not-an-id").is_err());
        assert!(parse_deployment_id("default/notanumber/Counter").is_err());
    }

    #[test]
    fn address_validation() {
        assert!(parse_address("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").is_ok());
        assert!(parse_address("0xnothex").is_err());
        assert!(parse_address("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA").is_err());
    }
}
