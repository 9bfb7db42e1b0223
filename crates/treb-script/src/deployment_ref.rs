//! Parses and resolves a deployment reference: `Contract`, `Contract:label`,
//! `namespace/Contract[:label]`, `chainId/Contract[:label]`, `namespace/chainId/Contract[:label]`,
//! or a bare 42-character address.

use crate::selector_util::resolve_ambiguous;
use treb_common::error::{Result, TrebError};
use treb_common::ids::{parse_address, ChainId};
use treb_contracts::Selector;
use treb_registry::model::Deployment;
use treb_registry::RegistryStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentReference {
    Address(String),
    Parsed { namespace: Option<String>, chain_id: Option<ChainId>, contract_name: String, label: Option<String> },
}

/// The namespace/chain the resolver fills in when a reference leaves them implicit. `namespace`
/// is `None` when no namespace is active, in which case an unqualified reference is resolved
/// across every namespace and surfaces `Ambiguous` if more than one matches (spec §8 scenario 6).
#[derive(Debug, Clone)]
pub struct ReferenceContext {
    pub namespace: Option<String>,
    pub chain_id: ChainId,
}

/// Parses the textual grammar without touching the registry.
pub fn parse(reference: &str) -> Result<DeploymentReference> {
    if reference.len() == 42 && reference.starts_with("0x") {
        parse_address(reference)?;
        return Ok(DeploymentReference::Address(reference.to_string()));
    }

    let segments: Vec<&str> = reference.split('/').collect();
    let (namespace, chain_id, rest) = match segments.as_slice() {
        [contract] => (None, None, *contract),
        [a, contract] => {
            if let Ok(chain_id) = a.parse::<ChainId>() {
                (None, Some(chain_id), *contract)
            } else {
                (Some((*a).to_string()), None, *contract)
            }
        }
        [namespace, chain_id, contract] => {
            let chain_id = chain_id
                .parse::<ChainId>()
                .map_err(|_| TrebError::InvalidArgument(format!("malformed chain id in reference `{reference}`")))?;
            (Some((*namespace).to_string()), Some(chain_id), *contract)
        }
        _ => return Err(TrebError::InvalidArgument(format!("malformed deployment reference `{reference}`"))),
    };

    let (contract_name, label) = match rest.split_once(':') {
        Some((name, label)) => (name.to_string(), Some(label.to_string())),
        None => (rest.to_string(), None),
    };

    if contract_name.is_empty() {
        return Err(TrebError::InvalidArgument(format!("malformed deployment reference `{reference}`")));
    }

    Ok(DeploymentReference::Parsed { namespace, chain_id, contract_name, label })
}

/// Resolves a parsed reference against the registry, filling missing fields from `context`.
/// Ambiguous matches are handed to `selector`; non-interactive callers pass
/// [`treb_contracts::NonInteractiveSelector`].
pub fn resolve(
    reference: &str,
    context: &ReferenceContext,
    registry: &RegistryStore,
    selector: &dyn Selector<Deployment>,
) -> Result<Deployment> {
    match parse(reference)? {
        DeploymentReference::Address(address) => registry.get_by_address(context.chain_id, &address),
        DeploymentReference::Parsed { namespace, chain_id, contract_name, label } => {
            let namespace = namespace.or_else(|| context.namespace.clone());
            let chain_id = chain_id.unwrap_or(context.chain_id);
            let filter = treb_registry::DeploymentFilter {
                namespace,
                chain_id: Some(chain_id),
                contract_name: Some(contract_name.clone()),
                label: label.clone(),
                kind: None,
            };
            let matches = registry.list(&filter);
            resolve_ambiguous(matches, selector, reference)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treb_contracts::NonInteractiveSelector;
    use treb_registry::model::{ArtifactInfo, Deployment, DeploymentMethod, DeploymentStrategy, DeploymentType, VerificationInfo};
    use treb_registry::RegistryStore;

    fn sample_deployment(namespace: &str, address: &str) -> Deployment {
        let now = chrono::Utc::now();
        Deployment {
            id: format!("{namespace}/31337/Counter"),
            namespace: namespace.to_string(),
            chain_id: 31337,
            contract_name: "Counter".to_string(),
            label: String::new(),
            address: address.to_string(),
            kind: DeploymentType::Singleton,
            deployment_strategy: DeploymentStrategy { method: DeploymentMethod::Create2, salt: None, init_code_hash: None, factory: None, constructor_args: None, entropy: None },
            proxy_info: None,
            artifact: ArtifactInfo { path: "src/Counter.sol:Counter".to_string(), compiler_version: String::new(), bytecode_hash: "0x0".to_string(), script_path: "script/Deploy.s.sol".to_string(), git_commit: None },
            verification: VerificationInfo::default(),
            transaction_id: None,
            tags: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn parses_bare_contract_name() {
        assert_eq!(
            parse("Counter").unwrap(),
            DeploymentReference::Parsed { namespace: None, chain_id: None, contract_name: "Counter".into(), label: None }
        );
    }

    #[test]
    fn parses_contract_with_label() {
        assert_eq!(
            parse("Counter:primary").unwrap(),
            DeploymentReference::Parsed {
                namespace: None,
                chain_id: None,
                contract_name: "Counter".into(),
                label: Some("primary".into())
            }
        );
    }

    #[test]
    fn parses_namespace_prefixed_reference() {
        assert_eq!(
            parse("production/Counter").unwrap(),
            DeploymentReference::Parsed {
                namespace: Some("production".into()),
                chain_id: None,
                contract_name: "Counter".into(),
                label: None
            }
        );
    }

    #[test]
    fn parses_chain_id_prefixed_reference() {
        assert_eq!(
            parse("1/Counter").unwrap(),
            DeploymentReference::Parsed {
                namespace: None,
                chain_id: Some(1),
                contract_name: "Counter".into(),
                label: None
            }
        );
    }

    #[test]
    fn parses_namespace_and_chain_id() {
        assert_eq!(
            parse("production/1/Counter:primary").unwrap(),
            DeploymentReference::Parsed {
                namespace: Some("production".into()),
                chain_id: Some(1),
                contract_name: "Counter".into(),
                label: Some("primary".into())
            }
        );
    }

    #[test]
    fn parses_bare_address() {
        let addr = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        assert_eq!(parse(addr).unwrap(), DeploymentReference::Address(addr.to_string()));
    }

    #[test]
    fn rejects_malformed_reference() {
        assert!(parse("a/b/c/d").is_err());
        assert!(parse("production/notanumber/Counter").is_err());
    }

    #[test]
    fn no_active_namespace_surfaces_cross_namespace_ambiguity() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(dir.path()).unwrap();
        registry.save_deployment(sample_deployment("default", "0x1111111111111111111111111111111111111111")).unwrap();
        registry.save_deployment(sample_deployment("staging", "0x2222222222222222222222222222222222222222")).unwrap();

        let ctx = ReferenceContext { namespace: None, chain_id: 31337 };
        let outcome = resolve("Counter", &ctx, &registry, &NonInteractiveSelector);
        match outcome {
            Err(TrebError::Ambiguous { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn active_namespace_narrows_to_a_single_match() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(dir.path()).unwrap();
        registry.save_deployment(sample_deployment("default", "0x1111111111111111111111111111111111111111")).unwrap();
        registry.save_deployment(sample_deployment("staging", "0x2222222222222222222222222222222222222222")).unwrap();

        let ctx = ReferenceContext { namespace: Some("default".to_string()), chain_id: 31337 };
        let resolved = resolve("Counter", &ctx, &registry, &NonInteractiveSelector).unwrap();
        assert_eq!(resolved.namespace, "default");
    }
}
