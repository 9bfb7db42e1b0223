//! The flattened `registry.json` view: `chainId -> namespace -> displayName -> address`,
//! regenerated from the canonical `deployments.json` table after every mutation for downstream
//! consumption by deployment scripts (see the on-disk registry layout).

use crate::model::Deployment;
use std::collections::BTreeMap;

/// `displayName` is the contract name, or `Contract:label` when a label is present.
fn display_name(d: &Deployment) -> String {
    if d.label.is_empty() {
        d.contract_name.clone()
    } else {
        format!("{}:{}", d.contract_name, d.label)
    }
}

pub fn build<'a>(
    deployments: impl Iterator<Item = &'a Deployment>,
) -> BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>> {
    let mut view: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>> = BTreeMap::new();
    for d in deployments {
        view.entry(d.chain_id.to_string())
            .or_default()
            .entry(d.namespace.clone())
            .or_default()
            .insert(display_name(d), d.address.clone());
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::collections::BTreeSet;
    use treb_common::time::now;

    fn sample(namespace: &str, chain_id: u64, name: &str, label: &str, address: &str) -> Deployment {
        Deployment {
            id: format!("{namespace}/{chain_id}/{name}"),
            namespace: namespace.into(),
            chain_id,
            contract_name: name.into(),
            label: label.into(),
            address: address.into(),
            kind: DeploymentType::Singleton,
            deployment_strategy: DeploymentStrategy {
                method: DeploymentMethod::Create,
                salt: None,
                init_code_hash: None,
                factory: None,
                constructor_args: None,
                entropy: None,
            },
            proxy_info: None,
            artifact: ArtifactInfo {
                path: "src/Counter.sol".into(),
                compiler_version: "0.8.24".into(),
                bytecode_hash: "0x0".into(),
                script_path: "script/Deploy.s.sol".into(),
                git_commit: None,
            },
            verification: VerificationInfo::default(),
            transaction_id: None,
            tags: BTreeSet::new(),
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn flattens_by_chain_namespace_and_display_name() {
        let deployments =
            vec![sample("default", 31337, "Counter", "", "0xaaa"), sample("default", 31337, "Counter", "proxy", "0xbbb")];
        let view = build(deployments.iter());
        assert_eq!(view["31337"]["default"]["Counter"], "0xaaa");
        assert_eq!(view["31337"]["default"]["Counter:proxy"], "0xbbb");
    }
}
