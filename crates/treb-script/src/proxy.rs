//! Proxy tracker (C7): a three-pass inference over the hydrated event stream, producing a
//! `map<proxyAddress -> ProxyRelationship>` merged into matching deployments by the changeset
//! builder.

use crate::model::{DeploymentEvent, ProxyPrimitiveEvent};
use std::collections::BTreeMap;
use treb_registry::model::ProxyKind;

#[derive(Debug, Clone)]
pub struct ProxyRelationship {
    pub kind: ProxyKind,
    pub implementation: Option<String>,
    pub admin: Option<String>,
    pub beacon: Option<String>,
}

impl ProxyRelationship {
    fn seed(kind: ProxyKind) -> Self {
        Self { kind, implementation: None, admin: None, beacon: None }
    }

    fn merge_kind(&mut self, kind: ProxyKind) {
        self.kind = self.kind.prefer(kind);
    }
}

/// Runs the three passes over `deployments` (for retro-linking) and `proxy_events`.
pub fn infer(deployments: &[DeploymentEvent], proxy_events: &[ProxyPrimitiveEvent]) -> BTreeMap<String, ProxyRelationship> {
    let mut relationships: BTreeMap<String, ProxyRelationship> = BTreeMap::new();

    // Pass 1 — seed.
    for event in proxy_events {
        if let ProxyPrimitiveEvent::Upgraded { proxy, implementation } = event {
            let entry = relationships.entry(proxy.clone()).or_insert_with(|| ProxyRelationship::seed(ProxyKind::Uups));
            entry.merge_kind(ProxyKind::Uups);
            entry.implementation = Some(implementation.clone());
        }
    }

    // Pass 2 — refine.
    for event in proxy_events {
        match event {
            ProxyPrimitiveEvent::AdminChanged { proxy, new_admin, .. } => {
                let entry = relationships.entry(proxy.clone()).or_insert_with(|| ProxyRelationship::seed(ProxyKind::Minimal));
                entry.merge_kind(ProxyKind::Transparent);
                entry.admin = Some(new_admin.clone());
            }
            ProxyPrimitiveEvent::BeaconUpgraded { proxy, beacon } => {
                let entry = relationships.entry(proxy.clone()).or_insert_with(|| ProxyRelationship::seed(ProxyKind::Beacon));
                entry.kind = ProxyKind::Beacon;
                entry.beacon = Some(beacon.clone());
            }
            ProxyPrimitiveEvent::Upgraded { .. } => {}
        }
    }

    // Pass 3 — retro-link: any deployed address that later shows up as a proxy (via Upgraded or
    // AdminChanged in this same execution) gets a relationship seeded if pass 1/2 didn't already
    // create one, e.g. the ERC1967 proxy's own constructor doesn't emit a primitive event.
    for deployment in deployments {
        if relationships.contains_key(&deployment.location) {
            continue;
        }
        let touched = proxy_events.iter().any(|e| match e {
            ProxyPrimitiveEvent::Upgraded { proxy, .. } => proxy == &deployment.location,
            ProxyPrimitiveEvent::AdminChanged { proxy, .. } => proxy == &deployment.location,
            ProxyPrimitiveEvent::BeaconUpgraded { proxy, .. } => proxy == &deployment.location,
        });
        if touched {
            relationships.entry(deployment.location.clone()).or_insert_with(|| ProxyRelationship::seed(ProxyKind::Minimal));
        }
    }

    relationships
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(location: &str) -> DeploymentEvent {
        DeploymentEvent {
            deployer: "0x1".into(),
            location: location.to_string(),
            transaction_id: "0xabc".into(),
            artifact: "Proxy".into(),
            label: String::new(),
            entropy: String::new(),
            salt: "0x0".into(),
            bytecode_hash: "0x0".into(),
            init_code_hash: "0x0".into(),
            constructor_args: "0x".into(),
            create_strategy: "CREATE2".into(),
        }
    }

    #[test]
    fn upgraded_seeds_uups_relationship() {
        let events = vec![ProxyPrimitiveEvent::Upgraded { proxy: "0xP".into(), implementation: "0xI".into() }];
        let relationships = infer(&[], &events);
        let rel = relationships.get("0xP").unwrap();
        assert_eq!(rel.kind, ProxyKind::Uups);
        assert_eq!(rel.implementation.as_deref(), Some("0xI"));
    }

    #[test]
    fn admin_changed_promotes_to_transparent() {
        let events = vec![
            ProxyPrimitiveEvent::Upgraded { proxy: "0xP".into(), implementation: "0xI".into() },
            ProxyPrimitiveEvent::AdminChanged { proxy: "0xP".into(), previous_admin: "0x0".into(), new_admin: "0xA".into() },
        ];
        let relationships = infer(&[], &events);
        let rel = relationships.get("0xP").unwrap();
        assert_eq!(rel.kind, ProxyKind::Transparent);
        assert_eq!(rel.admin.as_deref(), Some("0xA"));
    }

    #[test]
    fn beacon_upgraded_forces_beacon_kind() {
        let events = vec![
            ProxyPrimitiveEvent::Upgraded { proxy: "0xP".into(), implementation: "0xI".into() },
            ProxyPrimitiveEvent::BeaconUpgraded { proxy: "0xP".into(), beacon: "0xB".into() },
        ];
        let relationships = infer(&[], &events);
        let rel = relationships.get("0xP").unwrap();
        assert_eq!(rel.kind, ProxyKind::Beacon);
        assert_eq!(rel.beacon.as_deref(), Some("0xB"));
    }

    #[test]
    fn retro_links_deployed_proxy_with_no_seed_event() {
        let events = vec![ProxyPrimitiveEvent::AdminChanged { proxy: "0xP".into(), previous_admin: "0x0".into(), new_admin: "0xA".into() }];
        let deployments = vec![deployment("0xP")];
        let relationships = infer(&deployments, &events);
        assert!(relationships.contains_key("0xP"));
    }

    #[test]
    fn conflict_resolution_prefers_beacon_over_uups() {
        let mut rel = ProxyRelationship::seed(ProxyKind::Uups);
        rel.merge_kind(ProxyKind::Beacon);
        assert_eq!(rel.kind, ProxyKind::Beacon);
        rel.merge_kind(ProxyKind::Minimal);
        assert_eq!(rel.kind, ProxyKind::Beacon);
    }
}
