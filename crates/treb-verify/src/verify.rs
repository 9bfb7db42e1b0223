//! Verifier (C11): invokes the external verify helper for every (deployment, explorer) pair and
//! derives each deployment's overall verification status from the per-explorer results.

use crate::explorer::{ExplorerClient, VerifyOutcome, VerifyRequest};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use treb_common::error::Result;
use treb_registry::model::{VerificationStatus, VerifierResult};
use treb_registry::RegistryStore;

pub const DEFAULT_CONCURRENCY: usize = 8;

pub struct ExplorerTarget<'a> {
    pub name: String,
    pub base_url: String,
    pub client: &'a dyn ExplorerClient,
}

pub struct VerifyOptions {
    pub concurrency: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self { concurrency: DEFAULT_CONCURRENCY }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub statuses: BTreeMap<String, VerificationStatus>,
}

fn derive_status(verifiers: &BTreeMap<String, VerifierResult>) -> (VerificationStatus, Option<String>, Option<String>) {
    let total = verifiers.len();
    let verified_count = verifiers.values().filter(|v| v.status == VerificationStatus::Verified).count();
    let failed_count = verifiers.values().filter(|v| v.status == VerificationStatus::Failed).count();

    if total > 0 && verified_count == total {
        let url = verifiers.values().find_map(|v| (v.status == VerificationStatus::Verified).then(|| v.url.clone()).flatten());
        (VerificationStatus::Verified, url, None)
    } else if verified_count > 0 {
        (VerificationStatus::Partial, None, None)
    } else if total > 0 && failed_count == total {
        let reason = verifiers
            .iter()
            .filter_map(|(name, v)| v.reason.as_ref().map(|r| format!("{name}: {r}")))
            .collect::<Vec<_>>()
            .join("; ");
        (VerificationStatus::Failed, None, Some(reason))
    } else {
        (VerificationStatus::Unverified, None, None)
    }
}

/// Verifies `deployment_ids` against every target in `explorers`, updating the registry and
/// returning the derived status per deployment.
pub async fn verify(registry: &RegistryStore, deployment_ids: &[String], explorers: &[ExplorerTarget<'_>], options: &VerifyOptions) -> Result<VerifyReport> {
    let concurrency = options.concurrency.max(1);

    let mut jobs = Vec::new();
    for id in deployment_ids {
        let deployment = match registry.get(id) {
            Ok(d) => d,
            Err(_) => continue,
        };
        for target in explorers {
            let request = VerifyRequest {
                artifact_path: deployment.artifact.path.clone(),
                compiler_version: deployment.artifact.compiler_version.clone(),
                constructor_args: deployment.deployment_strategy.constructor_args.clone().unwrap_or_default(),
                contract_address: deployment.address.clone(),
                explorer_name: target.name.clone(),
                explorer_url: target.base_url.clone(),
            };
            jobs.push((id.clone(), target.name.clone(), request, target.client));
        }
    }

    let results: Vec<(String, String, Result<VerifyOutcome>)> = stream::iter(jobs.into_iter().map(|(id, name, request, client)| async move {
        let outcome = client.verify(&request).await;
        (id, name, outcome)
    }))
    .buffer_unordered(concurrency)
    .collect()
    .await;

    let mut by_deployment: BTreeMap<String, BTreeMap<String, VerifierResult>> = BTreeMap::new();
    for (id, name, outcome) in results {
        let result = match outcome {
            Ok(VerifyOutcome::Verified { url }) => VerifierResult { status: VerificationStatus::Verified, url, reason: None },
            Ok(VerifyOutcome::AlreadyVerified { url }) => VerifierResult { status: VerificationStatus::Verified, url, reason: None },
            Ok(VerifyOutcome::Failed { reason }) => VerifierResult { status: VerificationStatus::Failed, url: None, reason: Some(reason) },
            Err(e) => VerifierResult { status: VerificationStatus::Failed, url: None, reason: Some(e.to_string()) },
        };
        by_deployment.entry(id).or_default().insert(name, result);
    }

    let mut report = VerifyReport::default();
    for (id, verifiers) in by_deployment {
        let (status, url, reason) = derive_status(&verifiers);
        let mut verifiers = verifiers;
        if let Some(url) = &url {
            for v in verifiers.values_mut() {
                if v.status == VerificationStatus::Verified && v.url.is_none() {
                    v.url = Some(url.clone());
                }
            }
        }
        tracing::debug!(deployment_id = %id, ?status, "updated verification status");
        registry.update_verification(&id, status, verifiers, reason)?;
        report.statuses.insert(id, status);
    }

    Ok(report)
}
