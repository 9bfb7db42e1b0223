//! The `Orchestrator` facade (C0 expansion): sequences the four pipelines (`run`, `sync`,
//! `prune`, `verify`) against a shared [`RegistryStore`] and [`RuntimeConfig`], matching the
//! dependency-order table in the system overview. Contains no argument parsing or terminal
//! rendering — both remain out of scope.

use indexmap::IndexMap;
use std::time::{Duration, Instant};
use treb_common::error::{Result, TrebError};
use treb_common::ids::ChainId;
use treb_common::CancelToken;
use treb_config::RuntimeConfig;
use treb_contracts::ContractRepository;
use treb_prune::{ChainClient, PruneOptions};
use treb_registry::RegistryStore;
use treb_script::{
    hydrate, infer_proxies, pack_parameters, resolve_parameters, BuildContext, ForgeScriptDriver, NoTraceFetcher,
    ParameterDecl, ParameterPrompter, ReferenceContext, ResolutionContext, ScriptInvocation, TraceFetcher,
};
use treb_senders::{HardwareWalletResolver, Sender};
use treb_sync::{GovernorClient, SafeTransactionService, SyncContext};
use treb_verify::{ExplorerTarget, VerifyOptions};

use crate::forge_driver::SystemForgeDriver;
use crate::report::RunReport;

/// Everything a single `run` invocation needs that argument parsing would otherwise supply.
pub struct RunRequest {
    pub namespace: String,
    pub chain_id: ChainId,
    pub script_artifact: String,
    pub script_path: String,
    pub senders: IndexMap<String, Sender>,
    pub declared_parameters: Vec<ParameterDecl>,
    pub raw_parameter_values: IndexMap<String, String>,
    pub libraries: Vec<String>,
    pub broadcast: bool,
    pub slow: bool,
    pub verbosity: u8,
    pub create3_factory: String,
}

pub struct Orchestrator {
    config: RuntimeConfig,
    registry: RegistryStore,
    contracts: ContractRepository,
}

impl Orchestrator {
    /// Opens the registry at `config.registry_dir` and builds a contract repository backed by
    /// the real `forge build` driver.
    pub fn open(config: RuntimeConfig) -> Result<Self> {
        let registry = RegistryStore::open(&config.registry_dir)?;
        let contracts = ContractRepository::new(
            config.project_root.clone(),
            config.out_dir.clone(),
            Box::new(SystemForgeDriver::default()),
        );
        Ok(Self { config, registry, contracts })
    }

    pub fn registry(&self) -> &RegistryStore {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn contracts(&self) -> &ContractRepository {
        &self.contracts
    }

    /// `(user args) -> C4 -> C3 -> C5 -> (forge driver) -> raw output -> C6 -> C7 -> C8 -> C1`.
    pub async fn run(
        &self,
        request: RunRequest,
        driver: &dyn ForgeScriptDriver,
        hardware: &dyn HardwareWalletResolver,
        prompter: &dyn ParameterPrompter,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        let start = Instant::now();

        let rpc_url = self
            .config
            .rpc_url(request.chain_id)
            .ok_or_else(|| TrebError::InvalidArgument(format!("no RPC URL configured for chain {}", request.chain_id)))?
            .to_string();
        let profile = self.config.profile_for_namespace(&request.namespace);

        let sender_config = treb_senders::resolve(&request.senders, hardware)?;

        let reference_ctx = ReferenceContext { namespace: Some(request.namespace.clone()), chain_id: request.chain_id };
        let resolution_ctx =
            ResolutionContext { senders: &sender_config, registry: &self.registry, contracts: &self.contracts, reference: &reference_ctx };
        let resolved_params = resolve_parameters(&request.declared_parameters, &request.raw_parameter_values, &resolution_ctx, prompter)?;
        let packed_parameters = pack_parameters(&resolved_params);

        let invocation = ScriptInvocation {
            script_artifact: request.script_artifact.clone(),
            rpc_url,
            profile,
            namespace: request.namespace.clone(),
            senders: sender_config,
            packed_parameters,
            libraries: request.libraries.clone(),
            broadcast: request.broadcast,
            slow: request.slow,
            verbosity: request.verbosity,
        };

        let timeout = Duration::from_secs(self.config.script_timeout_secs);
        let output = treb_script::executor::run(driver, &invocation, timeout, cancel).await?;

        let raw_logs = extract_raw_logs(&output);
        let fetcher: &dyn TraceFetcher = &NoTraceFetcher;
        let hydrated = hydrate(&output, &raw_logs, fetcher, &request.create3_factory)?;
        let proxies = infer_proxies(&hydrated.deployments, &hydrated.proxy_events);

        let build_ctx =
            BuildContext { namespace: request.namespace.clone(), chain_id: request.chain_id, registry: &self.registry, script_path: request.script_path };
        let changeset = treb_script::build_changeset(&hydrated, &proxies, &build_ctx);

        let created = changeset.deployments.create.len() + changeset.transactions.create.len() + changeset.safe_txs.create.len();
        let updated = changeset.deployments.update.len() + changeset.transactions.update.len() + changeset.safe_txs.update.len();

        self.registry.apply_changeset(changeset)?;

        Ok(RunReport { created, updated, deleted: 0, errors: Vec::new(), duration: start.elapsed() })
    }

    /// `C1 -> C9 -> C8 -> C1`. The changeset builder here is `treb_sync`'s own, folded directly
    /// into the registry by `treb_sync::sync` — see its module docs.
    pub async fn sync(&self, safe_service: &dyn SafeTransactionService, governor_client: &dyn GovernorClient) -> Result<RunReport> {
        let start = Instant::now();
        let ctx = SyncContext::new(&self.registry, safe_service, governor_client);
        let report = treb_sync::sync(&ctx).await?;

        let mut run_report = RunReport { duration: start.elapsed(), ..Default::default() };
        for outcome in &report.outcomes {
            match outcome {
                treb_sync::RecordOutcome::Executed { .. } | treb_sync::RecordOutcome::Terminated { .. } => run_report.updated += 1,
                treb_sync::RecordOutcome::Failed { error, .. } => run_report.errors.push(error.clone()),
                treb_sync::RecordOutcome::Unchanged => {}
            }
        }
        Ok(run_report)
    }

    /// `C1 -> C10 -> C1`.
    pub async fn prune(&self, client: &dyn ChainClient, chain_id: ChainId, include_pending: bool) -> Result<RunReport> {
        let start = Instant::now();
        let mut options = PruneOptions::new(chain_id);
        options.include_pending = include_pending;
        let (changeset, report) = treb_prune::prune(&self.registry, client, &options).await?;
        let deleted = changeset.deployments.delete.len() + changeset.transactions.delete.len();
        self.registry.apply_changeset(changeset)?;
        let _ = report;
        Ok(RunReport { deleted, duration: start.elapsed(), ..Default::default() })
    }

    /// `C1 -> C11 -> C1`.
    pub async fn verify(&self, deployment_ids: &[String], explorers: &[ExplorerTarget<'_>]) -> Result<RunReport> {
        let start = Instant::now();
        let report = treb_verify::verify(&self.registry, deployment_ids, explorers, &VerifyOptions::default()).await?;
        Ok(RunReport { updated: report.statuses.len(), duration: start.elapsed(), ..Default::default() })
    }
}

fn extract_raw_logs(output: &treb_script::ScriptExecutionOutput) -> Vec<treb_script::model::RawLog> {
    let Some(json) = &output.json_output else { return Vec::new() };
    let Some(entries) = json.get("raw_logs").and_then(|v| v.as_array()) else { return Vec::new() };

    entries
        .iter()
        .filter_map(|entry| {
            let address = entry.get("address")?.as_str()?.to_string();
            let topics = entry
                .get("topics")?
                .as_array()?
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect();
            let data = entry.get("data")?.as_str()?.to_string();
            Some(treb_script::model::RawLog { address, topics, data })
        })
        .collect()
}
