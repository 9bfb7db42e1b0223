//! Intermediate types passed between the hydration pipeline, proxy tracker, and changeset
//! builder (C6-C8). None of these are persisted directly; they are folded into registry
//! entities by the changeset builder.

use std::collections::BTreeMap;

/// One entry of the forge driver's `raw_logs` array.
#[derive(Debug, Clone)]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

/// A transaction entry parsed out of the forge broadcast file.
#[derive(Debug, Clone)]
pub struct BroadcastEntry {
    pub transaction_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
}

#[derive(Debug, Clone)]
pub struct DeploymentEvent {
    pub deployer: String,
    pub location: String,
    pub transaction_id: String,
    pub artifact: String,
    pub label: String,
    pub entropy: String,
    pub salt: String,
    pub bytecode_hash: String,
    pub init_code_hash: String,
    pub constructor_args: String,
    pub create_strategy: String,
}

#[derive(Debug, Clone)]
pub struct CollisionEvent {
    pub existing_contract: String,
    pub deployment: DeploymentEvent,
}

#[derive(Debug, Clone)]
pub struct SimulatedTransaction {
    pub transaction_id: String,
    pub sender_id: String,
    pub sender: String,
    pub to: String,
    pub data: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct SafeQueuedEvent {
    pub safe_tx_hash: String,
    pub safe: String,
    pub proposer: String,
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SafeExecutedEvent {
    pub safe_tx_hash: String,
    pub safe: String,
    pub executor: String,
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GovernorCreatedEvent {
    pub proposal_id: String,
    pub governor: String,
    pub proposer: String,
    pub transaction_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ProxyPrimitiveEvent {
    Upgraded { proxy: String, implementation: String },
    AdminChanged { proxy: String, previous_admin: String, new_admin: String },
    BeaconUpgraded { proxy: String, beacon: String },
}

/// A hydrated transaction: the simulated record, optionally zipped with its broadcast receipt.
#[derive(Debug, Clone)]
pub struct HydratedTransaction {
    pub transaction_id: Option<String>,
    pub hash: Option<String>,
    pub block_number: Option<u64>,
    pub sender: String,
    pub to: String,
    pub data: String,
    pub value: String,
    pub executed: bool,
}

/// A best-effort `CREATE`/`CREATE2`/`CREATE3` trace frame, per stage 4.
#[derive(Debug, Clone)]
pub struct TraceFrame {
    pub caller: String,
    pub created_address: String,
    pub method: CreateMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMethod {
    Create,
    Create2,
    Create3,
}

/// The output of the full C6 hydration pipeline.
#[derive(Debug, Clone, Default)]
pub struct HydratedRunResult {
    pub transactions: Vec<HydratedTransaction>,
    pub deployments: Vec<DeploymentEvent>,
    pub collisions: Vec<CollisionEvent>,
    pub safe_queued: Vec<SafeQueuedEvent>,
    pub safe_executed: Vec<SafeExecutedEvent>,
    pub governor_created: Vec<GovernorCreatedEvent>,
    pub proxy_events: Vec<ProxyPrimitiveEvent>,
    pub traces: BTreeMap<String, Vec<TraceFrame>>,
}

/// Summary of a `run`/`sync`/`prune`/`verify` invocation, returned to the caller alongside the
/// applied changeset.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub deployments_created: usize,
    pub deployments_updated: usize,
    pub transactions_recorded: usize,
    pub collisions: Vec<CollisionEvent>,
    pub errors: Vec<String>,
}
