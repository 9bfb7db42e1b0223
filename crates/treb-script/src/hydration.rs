//! Hydration pipeline (C6): turns a script executor's raw output into a [`HydratedRunResult`].
//! Purely single-threaded per run; independent runs may be hydrated in parallel by the caller.

use crate::events;
use crate::model::{
    BroadcastEntry, CollisionEvent, CreateMethod, DeploymentEvent, GovernorCreatedEvent, HydratedRunResult,
    HydratedTransaction, ProxyPrimitiveEvent, SafeExecutedEvent, SafeQueuedEvent, SimulatedTransaction, TraceFrame,
};
use crate::executor::ScriptExecutionOutput;
use alloy_primitives::{Address, Bytes, Log, LogData, B256};
use alloy_sol_types::SolEvent;
use serde::Deserialize;
use std::str::FromStr;
use treb_common::error::{Result, TrebError};

/// Best-effort trace fetcher for stage 4; real implementations shell out to `cast run --json`.
/// Failure is swallowed by [`hydrate`] — it attaches no traces rather than failing the run.
pub trait TraceFetcher: Send + Sync {
    fn fetch_trace(&self, tx_hash: &str) -> Result<serde_json::Value>;
}

pub struct NoTraceFetcher;
impl TraceFetcher for NoTraceFetcher {
    fn fetch_trace(&self, _tx_hash: &str) -> Result<serde_json::Value> {
        Err(TrebError::NotFound("trace fetching disabled".to_string()))
    }
}

fn to_log(address: &str, topics: &[String], data: &str) -> Result<Log<LogData>> {
    let address = Address::from_str(address).map_err(|e| TrebError::InvalidArgument(format!("bad log address: {e}")))?;
    let topics: Vec<B256> = topics
        .iter()
        .map(|t| B256::from_str(t).map_err(|e| TrebError::InvalidArgument(format!("bad topic: {e}"))))
        .collect::<Result<_>>()?;
    let data_bytes = hex::decode(data.trim_start_matches("0x"))
        .map_err(|e| TrebError::InvalidArgument(format!("bad log data: {e}")))?;
    let log_data = LogData::new(topics, Bytes::from(data_bytes))
        .ok_or_else(|| TrebError::InvalidArgument("log had more than 4 topics".to_string()))?;
    Ok(Log { address, data: log_data })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForgeReceiptJson {
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    gas_used: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForgeBroadcastJson {
    #[serde(default)]
    receipts: Vec<ForgeReceiptJson>,
}

fn parse_hex_u64(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).ok()
}

/// Stage 2: parses a forge broadcast file into an ordered list of receipts.
fn parse_broadcast(raw: &str) -> Vec<BroadcastEntry> {
    let Ok(parsed) = serde_json::from_str::<ForgeBroadcastJson>(raw) else {
        return Vec::new();
    };
    parsed
        .receipts
        .into_iter()
        .filter_map(|r| {
            Some(BroadcastEntry {
                transaction_hash: r.transaction_hash?,
                block_number: r.block_number.as_deref().and_then(parse_hex_u64).unwrap_or(0),
                gas_used: r.gas_used.as_deref().and_then(parse_hex_u64).unwrap_or(0),
            })
        })
        .collect()
}

/// Stage 1: decodes each raw log against the known domain events, or the proxy primitives,
/// skipping anything unrecognized.
fn stage1_decode_logs(result: &mut HydratedRunResult, simulated: &mut Vec<SimulatedTransaction>, raw_logs: &[crate::model::RawLog]) {
    for raw in raw_logs {
        let Ok(log) = to_log(&raw.address, &raw.topics, &raw.data) else { continue };
        let Some(sig) = log.data.topics().first().copied() else { continue };

        if sig == events::ContractDeployed::SIGNATURE_HASH {
            if let Ok(decoded) = events::ContractDeployed::decode_log(&log, true) {
                let decoded = decoded.data;
                result.deployments.push(DeploymentEvent {
                    deployer: format!("{:#x}", decoded.deployer),
                    location: format!("{:#x}", decoded.location),
                    transaction_id: format!("{:#x}", decoded.transactionId),
                    artifact: decoded.deployment.artifact.clone(),
                    label: decoded.deployment.label.clone(),
                    entropy: decoded.deployment.entropy.clone(),
                    salt: format!("{:#x}", decoded.deployment.salt),
                    bytecode_hash: format!("{:#x}", decoded.deployment.bytecodeHash),
                    init_code_hash: format!("{:#x}", decoded.deployment.initCodeHash),
                    constructor_args: format!("0x{}", hex::encode(&decoded.deployment.constructorArgs)),
                    create_strategy: decoded.deployment.createStrategy.clone(),
                });
            }
        } else if sig == events::DeploymentCollision::SIGNATURE_HASH {
            if let Ok(decoded) = events::DeploymentCollision::decode_log(&log, true) {
                let decoded = decoded.data;
                result.collisions.push(CollisionEvent {
                    existing_contract: format!("{:#x}", decoded.existingContract),
                    deployment: DeploymentEvent {
                        deployer: String::new(),
                        location: format!("{:#x}", decoded.existingContract),
                        transaction_id: String::new(),
                        artifact: decoded.deployment.artifact.clone(),
                        label: decoded.deployment.label.clone(),
                        entropy: decoded.deployment.entropy.clone(),
                        salt: format!("{:#x}", decoded.deployment.salt),
                        bytecode_hash: format!("{:#x}", decoded.deployment.bytecodeHash),
                        init_code_hash: format!("{:#x}", decoded.deployment.initCodeHash),
                        constructor_args: format!("0x{}", hex::encode(&decoded.deployment.constructorArgs)),
                        create_strategy: decoded.deployment.createStrategy.clone(),
                    },
                });
            }
        } else if sig == events::TransactionSimulated::SIGNATURE_HASH {
            if let Ok(decoded) = events::TransactionSimulated::decode_log(&log, true) {
                let decoded = decoded.data;
                simulated.push(SimulatedTransaction {
                    transaction_id: format!("{:#x}", decoded.info.transactionId),
                    sender_id: format!("{:#x}", decoded.info.senderId),
                    sender: format!("{:#x}", decoded.info.sender),
                    to: format!("{:#x}", decoded.info.transaction.to),
                    data: format!("0x{}", hex::encode(&decoded.info.transaction.data)),
                    value: decoded.info.transaction.value.to_string(),
                });
            }
        } else if sig == events::SafeTransactionQueued::SIGNATURE_HASH {
            if let Ok(decoded) = events::SafeTransactionQueued::decode_log(&log, true) {
                let decoded = decoded.data;
                result.safe_queued.push(SafeQueuedEvent {
                    safe_tx_hash: format!("{:#x}", decoded.safeTxHash),
                    safe: format!("{:#x}", decoded.safe),
                    proposer: format!("{:#x}", decoded.proposer),
                    transaction_ids: decoded.transactionIds.iter().map(|id| format!("{id:#x}")).collect(),
                });
            }
        } else if sig == events::SafeTransactionExecuted::SIGNATURE_HASH {
            if let Ok(decoded) = events::SafeTransactionExecuted::decode_log(&log, true) {
                let decoded = decoded.data;
                result.safe_executed.push(SafeExecutedEvent {
                    safe_tx_hash: format!("{:#x}", decoded.safeTxHash),
                    safe: format!("{:#x}", decoded.safe),
                    executor: format!("{:#x}", decoded.executor),
                    transaction_ids: decoded.transactionIds.iter().map(|id| format!("{id:#x}")).collect(),
                });
            }
        } else if sig == events::GovernorProposalCreated::SIGNATURE_HASH {
            if let Ok(decoded) = events::GovernorProposalCreated::decode_log(&log, true) {
                let decoded = decoded.data;
                result.governor_created.push(GovernorCreatedEvent {
                    proposal_id: format!("{:#x}", decoded.proposalId),
                    governor: format!("{:#x}", decoded.governor),
                    proposer: format!("{:#x}", decoded.proposer),
                    transaction_ids: decoded.transactionIds.iter().map(|id| format!("{id:#x}")).collect(),
                });
            }
        } else if sig == events::Upgraded::SIGNATURE_HASH {
            if let Ok(decoded) = events::Upgraded::decode_log(&log, true) {
                let decoded = decoded.data;
                result.proxy_events.push(ProxyPrimitiveEvent::Upgraded {
                    proxy: format!("{:#x}", log.address),
                    implementation: format!("{:#x}", decoded.implementation),
                });
            }
        } else if sig == events::AdminChanged::SIGNATURE_HASH {
            if let Ok(decoded) = events::AdminChanged::decode_log(&log, true) {
                let decoded = decoded.data;
                result.proxy_events.push(ProxyPrimitiveEvent::AdminChanged {
                    proxy: format!("{:#x}", log.address),
                    previous_admin: format!("{:#x}", decoded.previousAdmin),
                    new_admin: format!("{:#x}", decoded.newAdmin),
                });
            }
        } else if sig == events::BeaconUpgraded::SIGNATURE_HASH {
            if let Ok(decoded) = events::BeaconUpgraded::decode_log(&log, true) {
                let decoded = decoded.data;
                result.proxy_events.push(ProxyPrimitiveEvent::BeaconUpgraded {
                    proxy: format!("{:#x}", log.address),
                    beacon: format!("{:#x}", decoded.beacon),
                });
            }
        }
        // else: unrecognized topic, skip silently.
    }
}

/// Stage 2 + 3: zips broadcast receipts with simulated transactions by broadcast order, then
/// attaches them to the result in broadcast order (the ordering guarantee in §5).
fn stage2_and_3_zip_broadcast(
    result: &mut HydratedRunResult,
    simulated: Vec<SimulatedTransaction>,
    broadcast: &[BroadcastEntry],
) {
    if broadcast.is_empty() {
        for sim in simulated {
            result.transactions.push(HydratedTransaction {
                transaction_id: Some(sim.transaction_id),
                hash: None,
                block_number: None,
                sender: sim.sender,
                to: sim.to,
                data: sim.data,
                value: sim.value,
                executed: false,
            });
        }
        return;
    }

    let mut simulated = simulated.into_iter();
    for entry in broadcast {
        match simulated.next() {
            Some(sim) => result.transactions.push(HydratedTransaction {
                transaction_id: Some(sim.transaction_id),
                hash: Some(entry.transaction_hash.clone()),
                block_number: Some(entry.block_number),
                sender: sim.sender,
                to: sim.to,
                data: sim.data,
                value: sim.value,
                executed: true,
            }),
            None => result.transactions.push(HydratedTransaction {
                transaction_id: None,
                hash: Some(entry.transaction_hash.clone()),
                block_number: Some(entry.block_number),
                sender: String::new(),
                to: String::new(),
                data: String::new(),
                value: "0".to_string(),
                executed: true,
            }),
        }
    }
    for sim in simulated {
        result.transactions.push(HydratedTransaction {
            transaction_id: Some(sim.transaction_id),
            hash: None,
            block_number: None,
            sender: sim.sender,
            to: sim.to,
            data: sim.data,
            value: sim.value,
            executed: false,
        });
    }
}

/// Stage 4: best-effort trace enrichment. A frame whose caller matches `create3_factory` is
/// tagged `Create3`; extraction failure attaches no traces.
fn stage4_trace_enrichment(
    result: &mut HydratedRunResult,
    fetcher: &dyn TraceFetcher,
    create3_factory: &str,
) {
    for tx in result.transactions.clone() {
        let Some(hash) = &tx.hash else { continue };
        let Ok(trace) = fetcher.fetch_trace(hash) else { continue };
        let Some(frames) = trace.get("calls").and_then(|v| v.as_array()) else { continue };
        let mut parsed = Vec::new();
        for frame in frames {
            let Some(caller) = frame.get("from").and_then(|v| v.as_str()) else { continue };
            let Some(created) = frame.get("to").and_then(|v| v.as_str()) else { continue };
            let method = if caller.eq_ignore_ascii_case(create3_factory) {
                CreateMethod::Create3
            } else if frame.get("op").and_then(|v| v.as_str()) == Some("CREATE2") {
                CreateMethod::Create2
            } else {
                CreateMethod::Create
            };
            parsed.push(TraceFrame { caller: caller.to_string(), created_address: created.to_string(), method });
        }
        if !parsed.is_empty() {
            result.traces.insert(hash.clone(), parsed);
        }
    }
}

/// Runs the full four-stage hydration pipeline over `output`.
pub fn hydrate(
    output: &ScriptExecutionOutput,
    raw_logs: &[crate::model::RawLog],
    fetcher: &dyn TraceFetcher,
    create3_factory: &str,
) -> Result<HydratedRunResult> {
    let mut result = HydratedRunResult::default();
    let mut simulated = Vec::new();

    stage1_decode_logs(&mut result, &mut simulated, raw_logs);

    let broadcast = output
        .broadcast_path
        .as_ref()
        .and_then(|p| std::fs::read_to_string(p).ok())
        .map(|raw| parse_broadcast(&raw))
        .unwrap_or_default();

    stage2_and_3_zip_broadcast(&mut result, simulated, &broadcast);
    stage4_trace_enrichment(&mut result, fetcher, create3_factory);

    Ok(result)
}
