//! Wire-level shapes returned by the external multisig/governor services and the per-record
//! sync report returned to the caller.

use serde::Deserialize;

/// Status of a Safe transaction batch as reported by the multisig transaction service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSafeStatus {
    Pending,
    Executed,
    Canceled,
}

/// The subset of a Safe transaction service response the syncer needs.
#[derive(Debug, Clone, Deserialize)]
pub struct SafeStatusReport {
    pub status: RemoteSafeStatus,
    pub execution_tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

/// Status of a governor proposal as reported by the governor client (an on-chain `state()` call
/// or an indexer wrapping one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteGovernorStatus {
    Pending,
    Active,
    Succeeded,
    Queued,
    Executed,
    Canceled,
    Defeated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GovernorStatusReport {
    pub status: RemoteGovernorStatus,
    pub execution_tx_hash: Option<String>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
}

/// Outcome for a single record, folded into the sync report the caller sees.
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Unchanged,
    Executed { record_id: String },
    Terminated { record_id: String },
    Failed { record_id: String, error: String },
}

/// The aggregate result of one `sync` invocation: a changeset plus a per-record report, so the
/// caller can see which of the polled entries hit a network failure without it being fatal to
/// the rest.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| matches!(o, RecordOutcome::Failed { .. }))
    }
}
