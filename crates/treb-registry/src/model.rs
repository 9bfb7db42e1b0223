//! The registry's persisted entity types, matching the data model in `SPEC_FULL.md` §3 field
//! for field: `Deployment`, `Transaction`, `SafeTransaction`, `GovernorProposal`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use treb_common::error::{Result, TrebError};
use treb_common::ids::ChainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentType {
    Singleton,
    Proxy,
    Library,
    Unknown,
}

/// `CREATE`/`CREATE2`/`CREATE3`, normalized to a single case-insensitive parse (design notes
/// Open Question 4: the driver's strategy strings are matched case-insensitively in exactly
/// one place).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMethod {
    Create,
    Create2,
    Create3,
}

impl std::str::FromStr for DeploymentMethod {
    type Err = TrebError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "CREATE2" => Ok(Self::Create2),
            "CREATE3" => Ok(Self::Create3),
            other => Err(TrebError::InvalidArgument(format!("unknown deployment method `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStrategy {
    pub method: DeploymentMethod,
    pub salt: Option<String>,
    pub init_code_hash: Option<String>,
    pub factory: Option<String>,
    pub constructor_args: Option<String>,
    pub entropy: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyKind {
    Minimal,
    Uups,
    Transparent,
    Beacon,
}

impl ProxyKind {
    /// Kind priority on conflict during proxy-tracker retro-linking: `Beacon > Transparent >
    /// UUPS > Minimal`.
    fn priority(self) -> u8 {
        match self {
            ProxyKind::Beacon => 3,
            ProxyKind::Transparent => 2,
            ProxyKind::Uups => 1,
            ProxyKind::Minimal => 0,
        }
    }

    /// Resolves a conflict between two inferred kinds for the same proxy by keeping the
    /// higher-priority one.
    pub fn prefer(self, other: ProxyKind) -> ProxyKind {
        if other.priority() > self.priority() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyUpgrade {
    pub implementation: String,
    pub upgraded_at: DateTime<Utc>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyInfo {
    pub kind: ProxyKind,
    pub implementation: String,
    pub admin: Option<String>,
    pub beacon: Option<String>,
    pub history: Vec<ProxyUpgrade>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: String,
    pub compiler_version: String,
    pub bytecode_hash: String,
    pub script_path: String,
    pub git_commit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Unverified,
    Verified,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierResult {
    pub status: VerificationStatus,
    pub url: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VerificationInfo {
    pub status: Option<VerificationStatus>,
    pub verifiers: BTreeMap<String, VerifierResult>,
    pub etherscan_url: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub namespace: String,
    pub chain_id: ChainId,
    pub contract_name: String,
    pub label: String,
    pub address: String,
    #[serde(rename = "type")]
    pub kind: DeploymentType,
    pub deployment_strategy: DeploymentStrategy,
    pub proxy_info: Option<ProxyInfo>,
    pub artifact: ArtifactInfo,
    #[serde(default)]
    pub verification: VerificationInfo,
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Checks the data model's per-entity invariants; called before every `save`/
    /// `applyChangeset`.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(TrebError::InvalidArgument("deployment id must not be empty".into()));
        }
        if self.kind == DeploymentType::Proxy && self.proxy_info.is_none() {
            return Err(TrebError::InvalidArgument(format!(
                "deployment `{}` is a Proxy but has no proxyInfo",
                self.id
            )));
        }
        if self.kind == DeploymentType::Library && self.artifact.path.is_empty() {
            return Err(TrebError::InvalidArgument(format!(
                "deployment `{}` is a Library but has an empty artifact path",
                self.id
            )));
        }
        if let Some(info) = &self.proxy_info {
            match info.kind {
                ProxyKind::Transparent if info.admin.is_none() => {
                    return Err(TrebError::InvalidArgument(format!(
                        "deployment `{}` is a Transparent proxy but has no admin",
                        self.id
                    )))
                }
                ProxyKind::Beacon if info.beacon.is_none() => {
                    return Err(TrebError::InvalidArgument(format!(
                        "deployment `{}` is a Beacon proxy but has no beacon",
                        self.id
                    )))
                }
                ProxyKind::Uups if info.admin.is_some() || info.beacon.is_some() => {
                    return Err(TrebError::InvalidArgument(format!(
                        "deployment `{}` is a UUPS proxy but has an admin or beacon set",
                        self.id
                    )))
                }
                _ => {}
            }
        }
        if self.verification.status == Some(VerificationStatus::Verified)
            && self.verification.verified_at.is_none()
        {
            return Err(TrebError::InvalidArgument(format!(
                "deployment `{}` is Verified but has no verifiedAt",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionStatus {
    Simulated,
    Queued,
    Executed,
    Failed,
}

impl TransactionStatus {
    /// Whether `self -> next` is a legal transition in the status lattice: `Simulated <
    /// Queued < Executed` and `Simulated < Failed`. Downgrades, and transitions not expressible
    /// in the lattice (e.g. `Queued -> Failed`... actually permitted below), are rejected.
    pub fn can_advance_to(self, next: TransactionStatus) -> bool {
        use TransactionStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Simulated, Queued | Executed | Failed) => true,
            (Queued, Executed | Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub op_type: String,
    pub target: String,
    pub method: String,
    pub result: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeContext {
    pub safe_address: String,
    pub safe_tx_hash: String,
    pub batch_index: u64,
    pub proposer_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub chain_id: ChainId,
    pub hash: Option<String>,
    pub block_number: Option<u64>,
    pub sender: String,
    pub nonce: Option<u64>,
    pub status: TransactionStatus,
    #[serde(default)]
    pub deployments: Vec<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    pub safe_context: Option<SafeContext>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(TrebError::InvalidArgument("transaction id must not be empty".into()));
        }
        if self.status == TransactionStatus::Executed
            && (self.hash.is_none() || self.block_number.is_none())
        {
            return Err(TrebError::InvalidArgument(format!(
                "transaction `{}` is Executed but is missing hash/blockNumber",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafeTxOperation {
    Call,
    DelegateCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeTxEntry {
    pub to: String,
    pub value: String,
    pub data: String,
    pub operation: SafeTxOperation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confirmation {
    pub signer: String,
    pub signature: String,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafeTransaction {
    pub safe_tx_hash: String,
    pub chain_id: ChainId,
    pub safe_address: String,
    pub nonce: u64,
    pub status: TransactionStatus,
    pub transactions: Vec<SafeTxEntry>,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
    pub proposed_by: String,
    pub proposed_at: DateTime<Utc>,
    #[serde(default)]
    pub confirmations: Vec<Confirmation>,
    pub executed_at: Option<DateTime<Utc>>,
    pub execution_tx_hash: Option<String>,
}

impl SafeTransaction {
    pub fn validate(&self) -> Result<()> {
        if self.safe_tx_hash.is_empty() {
            return Err(TrebError::InvalidArgument("safeTxHash must not be empty".into()));
        }
        if self.status == TransactionStatus::Executed && self.execution_tx_hash.is_none() {
            return Err(TrebError::InvalidArgument(format!(
                "safe tx `{}` is Executed but has no executionTxHash",
                self.safe_tx_hash
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernorStatus {
    Pending,
    Active,
    Succeeded,
    Queued,
    Executed,
    Canceled,
    Defeated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernorProposal {
    pub proposal_id: String,
    pub governor_address: String,
    pub timelock_address: Option<String>,
    pub chain_id: ChainId,
    pub status: GovernorStatus,
    pub transactions: Vec<SafeTxEntry>,
    #[serde(default)]
    pub transaction_ids: Vec<String>,
    pub proposed_by: String,
    pub proposed_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub execution_tx_hash: Option<String>,
}
