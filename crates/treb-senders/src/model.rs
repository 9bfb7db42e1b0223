//! The `Sender` data model: a closed, tagged-variant hierarchy. Not a registry entity — this
//! is resolved fresh for every `run` invocation from namespace configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardwareKind {
    Ledger,
    Trezor,
}

/// A declared sender as read from namespace configuration, before resolution. References to
/// other senders (`signer`, `proposer`) are role names, resolved against the same map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Sender {
    PrivateKey { private_key: String },
    Safe { safe_address: String, signer: String },
    Hardware { kind: HardwareKind, address: Option<String>, derivation_path: String },
    Governor { address: String, timelock: Option<String>, proposer: String },
}

impl Sender {
    /// The role this sender references, if any — the edge the cycle-detector walks.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Sender::Safe { signer, .. } => Some(signer),
            Sender::Governor { proposer, .. } => Some(proposer),
            Sender::PrivateKey { .. } | Sender::Hardware { .. } => None,
        }
    }

    /// Whether this sender variant is capable of broadcasting a transaction directly (as
    /// opposed to queuing one for later execution, like a Safe or Governor proposal).
    pub fn can_broadcast(&self) -> bool {
        matches!(self, Sender::PrivateKey { .. } | Sender::Hardware { .. })
    }

    /// The magic 8-byte type tag the script contract switches on.
    pub fn type_tag(&self) -> [u8; 8] {
        match self {
            Sender::PrivateKey { .. } => *b"PK______",
            Sender::Safe { .. } => *b"SAFE____",
            Sender::Hardware { kind: HardwareKind::Ledger, .. } => *b"LEDGER__",
            Sender::Hardware { kind: HardwareKind::Trezor, .. } => *b"TREZOR__",
            Sender::Governor { .. } => *b"GOVERNOR",
        }
    }
}

/// A sender after address resolution, ready to be encoded into the script's init blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSender {
    pub role: String,
    pub address: String,
    pub type_tag: [u8; 8],
    pub can_broadcast: bool,
    pub config_payload: Vec<u8>,
}

/// The output consumed by the deployment script through environment variables.
#[derive(Debug, Clone, Default)]
pub struct SenderScriptConfig {
    pub senders: Vec<ResolvedSender>,
    pub use_ledger: Vec<String>,
    pub use_trezor: Vec<String>,
}
