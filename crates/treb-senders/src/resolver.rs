//! Resolves a namespace's `role -> Sender` map into a [`SenderScriptConfig`]: topological
//! ordering, address derivation, and typed init-blob encoding.

use crate::model::{HardwareKind, ResolvedSender, Sender, SenderScriptConfig};
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::Address;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::str::FromStr;
use treb_common::error::{Result, TrebError};
use treb_common::ids::parse_address;

/// Hardware wallet address resolution is the one piece of I/O this component needs; it is
/// injected so the resolver itself stays purely functional and testable without real devices.
pub trait HardwareWalletResolver: Send + Sync {
    fn resolve_address(&self, kind: HardwareKind, derivation_path: &str) -> Result<String>;
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Mark {
    InProgress,
    Done,
}

/// Topologically orders `senders` by reference (`Safe.signer`, `Governor.proposer`), failing
/// with `CyclicSenderReference` on a cycle. The order places each referenced sender before the
/// sender that references it.
fn topo_order(senders: &IndexMap<String, Sender>) -> Result<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(senders.len());

    fn visit<'a>(
        role: &'a str,
        senders: &'a IndexMap<String, Sender>,
        marks: &mut HashMap<&'a str, Mark>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(role) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::InProgress) => return Err(TrebError::CyclicSenderReference(role.to_string())),
            None => {}
        }
        let Some(sender) = senders.get(role) else {
            return Err(TrebError::InvalidArgument(format!("unknown sender role `{role}`")));
        };
        marks.insert(role, Mark::InProgress);
        if let Some(reference) = sender.reference() {
            if !senders.contains_key(reference) {
                return Err(TrebError::InvalidArgument(format!(
                    "sender `{role}` references unknown sender `{reference}`"
                )));
            }
            visit(reference, senders, marks, order)?;
        }
        marks.insert(role, Mark::Done);
        order.push(role.to_string());
        Ok(())
    }

    for role in senders.keys() {
        visit(role, senders, &mut marks, &mut order)?;
    }
    Ok(order)
}

fn derive_private_key_address(private_key: &str) -> Result<String> {
    let signer = PrivateKeySigner::from_str(private_key.trim_start_matches("0x"))
        .map_err(|e| TrebError::InvalidArgument(format!("invalid private key: {e}")))?;
    Ok(format!("{:#x}", signer.address()))
}

fn encode_payload(values: &[DynSolValue]) -> Vec<u8> {
    DynSolValue::Tuple(values.to_vec()).abi_encode()
}

/// Resolves every sender in `senders`, in topological order, into a [`SenderScriptConfig`].
pub fn resolve(
    senders: &IndexMap<String, Sender>,
    hardware: &dyn HardwareWalletResolver,
) -> Result<SenderScriptConfig> {
    let order = topo_order(senders)?;
    tracing::debug!(roles = ?order, "resolved sender topological order");
    let mut resolved_addresses: HashMap<String, String> = HashMap::new();
    let mut config = SenderScriptConfig::default();

    for role in order {
        let sender = senders.get(&role).expect("topo_order only emits known roles");
        let address = match sender {
            Sender::PrivateKey { private_key } => derive_private_key_address(private_key)?,
            Sender::Hardware { kind, address, derivation_path } => match address {
                Some(addr) => addr.clone(),
                None => {
                    let resolved = hardware.resolve_address(*kind, derivation_path)?;
                    parse_address(&resolved)
                        .map_err(|_| TrebError::InvalidArgument(format!("malformed hardware wallet address `{resolved}`")))?;
                    resolved
                }
            },
            Sender::Safe { safe_address, .. } => safe_address.clone(),
            Sender::Governor { address, .. } => address.clone(),
        };
        parse_address(&address)
            .map_err(|_| TrebError::InvalidArgument(format!("sender `{role}` resolved to malformed address `{address}`")))?;

        let config_payload = match sender {
            Sender::PrivateKey { .. } => Vec::new(),
            Sender::Hardware { derivation_path, .. } => {
                encode_payload(&[DynSolValue::String(derivation_path.clone())])
            }
            Sender::Safe { signer, .. } => {
                let signer_address = resolved_addresses.get(signer).ok_or_else(|| {
                    TrebError::InvalidArgument(format!("signer `{signer}` for sender `{role}` was not resolved"))
                })?;
                let addr = Address::from_str(signer_address)
                    .map_err(|e| TrebError::InvalidArgument(format!("bad signer address: {e}")))?;
                encode_payload(&[DynSolValue::Address(addr)])
            }
            Sender::Governor { timelock, proposer, .. } => {
                let proposer_address = resolved_addresses.get(proposer).ok_or_else(|| {
                    TrebError::InvalidArgument(format!("proposer `{proposer}` for sender `{role}` was not resolved"))
                })?;
                let proposer_addr = Address::from_str(proposer_address)
                    .map_err(|e| TrebError::InvalidArgument(format!("bad proposer address: {e}")))?;
                let timelock_addr = match timelock {
                    Some(t) => Address::from_str(t)
                        .map_err(|e| TrebError::InvalidArgument(format!("bad timelock address: {e}")))?,
                    None => Address::ZERO,
                };
                encode_payload(&[DynSolValue::Address(timelock_addr), DynSolValue::Address(proposer_addr)])
            }
        };

        if let Sender::Hardware { kind, derivation_path, .. } = sender {
            match kind {
                HardwareKind::Ledger => config.use_ledger.push(derivation_path.clone()),
                HardwareKind::Trezor => config.use_trezor.push(derivation_path.clone()),
            }
        }

        resolved_addresses.insert(role.clone(), address.clone());
        config.senders.push(ResolvedSender {
            role,
            address,
            type_tag: sender.type_tag(),
            can_broadcast: sender.can_broadcast(),
            config_payload,
        });
    }

    Ok(config)
}
