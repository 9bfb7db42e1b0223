//! Parameter resolver (C4): turns declared script parameters plus raw string values into the
//! ABI-encoded map the executor packs into a single blob for the forge driver.

use crate::deployment_ref::{self, ReferenceContext};
use crate::selector_util::resolve_ambiguous_by;
use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{I256, U256};
use indexmap::IndexMap;
use std::str::FromStr;
use treb_common::error::{Result, TrebError};
use treb_common::ids::parse_address;
use treb_contracts::{ContractQuery, ContractRepository, NonInteractiveSelector};
use treb_registry::RegistryStore;
use treb_senders::SenderScriptConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Address,
    Uint256,
    Int256,
    Bytes32,
    Bytes,
    Bool,
    Sender,
    Deployment,
    Artifact,
}

impl FromStr for ParameterType {
    type Err = TrebError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "string" => Ok(Self::String),
            "address" => Ok(Self::Address),
            "uint256" => Ok(Self::Uint256),
            "int256" => Ok(Self::Int256),
            "bytes32" => Ok(Self::Bytes32),
            "bytes" => Ok(Self::Bytes),
            "bool" => Ok(Self::Bool),
            "sender" => Ok(Self::Sender),
            "deployment" => Ok(Self::Deployment),
            "artifact" => Ok(Self::Artifact),
            other => Err(TrebError::InvalidArgument(format!("unknown parameter type `{other}`"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterDecl {
    pub name: String,
    pub param_type: ParameterType,
    pub description: String,
    pub optional: bool,
}

/// An already-resolved value, ABI-encoded and tagged with the declared type it came from.
#[derive(Debug, Clone)]
pub struct EncodedValue {
    pub param_type: ParameterType,
    pub abi_bytes: Vec<u8>,
}

/// Injected prompter for missing values in interactive mode. Non-interactive callers use
/// [`NonInteractivePrompter`].
pub trait ParameterPrompter: Send + Sync {
    fn prompt_value(&self, name: &str, description: &str) -> Result<String>;
}

pub struct NonInteractivePrompter;

impl ParameterPrompter for NonInteractivePrompter {
    fn prompt_value(&self, name: &str, _description: &str) -> Result<String> {
        Err(TrebError::MissingParameter(name.to_string()))
    }
}

/// Collaborators the resolver needs for `sender`/`deployment`/`artifact` parameter types.
pub struct ResolutionContext<'a> {
    pub senders: &'a SenderScriptConfig,
    pub registry: &'a RegistryStore,
    pub contracts: &'a ContractRepository,
    pub reference: &'a ReferenceContext,
}

fn encode_primitive(param_type: ParameterType, raw: &str) -> Result<Vec<u8>> {
    let value = match param_type {
        ParameterType::String => DynSolValue::String(raw.to_string()),
        ParameterType::Address => DynSolValue::Address(parse_address(raw)?),
        ParameterType::Uint256 => {
            let parsed = U256::from_str(raw)
                .map_err(|e| TrebError::InvalidArgument(format!("invalid uint256 `{raw}`: {e}")))?;
            DynSolValue::Uint(parsed, 256)
        }
        ParameterType::Int256 => {
            let parsed = I256::from_str(raw)
                .map_err(|e| TrebError::InvalidArgument(format!("invalid int256 `{raw}`: {e}")))?;
            DynSolValue::Int(parsed, 256)
        }
        ParameterType::Bytes32 => {
            let bytes = hex::decode(raw.trim_start_matches("0x"))
                .map_err(|e| TrebError::InvalidArgument(format!("invalid bytes32 `{raw}`: {e}")))?;
            if bytes.len() != 32 {
                return Err(TrebError::InvalidArgument(format!("bytes32 `{raw}` is not 32 bytes")));
            }
            let mut fixed = [0u8; 32];
            fixed.copy_from_slice(&bytes);
            DynSolValue::FixedBytes(fixed.into(), 32)
        }
        ParameterType::Bytes => {
            let bytes = hex::decode(raw.trim_start_matches("0x"))
                .map_err(|e| TrebError::InvalidArgument(format!("invalid bytes `{raw}`: {e}")))?;
            DynSolValue::Bytes(bytes)
        }
        ParameterType::Bool => {
            let parsed = raw
                .parse::<bool>()
                .map_err(|e| TrebError::InvalidArgument(format!("invalid bool `{raw}`: {e}")))?;
            DynSolValue::Bool(parsed)
        }
        ParameterType::Sender | ParameterType::Deployment | ParameterType::Artifact => {
            unreachable!("handled by resolve() before reaching encode_primitive")
        }
    };
    Ok(value.abi_encode())
}

fn resolve_sender_address(senders: &SenderScriptConfig, role: &str) -> Result<String> {
    senders
        .senders
        .iter()
        .find(|s| s.role == role)
        .map(|s| s.address.clone())
        .ok_or_else(|| TrebError::InvalidArgument(format!("unknown sender role `{role}`")))
}

/// Resolves `declared` parameters against `raw_values`, using `ctx` for `sender`/`deployment`/
/// `artifact` lookups and `prompter` for missing optional-turned-interactive values.
pub fn resolve(
    declared: &[ParameterDecl],
    raw_values: &IndexMap<String, String>,
    ctx: &ResolutionContext<'_>,
    prompter: &dyn ParameterPrompter,
) -> Result<IndexMap<String, EncodedValue>> {
    let mut resolved = IndexMap::with_capacity(declared.len());

    for decl in declared {
        let raw = match raw_values.get(&decl.name) {
            Some(v) => v.clone(),
            None if decl.optional => continue,
            None => prompter.prompt_value(&decl.name, &decl.description)?,
        };

        let abi_bytes = match decl.param_type {
            ParameterType::Sender => {
                let address = resolve_sender_address(ctx.senders, &raw)?;
                DynSolValue::Address(parse_address(&address)?).abi_encode()
            }
            ParameterType::Deployment => {
                let deployment =
                    deployment_ref::resolve(&raw, ctx.reference, ctx.registry, &NonInteractiveSelector)?;
                DynSolValue::Address(parse_address(&deployment.address)?).abi_encode()
            }
            ParameterType::Artifact => {
                let matches = ctx.contracts.search_contracts(&ContractQuery { query: Some(raw.clone()), path_pattern: None })?;
                let contract = resolve_ambiguous_by(matches, |c| c.key(), &NonInteractiveSelector, &raw)?;
                DynSolValue::String(contract.key()).abi_encode()
            }
            other => encode_primitive(other, &raw)?,
        };

        resolved.insert(decl.name.clone(), EncodedValue { param_type: decl.param_type, abi_bytes });
    }

    Ok(resolved)
}

/// Packs resolved parameters into the single blob `TREB_PARAM_CONFIG` carries: each entry as
/// `name length + name + value length + value`, in declaration order, mirroring the sender
/// config's length-prefixed packing in the executor.
pub fn pack(resolved: &IndexMap<String, EncodedValue>) -> Vec<u8> {
    let mut packed = Vec::new();
    for (name, value) in resolved {
        packed.extend_from_slice(&(name.len() as u32).to_be_bytes());
        packed.extend_from_slice(name.as_bytes());
        packed.extend_from_slice(&(value.abi_bytes.len() as u32).to_be_bytes());
        packed.extend_from_slice(&value.abi_bytes);
    }
    packed
}
