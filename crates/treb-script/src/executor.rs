//! Script executor (C5): invokes the external forge driver with the resolved sender/parameter
//! configuration and a deadline, returning the raw process output uninterpreted.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use treb_common::error::{Result, TrebError};
use treb_common::CancelToken;
use treb_senders::SenderScriptConfig;

#[derive(Debug, Clone, Default)]
pub struct ScriptInvocation {
    pub script_artifact: String,
    pub rpc_url: String,
    pub profile: String,
    pub namespace: String,
    pub senders: SenderScriptConfig,
    pub packed_parameters: Vec<u8>,
    pub libraries: Vec<String>,
    pub broadcast: bool,
    pub slow: bool,
    pub verbosity: u8,
}

#[derive(Debug, Clone)]
pub struct ScriptExecutionOutput {
    pub success: bool,
    pub raw_output: String,
    pub json_output: Option<serde_json::Value>,
    pub broadcast_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ForgeScriptEnvelope {
    #[serde(default)]
    success: bool,
}

impl ScriptInvocation {
    fn env_vars(&self) -> Vec<(String, String)> {
        vec![
            ("TREB_PROFILE".to_string(), self.profile.clone()),
            ("TREB_NAMESPACE".to_string(), self.namespace.clone()),
            ("TREB_SENDER_CONFIG".to_string(), encode_sender_config(&self.senders)),
            ("TREB_PARAM_CONFIG".to_string(), hex::encode(&self.packed_parameters)),
        ]
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "script".to_string(),
            self.script_artifact.clone(),
            "--rpc-url".to_string(),
            self.rpc_url.clone(),
            "--json".to_string(),
        ];
        if self.broadcast {
            args.push("--broadcast".to_string());
        }
        if self.slow {
            args.push("--slow".to_string());
        }
        for lib in &self.libraries {
            args.push("--libraries".to_string());
            args.push(lib.clone());
        }
        if !self.senders.use_ledger.is_empty() {
            args.push("--ledger".to_string());
        }
        if !self.senders.use_trezor.is_empty() {
            args.push("--trezor".to_string());
        }
        for path in self.senders.use_ledger.iter().chain(self.senders.use_trezor.iter()) {
            args.push("--mnemonic-derivation-path".to_string());
            args.push(path.clone());
        }
        if self.verbosity > 0 {
            args.push(format!("-{}", "v".repeat(self.verbosity as usize)));
        }
        args
    }
}

fn encode_sender_config(senders: &SenderScriptConfig) -> String {
    let mut packed = Vec::new();
    for sender in &senders.senders {
        packed.extend_from_slice(&sender.type_tag);
        packed.extend_from_slice(sender.address.as_bytes());
        packed.push(u8::from(sender.can_broadcast));
        packed.extend_from_slice(&(sender.config_payload.len() as u32).to_be_bytes());
        packed.extend_from_slice(&sender.config_payload);
    }
    hex::encode(packed)
}

/// Thin wrapper over the `forge` binary invocation so tests can substitute a fake process.
#[async_trait::async_trait]
pub trait ForgeScriptDriver: Send + Sync {
    async fn invoke(&self, invocation: &ScriptInvocation, cancel: &CancelToken) -> Result<ScriptExecutionOutput>;
}

/// Invokes the real `forge` binary via `tokio::process::Command`.
pub struct SystemForgeScriptDriver {
    pub binary: String,
    pub project_root: PathBuf,
}

#[async_trait::async_trait]
impl ForgeScriptDriver for SystemForgeScriptDriver {
    async fn invoke(&self, invocation: &ScriptInvocation, cancel: &CancelToken) -> Result<ScriptExecutionOutput> {
        let mut command = Command::new(&self.binary);
        command.current_dir(&self.project_root).args(invocation.args());
        for (key, value) in invocation.env_vars() {
            command.env(key, value);
        }

        let mut child = command
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| TrebError::ExternalToolFailure { tool: "forge".to_string(), reason: e.to_string() })?;

        tokio::select! {
            output = child.wait_with_output() => {
                let output = output.map_err(|e| TrebError::ExternalToolFailure { tool: "forge".to_string(), reason: e.to_string() })?;
                parse_output(output)
            }
            _ = cancel.cancelled() => {
                Err(TrebError::ExternalToolFailure { tool: "forge".to_string(), reason: "cancelled".to_string() })
            }
        }
    }
}

fn parse_output(output: std::process::Output) -> Result<ScriptExecutionOutput> {
    let raw_output = String::from_utf8_lossy(&output.stdout).into_owned();
    let json_output = serde_json::from_str::<serde_json::Value>(&raw_output).ok();
    let envelope_success = json_output
        .as_ref()
        .and_then(|v| serde_json::from_value::<ForgeScriptEnvelope>(v.clone()).ok())
        .map(|e| e.success)
        .unwrap_or(false);

    Ok(ScriptExecutionOutput {
        success: output.status.success() && envelope_success,
        raw_output,
        json_output,
        broadcast_path: None,
    })
}

/// Runs `driver.invoke` under `timeout`, mapping an elapsed deadline to `TrebError::Timeout`.
/// A caller that observes `Timeout` must treat the execution as indeterminate, per the
/// concurrency model.
pub async fn run(
    driver: &dyn ForgeScriptDriver,
    invocation: &ScriptInvocation,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<ScriptExecutionOutput> {
    match tokio::time::timeout(timeout, driver.invoke(invocation, cancel)).await {
        Ok(result) => result,
        Err(_) => Err(TrebError::Timeout(timeout)),
    }
}
