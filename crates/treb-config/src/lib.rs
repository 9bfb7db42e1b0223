//! Runtime configuration: the merged view of `treb.toml` plus environment overrides that every
//! other component reads chain RPC URLs, namespace→profile mappings, and external service URL
//! tables from (component C0 in the expanded overview).

mod logging;
mod safe_urls;

pub use logging::init_logging;
pub use safe_urls::default_safe_service_url;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use treb_common::ids::ChainId;
use treb_common::Result;

/// Per-namespace settings: which compiler profile a namespace (`production`, `staging`, ...)
/// maps to.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NamespaceConfig {
    pub profile: String,
}

/// Per-chain settings: RPC URL and, optionally, an explorer API endpoint/key override.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChainConfig {
    pub rpc_url: Option<String>,
    pub explorer_api_url: Option<String>,
    pub explorer_api_key: Option<String>,
    pub safe_service_url: Option<String>,
}

/// The fully merged runtime configuration, built from `treb.toml` in the project root plus
/// `TREB_`-prefixed environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Root of the foundry project this config was loaded for.
    #[serde(skip)]
    pub project_root: PathBuf,

    /// Directory holding `deployments.json`, `transactions.json`, `safe-txs.json`,
    /// `registry.json`. Defaults to `<project_root>/.treb`.
    pub registry_dir: PathBuf,

    /// Directory holding compiled artifacts, scanned by the contract repository. Defaults to
    /// `<project_root>/out`.
    pub out_dir: PathBuf,

    pub namespaces: BTreeMap<String, NamespaceConfig>,

    /// Keyed by the chain id rendered as a decimal string — TOML table keys are always
    /// strings, so `[chains.1]` deserializes here and is exposed to callers via
    /// [`RuntimeConfig::rpc_url`]/[`RuntimeConfig::safe_service_url`] which take a numeric
    /// [`ChainId`] directly.
    pub chains: BTreeMap<String, ChainConfig>,

    /// Default namespace used when a deployment reference omits one.
    pub default_namespace: Option<String>,

    /// Bounded worker pool size used by sync/prune/verify, per the concurrency model.
    pub worker_pool_size: usize,

    /// Script execution deadline in seconds (default 5 minutes per the script executor spec).
    pub script_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            registry_dir: PathBuf::from(".treb"),
            out_dir: PathBuf::from("out"),
            namespaces: BTreeMap::new(),
            chains: BTreeMap::new(),
            default_namespace: None,
            worker_pool_size: 8,
            script_timeout_secs: 300,
        }
    }
}

impl RuntimeConfig {
    /// Loads `<project_root>/treb.toml` (if present) layered under defaults, then layers
    /// `TREB_*` environment variables on top. A missing `treb.toml` is not an error — the
    /// on-disk registry layout's "a missing file is treated as empty" rule applies here too.
    pub fn load(project_root: impl AsRef<Path>) -> Result<Self> {
        let project_root = project_root.as_ref().to_path_buf();
        let toml_path = project_root.join("treb.toml");

        let figment = Figment::from(Serialized::defaults(RuntimeConfig::default()))
            .merge(Toml::file(&toml_path))
            .merge(Env::prefixed("TREB_").split("__"));

        let mut config: RuntimeConfig = figment
            .extract()
            .map_err(|e| treb_common::TrebError::InvalidArgument(format!("invalid treb.toml: {e}")))?;

        if config.registry_dir.is_relative() {
            config.registry_dir = project_root.join(&config.registry_dir);
        }
        if config.out_dir.is_relative() {
            config.out_dir = project_root.join(&config.out_dir);
        }
        config.project_root = project_root;
        Ok(config)
    }

    /// RPC URL for `chain_id`, falling back to `None` if the chain isn't configured — the
    /// script executor surfaces this as [`treb_common::TrebError::InvalidArgument`].
    pub fn rpc_url(&self, chain_id: ChainId) -> Option<&str> {
        self.chains.get(&chain_id.to_string()).and_then(|c| c.rpc_url.as_deref())
    }

    /// The compiler profile for `namespace`, defaulting to `"default"` when unconfigured.
    pub fn profile_for_namespace(&self, namespace: &str) -> String {
        self.namespaces
            .get(namespace)
            .map(|n| n.profile.clone())
            .unwrap_or_else(|| "default".to_string())
    }

    /// Resolves the Safe transaction service URL for `chain_id`: an explicit override from
    /// `treb.toml` if present, else the built-in table of official URLs from the external
    /// interfaces spec.
    pub fn safe_service_url(&self, chain_id: ChainId) -> Option<String> {
        self.chains
            .get(&chain_id.to_string())
            .and_then(|c| c.safe_service_url.clone())
            .or_else(|| default_safe_service_url(chain_id).map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_no_toml_present() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::load(dir.path()).unwrap();
        assert_eq!(config.registry_dir, dir.path().join(".treb"));
        assert_eq!(config.profile_for_namespace("anything"), "default");
    }

    #[test]
    fn loads_namespace_and_chain_tables_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("treb.toml")).unwrap();
        writeln!(
            file,
            r#"
            default_namespace = "production"

            [namespaces.production]
            profile = "release"

            [chains.1]
            rpc_url = "https://eth.example/rpc"
            "#
        )
        .unwrap();

        let config = RuntimeConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_namespace.as_deref(), Some("production"));
        assert_eq!(config.profile_for_namespace("production"), "release");
        assert_eq!(config.rpc_url(1), Some("https://eth.example/rpc"));
    }

    #[test]
    fn safe_service_url_override_beats_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("treb.toml")).unwrap();
        writeln!(
            file,
            r#"
            [chains.1]
            safe_service_url = "https://custom.safe.example"
            "#
        )
        .unwrap();
        let config = RuntimeConfig::load(dir.path()).unwrap();
        assert_eq!(config.safe_service_url(1).as_deref(), Some("https://custom.safe.example"));
        assert_eq!(
            config.safe_service_url(137).as_deref(),
            default_safe_service_url(137)
        );
    }
}
