//! The contract repository (C2): indexes compiler artifacts under `<project>/out/`, with
//! build-on-miss delegated to an injected forge driver.

use crate::model::{Contract, ContractQuery, ForgeArtifactJson};
use crate::selector::{NonInteractiveSelector, Selector};
use alloy_primitives::keccak256;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use treb_common::error::{Result, TrebError};

/// Injected collaborator for build-on-miss: invokes the external forge driver to (re)compile
/// the project once per process.
pub trait ForgeDriver: Send + Sync {
    fn compile(&self, project_root: &Path) -> Result<()>;
}

struct Cache {
    by_key: BTreeMap<String, Contract>,
    by_name: BTreeMap<String, Vec<String>>,
    indexed: bool,
    compiled_this_process: bool,
}

impl Cache {
    fn empty() -> Self {
        Self { by_key: BTreeMap::new(), by_name: BTreeMap::new(), indexed: false, compiled_this_process: false }
    }
}

pub struct ContractRepository {
    project_root: PathBuf,
    out_dir: PathBuf,
    driver: Box<dyn ForgeDriver>,
    cache: Mutex<Cache>,
}

impl ContractRepository {
    pub fn new(project_root: impl Into<PathBuf>, out_dir: impl Into<PathBuf>, driver: Box<dyn ForgeDriver>) -> Self {
        Self { project_root: project_root.into(), out_dir: out_dir.into(), driver, cache: Mutex::new(Cache::empty()) }
    }

    /// Walks `out/` once and caches the result; subsequent calls are no-ops. Mutation is
    /// serialized by the cache mutex.
    pub fn index(&self) -> Result<()> {
        let mut cache = self.cache.lock();
        if cache.indexed {
            return Ok(());
        }
        self.scan_locked(&mut cache)?;
        cache.indexed = true;
        Ok(())
    }

    fn scan_locked(&self, cache: &mut Cache) -> Result<()> {
        cache.by_key.clear();
        cache.by_name.clear();
        if !self.out_dir.exists() {
            return Ok(());
        }
        for entry in walkdir::WalkDir::new(&self.out_dir).into_iter().filter_map(std::result::Result::ok) {
            if entry.file_type().is_file() && entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                if let Some(contract) = self.parse_artifact(entry.path())? {
                    cache.by_name.entry(contract.name.clone()).or_default().push(contract.key());
                    cache.by_key.insert(contract.key(), contract);
                }
            }
        }
        Ok(())
    }

    fn parse_artifact(&self, artifact_path: &Path) -> Result<Option<Contract>> {
        let bytes = std::fs::read(artifact_path)?;
        let Ok(artifact) = serde_json::from_slice::<ForgeArtifactJson>(&bytes) else {
            return Ok(None);
        };
        let name = artifact_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| TrebError::InvalidArgument(format!("bad artifact filename `{}`", artifact_path.display())))?
            .to_string();

        let path = artifact
            .metadata
            .as_ref()
            .and_then(|m| m.settings.as_ref())
            .and_then(|s| s.compilation_target.keys().next().cloned())
            .unwrap_or_else(|| {
                artifact_path
                    .parent()
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                    .unwrap_or(&name)
                    .to_string()
            });

        let compiler_version = artifact
            .metadata
            .as_ref()
            .and_then(|m| m.compiler.as_ref())
            .map(|c| c.version.clone())
            .unwrap_or_default();

        let bytecode = artifact.bytecode.object.trim_start_matches("0x");
        let bytecode_bytes = hex::decode(bytecode).unwrap_or_default();
        let bytecode_hash = format!("{:#x}", keccak256(&bytecode_bytes));

        Ok(Some(Contract {
            name,
            path,
            artifact_path: artifact_path.to_string_lossy().into_owned(),
            compiler_version,
            bytecode_hash,
            abi: artifact.abi,
        }))
    }

    fn matches(contract: &Contract, query: &ContractQuery) -> Result<bool> {
        let key_matches = query
            .query
            .as_deref()
            .map(|q| contract.key().to_lowercase().contains(&q.to_lowercase()))
            .unwrap_or(true);
        let path_matches = match &query.path_pattern {
            Some(pattern) => {
                let re = Regex::new(pattern)
                    .map_err(|e| TrebError::InvalidArgument(format!("invalid path pattern `{pattern}`: {e}")))?;
                re.is_match(&contract.path)
            }
            None => true,
        };
        Ok(key_matches && path_matches)
    }

    /// Queries the cache; on an empty result, invokes the forge driver to compile the project
    /// once per process and re-scans. Ambiguous matches fail in non-interactive mode (the
    /// default selector).
    pub fn get_contract(&self, query: &ContractQuery) -> Result<Contract> {
        self.get_contract_with(query, &NonInteractiveSelector)
    }

    pub fn get_contract_with(&self, query: &ContractQuery, selector: &dyn Selector<Contract>) -> Result<Contract> {
        self.index()?;
        let matches = self.search_locked(query, true)?;
        self.resolve_single(matches, selector, "contract")
    }

    /// Same build-on-miss semantics as [`Self::get_contract`], but returns all matches rather
    /// than requiring exactly one.
    pub fn search_contracts(&self, query: &ContractQuery) -> Result<Vec<Contract>> {
        self.index()?;
        self.search_locked(query, true)
    }

    /// Lookup-only variant for output-rendering paths where the driver has already run. Never
    /// invokes the driver, avoiding the infinite-compile-loop the design notes warn about.
    pub fn find_contracts(&self, query: &ContractQuery) -> Result<Vec<Contract>> {
        self.index()?;
        self.search_locked(query, false)
    }

    /// Looks up contracts by their bare name (ignoring path), via the secondary index. Never
    /// triggers a build.
    pub fn contracts_named(&self, name: &str) -> Result<Vec<Contract>> {
        self.index()?;
        let cache = self.cache.lock();
        Ok(cache
            .by_name
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|key| cache.by_key.get(key).cloned())
            .collect())
    }

    fn search_locked(&self, query: &ContractQuery, allow_build: bool) -> Result<Vec<Contract>> {
        let mut cache = self.cache.lock();
        let mut matches = Vec::new();
        for contract in cache.by_key.values() {
            if Self::matches(contract, query)? {
                matches.push(contract.clone());
            }
        }
        if matches.is_empty() && allow_build && !cache.compiled_this_process {
            cache.compiled_this_process = true;
            drop(cache);
            tracing::debug!(project_root = %self.project_root.display(), "no cached contract matched, building");
            self.driver.compile(&self.project_root)?;
            let mut cache = self.cache.lock();
            self.scan_locked(&mut cache)?;
            drop(cache);
            let cache = self.cache.lock();
            for contract in cache.by_key.values() {
                if Self::matches(contract, query)? {
                    matches.push(contract.clone());
                }
            }
        }
        Ok(matches)
    }

    fn resolve_single(
        &self,
        matches: Vec<Contract>,
        selector: &dyn Selector<Contract>,
        prompt: &str,
    ) -> Result<Contract> {
        match matches.len() {
            0 => Err(TrebError::NotFound(format!("no contract matched `{prompt}`"))),
            1 => Ok(matches.into_iter().next().unwrap()),
            _ => {
                let candidates: Vec<(String, Contract)> =
                    matches.into_iter().map(|c| (c.key(), c)).collect();
                selector.select_one(&candidates, prompt)
            }
        }
    }

    /// Textual `library <name>` heuristic: a known-fragile approximation of an AST check, kept
    /// verbatim per the design notes' open question.
    pub fn is_library_source(&self, source_path: &Path) -> Result<bool> {
        let Ok(contents) = std::fs::read_to_string(source_path) else {
            return Ok(false);
        };
        let re = Regex::new(r"(?m)^\s*library\s+\w+").expect("static pattern is valid");
        Ok(re.is_match(&contents))
    }
}
