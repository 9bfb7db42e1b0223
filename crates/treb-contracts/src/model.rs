//! A compiler artifact indexed from `<project>/out/`, per the contract repository's data
//! model. Not a registry entity — it is never persisted by this crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub path: String,
    pub artifact_path: String,
    pub compiler_version: String,
    pub bytecode_hash: String,
    pub abi: serde_json::Value,
}

impl Contract {
    /// The `path:name` key the repository indexes contracts under.
    pub fn key(&self) -> String {
        format!("{}:{}", self.path, self.name)
    }
}

/// Conjunctive contract query: `query` is matched case-insensitively as a substring of
/// `path:name`; `path_pattern` is a regex over the path component.
#[derive(Debug, Clone, Default)]
pub struct ContractQuery {
    pub query: Option<String>,
    pub path_pattern: Option<String>,
}

/// The raw shape of a forge-style compiler artifact JSON file, tolerant of the fields this
/// repository doesn't need.
#[derive(Debug, Deserialize)]
pub struct ForgeArtifactJson {
    pub abi: serde_json::Value,
    pub bytecode: ForgeBytecode,
    #[serde(default)]
    pub metadata: Option<ForgeArtifactMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct ForgeBytecode {
    pub object: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgeArtifactMetadata {
    #[serde(default)]
    pub compiler: Option<ForgeCompilerInfo>,
    #[serde(default)]
    pub settings: Option<ForgeSettings>,
}

#[derive(Debug, Deserialize)]
pub struct ForgeCompilerInfo {
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgeSettings {
    #[serde(default, rename = "compilationTarget")]
    pub compilation_target: std::collections::BTreeMap<String, String>,
}
