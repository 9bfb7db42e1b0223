//! The real `ForgeDriver` the contract repository uses for build-on-miss: shells out to
//! `forge build` once per process.

use std::path::Path;
use std::process::Command;
use treb_common::error::{Result, TrebError};
use treb_contracts::ForgeDriver;

pub struct SystemForgeDriver {
    binary: String,
}

impl SystemForgeDriver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for SystemForgeDriver {
    fn default() -> Self {
        Self::new("forge")
    }
}

impl ForgeDriver for SystemForgeDriver {
    fn compile(&self, project_root: &Path) -> Result<()> {
        tracing::info!(project_root = %project_root.display(), "building project via forge");
        let output = Command::new(&self.binary)
            .arg("build")
            .current_dir(project_root)
            .output()
            .map_err(|e| TrebError::ExternalToolFailure { tool: "forge".to_string(), reason: e.to_string() })?;
        if !output.status.success() {
            return Err(TrebError::ExternalToolFailure {
                tool: "forge".to_string(),
                reason: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(())
    }
}
