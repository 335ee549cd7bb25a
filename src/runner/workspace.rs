//! Per-pair workspaces.
//!
//! A workspace is destroyed and recreated from the scenario's setup files at
//! the start of every attempt, so no attempt sees another attempt's output.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::validation::tool_log_path;

/// A freshly prepared working directory for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub path: PathBuf,
}

impl Workspace {
    /// Recreates `{root}/{slug}` and writes every setup file into it.
    pub fn recreate(
        root: &Path,
        slug: &str,
        setup: &BTreeMap<String, String>,
    ) -> io::Result<Self> {
        let path = root.join(slug);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;

        for (relative, content) in setup {
            let target = path.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
        }

        let workspace = Self { path };
        if let Some(parent) = workspace.tool_log().parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(
            "Prepared workspace {} with {} setup files",
            workspace.path.display(),
            setup.len()
        );
        Ok(workspace)
    }

    pub fn tool_log(&self) -> PathBuf {
        tool_log_path(&self.path)
    }
}
