//! Scenario store.
//!
//! A scenario is one YAML document describing a task given to an agent:
//!
//! ```yaml
//! name: edit-existing-file
//! description: Add a debug helper to an existing program
//! prompt: |
//!   Add a function `debug_args` to hello.rs that prints every argument,
//!   and call it from main.
//! setup:
//!   hello.rs: |
//!     fn main() {
//!         println!("Hello, world!");
//!     }
//! validate:
//!   - type: file-contains
//!     path: hello.rs
//!     pattern: debug_args
//! tags: [rust, edit]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::ScenarioError;
use crate::validation::ValidationRule;

/// A named task specification: prompt, initial files and postconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    /// Relative path → file content, written before every attempt.
    #[serde(default)]
    pub setup: BTreeMap<String, String>,
    #[serde(default)]
    pub validate: Vec<ValidationRule>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Scenario {
    /// Creates a scenario with a prompt and nothing else.
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            prompt: prompt.into(),
            setup: BTreeMap::new(),
            validate: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Adds a setup file.
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.setup.insert(path.into(), content.into());
        self
    }

    /// Adds a validation rule.
    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validate.push(rule);
        self
    }

    /// Parses a scenario document.
    pub fn from_yaml_str(content: &str, path: &Path) -> Result<Self, ScenarioError> {
        let scenario: Scenario =
            serde_yaml::from_str(content).map_err(|source| ScenarioError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        for setup_path in scenario.setup.keys() {
            if !is_safe_relative(setup_path) {
                return Err(ScenarioError::InvalidSetupPath {
                    name: scenario.name.clone(),
                    path: setup_path.clone(),
                });
            }
        }
        Ok(scenario)
    }
}

/// True for non-empty relative paths that stay below their root.
pub fn is_safe_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn is_scenario_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Loads every scenario document under `dir`, sorted by path.
pub fn load_scenarios(dir: &Path) -> Result<Vec<Scenario>, ScenarioError> {
    if !dir.is_dir() {
        return Err(ScenarioError::MissingDirectory(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && is_scenario_file(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let mut scenarios = Vec::with_capacity(paths.len());
    let mut names = HashSet::new();
    for path in paths {
        let content = fs::read_to_string(&path).map_err(|source| ScenarioError::Read {
            path: path.clone(),
            source,
        })?;
        let scenario = Scenario::from_yaml_str(&content, &path)?;
        if !names.insert(scenario.name.clone()) {
            return Err(ScenarioError::DuplicateName {
                name: scenario.name,
                path,
            });
        }
        debug!(
            "Loaded scenario {} ({} setup files, {} rules)",
            scenario.name,
            scenario.setup.len(),
            scenario.validate.len()
        );
        scenarios.push(scenario);
    }

    info!("Loaded {} scenarios from {}", scenarios.len(), dir.display());
    Ok(scenarios)
}
