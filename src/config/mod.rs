//! Runner config registry.
//!
//! Loads the config document that names the models and runners a suite is
//! evaluated against, plus the optional matrix selecting which combinations
//! to run. Two document shapes are accepted and normalized here so nothing
//! downstream branches on the schema:
//!
//! ```yaml
//! models:
//!   - name: opus
//!     provider: anthropic
//!     model: claude-opus-4-5
//! runners:
//!   - name: goose
//!     type: goose
//!     extensions: [developer]
//!     stdio:
//!       - name: mock-github
//!         cmd: ./mocks/github.py
//! matrix:
//!   - scenario: edit-existing-file
//!     models: [opus]
//! ```
//!
//! The legacy single-backend shape (`agent-config:`) is described in
//! [`legacy`].

pub mod legacy;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
pub use legacy::LegacyAgentConfig;

/// A named (provider, model) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Identity used by matrix entries and filters.
    pub name: String,
    /// Provider backends route calls to (e.g. `anthropic`, `ollama`).
    pub provider: String,
    /// Provider-specific model identifier.
    pub model: String,
}

impl ModelSpec {
    /// Creates a new model spec.
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Returns the `provider/model` form some backends expect.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.provider, self.model)
    }
}

/// Supported runner backend kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    /// Goose CLI, configured through `goose/config.yaml`.
    Goose,
    /// opencode CLI, configured through `opencode/opencode.json`.
    Opencode,
    /// Any executable taking the prompt file path as its last argument.
    Generic,
}

impl RunnerKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            RunnerKind::Goose => "goose",
            RunnerKind::Opencode => "opencode",
            RunnerKind::Generic => "generic",
        }
    }

    /// Returns the binary used when a runner does not name one.
    pub fn default_binary(&self) -> Option<&'static str> {
        match self {
            RunnerKind::Goose => Some("goose"),
            RunnerKind::Opencode => Some("opencode"),
            RunnerKind::Generic => None,
        }
    }
}

impl std::fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// An auxiliary tool server a backend launches over stdio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdioServer {
    pub name: String,
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GooseSettings {
    /// Builtin extensions to enable (e.g. `developer`).
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub stdio: Vec<StdioServer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpencodeSettings {
    /// Tools to enable; empty leaves opencode's defaults in place.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub stdio: Vec<StdioServer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericSettings {
    /// Arguments placed before the prompt file path.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Kind-specific runner settings, tagged by `type` in the config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunnerSettings {
    Goose(GooseSettings),
    Opencode(OpencodeSettings),
    Generic(GenericSettings),
}

impl RunnerSettings {
    pub fn kind(&self) -> RunnerKind {
        match self {
            RunnerSettings::Goose(_) => RunnerKind::Goose,
            RunnerSettings::Opencode(_) => RunnerKind::Opencode,
            RunnerSettings::Generic(_) => RunnerKind::Generic,
        }
    }
}

/// A named runner backend definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSpec {
    pub name: String,
    /// Binary to invoke; defaults per kind.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    #[serde(flatten)]
    pub settings: RunnerSettings,
    /// Directory of the config document this runner came from.
    #[serde(skip)]
    pub origin_dir: PathBuf,
}

impl RunnerSpec {
    /// Creates a runner spec rooted at `origin_dir`.
    pub fn new(
        name: impl Into<String>,
        settings: RunnerSettings,
        origin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            binary: None,
            settings,
            origin_dir: origin_dir.into(),
        }
    }

    /// Sets the binary path.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn kind(&self) -> RunnerKind {
        self.settings.kind()
    }

    /// Returns the binary to invoke, resolved against the origin directory
    /// when it is a relative path rather than a bare command name.
    pub fn binary_path(&self) -> PathBuf {
        match &self.binary {
            Some(binary) => PathBuf::from(self.resolve_command(&binary.to_string_lossy())),
            None => PathBuf::from(self.kind().default_binary().unwrap_or_default()),
        }
    }

    /// Resolves a command: relative paths containing a separator are joined
    /// onto the origin directory, bare names are left for `PATH` lookup.
    pub fn resolve_command(&self, cmd: &str) -> String {
        let path = Path::new(cmd);
        if path.is_relative() && cmd.contains(std::path::MAIN_SEPARATOR) {
            self.origin_dir.join(path).to_string_lossy().to_string()
        } else {
            cmd.to_string()
        }
    }

    /// Resolves an argument: only explicit `./` or `../` paths are rewritten.
    pub fn resolve_arg(&self, arg: &str) -> String {
        if arg.starts_with("./") || arg.starts_with("../") {
            self.origin_dir.join(arg).to_string_lossy().to_string()
        } else {
            arg.to_string()
        }
    }
}

/// One matrix selection rule. Absent lists mean "all configured".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixEntry {
    /// Scenario name; absent selects every scenario.
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<String>>,
    #[serde(default)]
    pub runners: Option<Vec<String>>,
}

impl MatrixEntry {
    pub fn with_models(mut self, models: &[&str]) -> Self {
        self.models = Some(models.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn with_runners(mut self, runners: &[&str]) -> Self {
        self.runners = Some(runners.iter().map(|r| r.to_string()).collect());
        self
    }
}

/// Named models and runners, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    pub models: Vec<ModelSpec>,
    pub runners: Vec<RunnerSpec>,
}

impl Registry {
    pub fn new(models: Vec<ModelSpec>, runners: Vec<RunnerSpec>) -> Self {
        Self { models, runners }
    }

    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.name == name)
    }

    pub fn runner(&self, name: &str) -> Option<&RunnerSpec> {
        self.runners.iter().find(|r| r.name == name)
    }
}

/// A fully loaded and normalized config document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteConfig {
    pub registry: Registry,
    /// `None` means the full cross product.
    pub matrix: Option<Vec<MatrixEntry>>,
    pub origin_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    models: Vec<ModelSpec>,
    #[serde(default)]
    runners: Vec<RunnerSpec>,
    #[serde(default)]
    matrix: Option<Vec<MatrixEntry>>,
    #[serde(default, rename = "agent-config", alias = "agent_config")]
    agent_config: Option<Vec<LegacyAgentConfig>>,
}

impl SuiteConfig {
    /// Loads the config document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let origin_dir = fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());

        let config = Self::from_yaml_str(&content, path, &origin_dir)?;
        info!(
            "Loaded config {} ({} models, {} runners, matrix: {})",
            path.display(),
            config.registry.models.len(),
            config.registry.runners.len(),
            config
                .matrix
                .as_ref()
                .map(|m| format!("{} entries", m.len()))
                .unwrap_or_else(|| "full cross product".to_string())
        );
        Ok(config)
    }

    /// Parses a config document. `source` is only used in error messages.
    pub fn from_yaml_str(
        content: &str,
        source: &Path,
        origin_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let doc: ConfigDocument =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: source.to_path_buf(),
                source: e,
            })?;

        let (models, mut runners, matrix) = match doc.agent_config {
            Some(entries) => {
                if !doc.models.is_empty() || !doc.runners.is_empty() {
                    return Err(ConfigError::MixedShapes);
                }
                debug!("Normalizing legacy agent-config with {} entries", entries.len());
                let normalized = legacy::normalize(entries, origin_dir);
                (normalized.models, normalized.runners, normalized.matrix)
            }
            None => (doc.models, doc.runners, doc.matrix),
        };

        for runner in &mut runners {
            runner.origin_dir = origin_dir.to_path_buf();
        }

        let config = Self {
            registry: Registry::new(models, runners),
            matrix: matrix.filter(|entries| !entries.is_empty()),
            origin_dir: origin_dir.to_path_buf(),
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.registry.models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        if self.registry.runners.is_empty() {
            return Err(ConfigError::NoRunners);
        }

        let mut seen = HashSet::new();
        for model in &self.registry.models {
            if !seen.insert(model.name.as_str()) {
                return Err(ConfigError::DuplicateModel(model.name.clone()));
            }
        }

        let mut seen = HashSet::new();
        for runner in &self.registry.runners {
            if !seen.insert(runner.name.as_str()) {
                return Err(ConfigError::DuplicateRunner(runner.name.clone()));
            }
            if runner.kind() == RunnerKind::Generic && runner.binary.is_none() {
                return Err(ConfigError::MissingBinary(runner.name.clone()));
            }
        }

        Ok(())
    }

    /// Logs and returns matrix references that resolve to nothing.
    ///
    /// Unknown names are dropped by the builder; this is where the gap becomes
    /// visible. Call it with the full, unfiltered scenario set.
    pub fn unresolved_references(&self, scenario_names: &[&str]) -> Vec<String> {
        let mut gaps = Vec::new();
        let Some(matrix) = &self.matrix else {
            return gaps;
        };

        for (idx, entry) in matrix.iter().enumerate() {
            if let Some(scenario) = &entry.scenario {
                if !scenario_names.contains(&scenario.as_str()) {
                    gaps.push(format!("matrix[{}]: unknown scenario '{}'", idx, scenario));
                }
            }
            for model in entry.models.iter().flatten() {
                if self.registry.model(model).is_none() {
                    gaps.push(format!("matrix[{}]: unknown model '{}'", idx, model));
                }
            }
            for runner in entry.runners.iter().flatten() {
                if self.registry.runner(runner).is_none() {
                    gaps.push(format!("matrix[{}]: unknown runner '{}'", idx, runner));
                }
            }
        }

        for gap in &gaps {
            warn!("Dropping unresolved reference: {}", gap);
        }
        gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
models:
  - name: opus
    provider: anthropic
    model: claude-opus-4-5
  - name: qwen
    provider: ollama
    model: "qwen3-coder:64k"
runners:
  - name: goose
    type: goose
    extensions: [developer]
    stdio:
      - name: mock-github
        cmd: ./mocks/github.py
        args: ["--fixtures", "./fixtures"]
  - name: opencode
    type: opencode
    binary: /opt/opencode/bin/opencode
  - name: local
    type: generic
    binary: scripts/agent.sh
    args: ["--quiet"]
matrix:
  - scenario: edit-existing-file
    models: [opus]
  - scenario: create-file
"#;

    fn parse(content: &str) -> Result<SuiteConfig, ConfigError> {
        SuiteConfig::from_yaml_str(content, Path::new("config.yaml"), Path::new("/suite"))
    }

    #[test]
    fn test_parse_multi_backend_config() {
        let config = parse(CONFIG).unwrap();

        assert_eq!(config.registry.models.len(), 2);
        assert_eq!(config.registry.models[1].qualified(), "ollama/qwen3-coder:64k");

        let kinds: Vec<RunnerKind> = config.registry.runners.iter().map(|r| r.kind()).collect();
        assert_eq!(
            kinds,
            vec![RunnerKind::Goose, RunnerKind::Opencode, RunnerKind::Generic]
        );

        let goose = config.registry.runner("goose").unwrap();
        match &goose.settings {
            RunnerSettings::Goose(settings) => {
                assert_eq!(settings.extensions, vec!["developer".to_string()]);
                assert_eq!(settings.stdio[0].cmd, "./mocks/github.py");
            }
            other => panic!("expected goose settings, got {:?}", other),
        }
        assert_eq!(goose.origin_dir, PathBuf::from("/suite"));

        let matrix = config.matrix.unwrap();
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[0].models, Some(vec!["opus".to_string()]));
        assert!(matrix[1].runners.is_none());
    }

    #[test]
    fn test_binary_path_resolution() {
        let config = parse(CONFIG).unwrap();

        let goose = config.registry.runner("goose").unwrap();
        assert_eq!(goose.binary_path(), PathBuf::from("goose"));

        let opencode = config.registry.runner("opencode").unwrap();
        assert_eq!(opencode.binary_path(), PathBuf::from("/opt/opencode/bin/opencode"));

        let local = config.registry.runner("local").unwrap();
        assert_eq!(local.binary_path(), PathBuf::from("/suite/scripts/agent.sh"));
    }

    #[test]
    fn test_resolve_arg_only_rewrites_explicit_relative_paths() {
        let runner = RunnerSpec::new(
            "goose",
            RunnerSettings::Goose(GooseSettings::default()),
            "/suite",
        );
        assert_eq!(runner.resolve_arg("./fixtures"), "/suite/./fixtures");
        assert_eq!(runner.resolve_arg("--verbose"), "--verbose");
        assert_eq!(runner.resolve_command("python3"), "python3");
    }

    #[test]
    fn test_empty_matrix_means_cross_product() {
        let config = parse(
            "models: [{name: m, provider: p, model: x}]\nrunners: [{name: g, type: goose}]\nmatrix: []\n",
        )
        .unwrap();
        assert!(config.matrix.is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = parse(
            "models: [{name: m, provider: p, model: x}, {name: m, provider: q, model: y}]\nrunners: [{name: g, type: goose}]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateModel(name) if name == "m"));

        let err = parse(
            "models: [{name: m, provider: p, model: x}]\nrunners: [{name: g, type: goose}, {name: g, type: opencode}]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRunner(name) if name == "g"));
    }

    #[test]
    fn test_generic_runner_requires_binary() {
        let err = parse("models: [{name: m, provider: p, model: x}]\nrunners: [{name: g, type: generic}]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingBinary(_)));
    }

    #[test]
    fn test_mixed_shapes_rejected() {
        let err = parse(
            "models: [{name: m, provider: p, model: x}]\nagent-config: [{name: a, provider: p, model: x}]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MixedShapes));
    }

    #[test]
    fn test_unknown_runner_type_is_parse_error() {
        let err = parse("models: [{name: m, provider: p, model: x}]\nrunners: [{name: g, type: cursor}]\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unresolved_references() {
        let config = parse(
            r#"
models: [{name: opus, provider: anthropic, model: x}]
runners: [{name: goose, type: goose}]
matrix:
  - scenario: missing-scenario
  - scenario: create-file
    models: [opus, gpt]
    runners: [goose, aider]
"#,
        )
        .unwrap();

        let gaps = config.unresolved_references(&["create-file"]);
        assert_eq!(gaps.len(), 3);
        assert!(gaps[0].contains("unknown scenario 'missing-scenario'"));
        assert!(gaps[1].contains("unknown model 'gpt'"));
        assert!(gaps[2].contains("unknown runner 'aider'"));
    }

    #[test]
    fn test_load_sets_origin_dir_from_config_location() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, CONFIG).unwrap();

        let config = SuiteConfig::load(&path).unwrap();
        let expected = fs::canonicalize(temp.path()).unwrap();
        assert_eq!(config.origin_dir, expected);
        assert!(config.registry.runners.iter().all(|r| r.origin_dir == expected));
    }

    #[test]
    fn test_load_missing_file() {
        let err = SuiteConfig::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_unknown_runner_type_rejected() {
        let doc = "models: [{name: m, provider: p, model: x}]\nrunners: [{name: r, type: open-code}]\n";
        let err = SuiteConfig::from_yaml_str(doc, Path::new("agents.yaml"), Path::new("/s")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
