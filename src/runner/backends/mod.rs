//! Runner backends.
//!
//! Each backend knows how to:
//! 1. Project a model and its runner settings into the configuration files
//!    the agent binary reads from the config root
//! 2. Build the command line that runs one prompt
//!
//! The executor owns process spawning and timeouts, so backends stay
//! synchronous and side-effect free apart from writing their config files.

pub mod generic;
pub mod goose;
pub mod opencode;

use std::path::{Path, PathBuf};

use crate::config::{ModelSpec, RunnerKind, RunnerSettings, RunnerSpec, StdioServer};
use crate::validation::TOOL_LOG_ENV;

pub use generic::GenericBackend;
pub use goose::GooseBackend;
pub use opencode::OpencodeBackend;

/// Everything a backend needs to write its runtime configuration.
#[derive(Debug, Clone)]
pub struct ProjectionContext<'a> {
    pub model: &'a ModelSpec,
    /// Directory exported to the child as `XDG_CONFIG_HOME`.
    pub config_root: &'a Path,
    /// Where tool servers should append tool calls.
    pub tool_log: &'a Path,
}

/// Files written by a projection plus extra environment for the child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub files: Vec<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Projection {
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.files.push(path);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Error writing a backend's runtime configuration.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },
}

/// Trait for runner backends.
pub trait RunnerBackend: Send + Sync {
    /// Returns the runner kind.
    fn kind(&self) -> RunnerKind;

    /// Writes the runtime configuration under the config root.
    fn project(&self, ctx: &ProjectionContext<'_>) -> Result<Projection, ProjectionError>;

    /// Builds the command that runs the prompt stored at `prompt_file`.
    fn command(&self, model: &ModelSpec, prompt_file: &Path) -> CommandLine;
}

/// Creates the backend for a runner.
pub fn create_backend(runner: &RunnerSpec) -> Box<dyn RunnerBackend> {
    match &runner.settings {
        RunnerSettings::Goose(settings) => Box::new(GooseBackend::new(runner, settings)),
        RunnerSettings::Opencode(settings) => Box::new(OpencodeBackend::new(runner, settings)),
        RunnerSettings::Generic(settings) => Box::new(GenericBackend::new(runner, settings)),
    }
}

/// A stdio tool server with paths resolved against the runner's origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedServer {
    pub name: String,
    pub cmd: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

pub(crate) fn resolve_servers(runner: &RunnerSpec, servers: &[StdioServer]) -> Vec<ResolvedServer> {
    servers
        .iter()
        .map(|server| ResolvedServer {
            name: server.name.clone(),
            cmd: runner.resolve_command(&server.cmd),
            args: server.args.iter().map(|a| runner.resolve_arg(a)).collect(),
            env: server
                .env
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        })
        .collect()
}

/// Server environment with the tool log path added.
pub(crate) fn server_env(server: &ResolvedServer, tool_log: &Path) -> serde_json::Map<String, serde_json::Value> {
    let mut env: serde_json::Map<String, serde_json::Value> = server
        .env
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    env.insert(
        TOOL_LOG_ENV.to_string(),
        serde_json::Value::String(tool_log.to_string_lossy().to_string()),
    );
    env
}

/// Writes a config file, creating parent directories.
pub(crate) fn write_config_file(path: &Path, contents: &str) -> Result<PathBuf, ProjectionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ProjectionError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, contents).map_err(|source| ProjectionError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(path.to_path_buf())
}
