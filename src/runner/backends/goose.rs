//! Goose backend.
//!
//! Goose reads `$XDG_CONFIG_HOME/goose/config.yaml`; provider and model are
//! also exported as environment variables since the CLI prefers them.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::debug;

use super::{
    resolve_servers, server_env, write_config_file, CommandLine, Projection, ProjectionContext,
    ProjectionError, ResolvedServer, RunnerBackend,
};
use crate::config::{GooseSettings, ModelSpec, RunnerKind, RunnerSpec};

/// Timeout goose applies to each extension call, in seconds.
const EXTENSION_TIMEOUT_SECS: u64 = 300;

/// Backend for the goose CLI.
pub struct GooseBackend {
    binary: PathBuf,
    extensions: Vec<String>,
    servers: Vec<ResolvedServer>,
}

impl GooseBackend {
    pub fn new(runner: &RunnerSpec, settings: &GooseSettings) -> Self {
        Self {
            binary: runner.binary_path(),
            extensions: settings.extensions.clone(),
            servers: resolve_servers(runner, &settings.stdio),
        }
    }

    /// Builds the `config.yaml` document.
    pub fn config_document(&self, model: &ModelSpec, tool_log: &Path) -> Value {
        let mut extensions = Map::new();
        for name in &self.extensions {
            extensions.insert(
                name.clone(),
                json!({
                    "bundled": true,
                    "enabled": true,
                    "name": name,
                    "timeout": EXTENSION_TIMEOUT_SECS,
                    "type": "builtin",
                }),
            );
        }
        for server in &self.servers {
            extensions.insert(
                server.name.clone(),
                json!({
                    "enabled": true,
                    "name": server.name,
                    "type": "stdio",
                    "cmd": server.cmd,
                    "args": server.args,
                    "envs": server_env(server, tool_log),
                    "timeout": EXTENSION_TIMEOUT_SECS,
                }),
            );
        }

        json!({
            "GOOSE_PROVIDER": model.provider,
            "GOOSE_MODEL": model.model,
            "extensions": extensions,
        })
    }
}

impl RunnerBackend for GooseBackend {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Goose
    }

    fn project(&self, ctx: &ProjectionContext<'_>) -> Result<Projection, ProjectionError> {
        let path = ctx.config_root.join("goose").join("config.yaml");
        let document = self.config_document(ctx.model, ctx.tool_log);
        let contents = serde_yaml::to_string(&document).map_err(|e| ProjectionError::Encode {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let written = write_config_file(&path, &contents)?;
        debug!(
            "Wrote goose config with {} extensions to {}",
            self.extensions.len() + self.servers.len(),
            written.display()
        );

        Ok(Projection::default()
            .with_file(written)
            .with_env("GOOSE_PROVIDER", &ctx.model.provider)
            .with_env("GOOSE_MODEL", &ctx.model.model))
    }

    fn command(&self, _model: &ModelSpec, prompt_file: &Path) -> CommandLine {
        CommandLine::new(&self.binary)
            .args(["run", "--no-session", "--instructions"])
            .arg(prompt_file.to_string_lossy())
    }
}
