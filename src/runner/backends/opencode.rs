//! Opencode backend.

use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};
use tracing::debug;

use super::{
    resolve_servers, server_env, write_config_file, CommandLine, Projection, ProjectionContext,
    ProjectionError, ResolvedServer, RunnerBackend,
};
use crate::config::{ModelSpec, OpencodeSettings, RunnerKind, RunnerSpec};

const CONFIG_SCHEMA: &str = "https://opencode.ai/config.json";

/// Message passed alongside the attached prompt file.
const RUN_MESSAGE: &str = "Follow the instructions in the attached file.";

/// Backend for the opencode CLI.
pub struct OpencodeBackend {
    binary: PathBuf,
    tools: Vec<String>,
    servers: Vec<ResolvedServer>,
}

impl OpencodeBackend {
    pub fn new(runner: &RunnerSpec, settings: &OpencodeSettings) -> Self {
        Self {
            binary: runner.binary_path(),
            tools: settings.tools.clone(),
            servers: resolve_servers(runner, &settings.stdio),
        }
    }

    /// Builds the `opencode.json` document.
    pub fn config_document(&self, model: &ModelSpec, tool_log: &Path) -> Value {
        let tools: Map<String, Value> = self
            .tools
            .iter()
            .map(|tool| (tool.clone(), Value::Bool(true)))
            .collect();

        let mut mcp = Map::new();
        for server in &self.servers {
            let mut command = vec![server.cmd.clone()];
            command.extend(server.args.iter().cloned());
            mcp.insert(
                server.name.clone(),
                json!({
                    "type": "local",
                    "command": command,
                    "enabled": true,
                    "environment": server_env(server, tool_log),
                }),
            );
        }

        json!({
            "$schema": CONFIG_SCHEMA,
            "model": model.qualified(),
            "tools": tools,
            "mcp": mcp,
        })
    }
}

impl RunnerBackend for OpencodeBackend {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Opencode
    }

    fn project(&self, ctx: &ProjectionContext<'_>) -> Result<Projection, ProjectionError> {
        let path = ctx.config_root.join("opencode").join("opencode.json");
        let document = self.config_document(ctx.model, ctx.tool_log);
        let contents =
            serde_json::to_string_pretty(&document).map_err(|e| ProjectionError::Encode {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let written = write_config_file(&path, &contents)?;
        debug!("Wrote opencode config to {}", written.display());

        Ok(Projection::default().with_file(written))
    }

    fn command(&self, model: &ModelSpec, prompt_file: &Path) -> CommandLine {
        CommandLine::new(&self.binary)
            .args(["run", "--model"])
            .arg(model.qualified())
            .arg("--file")
            .arg(prompt_file.to_string_lossy())
            .arg(RUN_MESSAGE)
    }
}
