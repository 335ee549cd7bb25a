//! Generic backend.
//!
//! Runs any command-line agent that takes the prompt file as its last
//! argument. Model selection is passed through the environment and a small
//! runtime file so wrapper scripts can pick whichever they prefer.

use std::path::{Path, PathBuf};

use serde_json::json;

use super::{
    write_config_file, CommandLine, Projection, ProjectionContext, ProjectionError, RunnerBackend,
};
use crate::config::{GenericSettings, ModelSpec, RunnerKind, RunnerSpec};

pub const PROVIDER_ENV: &str = "AGENT_MATRIX_PROVIDER";
pub const MODEL_ENV: &str = "AGENT_MATRIX_MODEL";

/// Backend for arbitrary agent commands.
pub struct GenericBackend {
    binary: PathBuf,
    args: Vec<String>,
}

impl GenericBackend {
    pub fn new(runner: &RunnerSpec, settings: &GenericSettings) -> Self {
        Self {
            binary: runner.binary_path(),
            args: settings.args.iter().map(|a| runner.resolve_arg(a)).collect(),
        }
    }
}

impl RunnerBackend for GenericBackend {
    fn kind(&self) -> RunnerKind {
        RunnerKind::Generic
    }

    fn project(&self, ctx: &ProjectionContext<'_>) -> Result<Projection, ProjectionError> {
        let path = ctx.config_root.join("agent-matrix").join("runtime.json");
        let document = json!({
            "provider": ctx.model.provider,
            "model": ctx.model.model,
        });
        let written = write_config_file(&path, &document.to_string())?;

        Ok(Projection::default()
            .with_file(written)
            .with_env(PROVIDER_ENV, &ctx.model.provider)
            .with_env(MODEL_ENV, &ctx.model.model))
    }

    fn command(&self, _model: &ModelSpec, prompt_file: &Path) -> CommandLine {
        CommandLine::new(&self.binary)
            .args(self.args.iter().cloned())
            .arg(prompt_file.to_string_lossy())
    }
}
