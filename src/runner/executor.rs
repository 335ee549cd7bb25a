//! Pair executor: the attempt loop.

use std::fs;
use std::io::Write;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::backends::{create_backend, ProjectionContext, RunnerBackend};
use super::config::ExecutionConfig;
use super::config_root::ConfigRoot;
use super::process::{invoke, TransportError};
use super::result::{Attempt, AttemptStatus, RepresentativeResult, WorstAttempt};
use super::workspace::Workspace;
use crate::error::ArtifactError;
use crate::matrix::TestPair;
use crate::validation::{RuleEngine, TOOL_LOG_ENV};

/// Runs test pairs with worst-of-N retries.
///
/// Executors are used one pair at a time: every attempt takes the shared
/// config root, so `execute` needs `&mut self`.
pub struct Executor {
    config: ExecutionConfig,
    config_root: ConfigRoot,
    engine: RuleEngine,
}

impl Executor {
    pub fn new(config: ExecutionConfig) -> Self {
        let engine = RuleEngine::new().with_command_timeout(config.command_timeout);
        Self {
            config_root: ConfigRoot::new(&config.config_root),
            config,
            engine,
        }
    }

    /// Executes a pair and returns its worst attempt.
    ///
    /// Only a failure to write an attempt log is an error; everything that
    /// goes wrong inside an attempt is recorded on the attempt itself.
    pub async fn execute(&mut self, pair: &TestPair) -> Result<RepresentativeResult, ArtifactError> {
        let key = pair.key();
        let slug = key.slug();
        let budget = self.config.attempt_budget.max(1);
        let backend = create_backend(&pair.runner);

        info!(pair = %key, "Executing with {} backend, up to {} attempts", backend.kind(), budget);

        let mut index = 1;
        let first = self.run_logged(pair, backend.as_ref(), &slug, index).await?;
        let mut stop = first.status == AttemptStatus::Failed;
        let mut worst = WorstAttempt::new(first);

        while !stop && index < budget {
            index += 1;
            let attempt = self.run_logged(pair, backend.as_ref(), &slug, index).await?;
            stop = attempt.status == AttemptStatus::Failed;
            worst.offer(attempt);
        }

        let attempt = worst.into_inner();
        info!(
            pair = %key,
            "Representative attempt {} of {}: {} ({} rules passed)",
            attempt.attempt_index,
            index,
            attempt.status,
            attempt.rules_passed()
        );

        Ok(RepresentativeResult {
            key,
            attempt,
            attempts_run: index,
        })
    }

    async fn run_logged(
        &mut self,
        pair: &TestPair,
        backend: &dyn RunnerBackend,
        slug: &str,
        index: u32,
    ) -> Result<Attempt, ArtifactError> {
        let attempt = self.run_attempt(pair, backend, slug, index).await;
        write_attempt_log(&attempt)?;

        match &attempt.transport_error {
            Some(error) => warn!(
                pair = %pair.key(),
                "Attempt {} transport error: {}",
                index,
                error
            ),
            None => info!(
                pair = %pair.key(),
                "Attempt {} {} in {:.1}s ({}/{} rules)",
                index,
                attempt.status,
                attempt.duration.as_secs_f64(),
                attempt.rules_passed(),
                attempt.validations.len()
            ),
        }
        Ok(attempt)
    }

    async fn run_attempt(
        &mut self,
        pair: &TestPair,
        backend: &dyn RunnerBackend,
        slug: &str,
        index: u32,
    ) -> Attempt {
        let attempt = Attempt::start(index, self.config.attempt_log(slug, index));

        let workspace =
            match Workspace::recreate(&self.config.workspace_root, slug, &pair.scenario.setup) {
                Ok(workspace) => workspace,
                Err(e) => {
                    return attempt.fail_transport(TransportError::Workspace(e.to_string()).to_string(), "")
                }
            };
        let tool_log = workspace.tool_log();

        let prompt_file = match write_prompt(&pair.scenario.prompt) {
            Ok(file) => file,
            Err(e) => {
                let error = TransportError::Workspace(format!("Failed to write prompt file: {}", e));
                return attempt.fail_transport(error.to_string(), "");
            }
        };

        let lease = match self.config_root.acquire() {
            Ok(lease) => lease,
            Err(e) => {
                let error = TransportError::Projection(format!(
                    "Failed to prepare config root {}: {}",
                    self.config.config_root.display(),
                    e
                ));
                return attempt.fail_transport(error.to_string(), "");
            }
        };

        let ctx = ProjectionContext {
            model: &pair.model,
            config_root: lease.path(),
            tool_log: &tool_log,
        };
        let projection = match backend.project(&ctx) {
            Ok(projection) => projection,
            Err(e) => {
                return attempt.fail_transport(TransportError::Projection(e.to_string()).to_string(), "")
            }
        };

        for file in &projection.files {
            debug!(pair = %pair.key(), "Projected {}", file.display());
        }

        let mut env = vec![
            (
                "XDG_CONFIG_HOME".to_string(),
                lease.path().to_string_lossy().to_string(),
            ),
            (TOOL_LOG_ENV.to_string(), tool_log.to_string_lossy().to_string()),
        ];
        env.extend(projection.env);

        let command = backend.command(&pair.model, prompt_file.path());
        let result = invoke(&command, &workspace.path, &env, self.config.timeout).await;
        drop(lease);
        drop(prompt_file);

        match result {
            Err(e) => attempt.fail_transport(e.to_string(), ""),
            Ok(output) if !output.success() => {
                let error = TransportError::Exit {
                    program: command.program.display().to_string(),
                    code: output.exit_code,
                };
                attempt.fail_transport(error.to_string(), output.combined)
            }
            Ok(output) => {
                let validations = self
                    .engine
                    .evaluate_all(&pair.scenario.validate, &workspace.path)
                    .await;
                attempt.complete(output.combined, validations)
            }
        }
    }
}

/// Writes the prompt to a temp file outside the workspace.
fn write_prompt(prompt: &str) -> std::io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("agent-matrix-prompt-")
        .suffix(".md")
        .tempfile()?;
    file.write_all(prompt.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn write_attempt_log(attempt: &Attempt) -> Result<(), ArtifactError> {
    if let Some(parent) = attempt.log_path.parent() {
        fs::create_dir_all(parent).map_err(|source| ArtifactError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&attempt.log_path, attempt.log_text()).map_err(|source| ArtifactError::Write {
        path: attempt.log_path.clone(),
        source,
    })
}
