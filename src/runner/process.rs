//! Backend process invocation.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::backends::CommandLine;

/// Failure to run the backend at all, as opposed to a failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with {}", exit_label(.code))]
    Exit { program: String, code: Option<i32> },

    #[error("Timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("Workspace setup failed: {0}")]
    Workspace(String),

    #[error("Config projection failed: {0}")]
    Projection(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Stdout followed by stderr.
    pub combined: String,
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Puts the child in a process group of its own.
///
/// A terminal Ctrl-C then reaches only the harness, which stops the child
/// through `kill_on_drop` instead of recording its interrupted exit.
pub(crate) fn isolate_process_group(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Runs `command` in `cwd` with extra environment, bounded by `timeout`.
///
/// The child is killed if the timeout fires or the returned future is
/// dropped.
pub async fn invoke(
    command: &CommandLine,
    cwd: &Path,
    env: &[(String, String)],
    timeout: Duration,
) -> Result<ProcessOutput, TransportError> {
    let program = command.program.display().to_string();

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate_process_group(&mut cmd);
    for (key, value) in env {
        cmd.env(key, value);
    }

    debug!("Spawning {} in {}", command, cwd.display());
    let child = cmd.spawn().map_err(|e| TransportError::Spawn {
        program: program.clone(),
        message: e.to_string(),
    })?;

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            let exit_code = output.status.code();
            debug!("{} finished with {}", program, exit_label(&exit_code));
            Ok(ProcessOutput {
                combined,
                exit_code,
            })
        }
        Ok(Err(e)) => Err(TransportError::Spawn {
            program,
            message: e.to_string(),
        }),
        Err(_) => {
            warn!("{} timed out after {}s; killed", program, timeout.as_secs());
            Err(TransportError::Timeout(timeout))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_combined_output_and_env() {
        let temp = TempDir::new().unwrap();
        let env = vec![("GREETING".to_string(), "hi".to_string())];
        let output = invoke(
            &sh("echo $GREETING; pwd; echo oops >&2"),
            temp.path(),
            &env,
            Duration::from_secs(10),
        )
        .await
        .unwrap();

        assert!(output.success());
        assert!(output.combined.starts_with("hi\n"));
        assert!(output.combined.ends_with("oops\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_reported() {
        let temp = TempDir::new().unwrap();
        let output = invoke(&sh("echo partial; exit 3"), temp.path(), &[], Duration::from_secs(10))
            .await
            .unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.combined, "partial\n");
    }

    #[tokio::test]
    async fn test_timeout() {
        let temp = TempDir::new().unwrap();
        let err = invoke(&sh("sleep 5"), temp.path(), &[], Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Timeout(Duration::from_millis(200)));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_child_leads_its_own_process_group() {
        let temp = TempDir::new().unwrap();
        let output = invoke(
            &sh("test \"$(cut -d' ' -f5 /proc/$$/stat)\" = \"$$\""),
            temp.path(),
            &[],
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert!(output.success(), "{}", output.combined);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let temp = TempDir::new().unwrap();
        let err = invoke(
            &CommandLine::new("/nonexistent/agent-binary"),
            temp.path(),
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }

    #[test]
    fn test_error_messages() {
        let err = TransportError::Exit {
            program: "goose".to_string(),
            code: Some(2),
        };
        assert_eq!(err.to_string(), "goose exited with exit code 2");
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(300)).to_string(),
            "Timed out after 300s"
        );
    }
}
