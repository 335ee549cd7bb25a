//! Configuration for pair execution.

use std::path::PathBuf;
use std::time::Duration;

use crate::validation::DEFAULT_COMMAND_TIMEOUT;

/// Default number of attempts per pair.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default wall-clock limit for one backend invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Directory name of the shared backend config root inside the workdir.
pub const CONFIG_ROOT_DIR: &str = ".config";

/// Configuration for executing test pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Maximum attempts per pair; early stop may run fewer.
    pub attempt_budget: u32,
    /// Maximum execution time of one backend invocation.
    pub timeout: Duration,
    /// Timeout for `command-succeeds` rules.
    pub command_timeout: Duration,
    /// Parent of all per-pair workspaces.
    pub workspace_root: PathBuf,
    /// Parent of per-pair log directories.
    pub log_root: PathBuf,
    /// Directory exported to backends as `XDG_CONFIG_HOME`.
    pub config_root: PathBuf,
}

impl ExecutionConfig {
    /// Creates a configuration rooted at `workdir`, logging under `log_root`.
    pub fn new(workdir: impl Into<PathBuf>, log_root: impl Into<PathBuf>) -> Self {
        let workdir = workdir.into();
        Self {
            attempt_budget: DEFAULT_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            config_root: workdir.join(CONFIG_ROOT_DIR),
            workspace_root: workdir,
            log_root: log_root.into(),
        }
    }

    /// Sets the attempt budget (at least one).
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempt_budget = attempts.max(1);
        self
    }

    /// Sets the backend timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Log file for one attempt of a pair.
    pub fn attempt_log(&self, slug: &str, attempt: u32) -> PathBuf {
        self.log_root.join(slug).join(format!("attempt-{}.log", attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutionConfig::new("/work", "/results/logs");
        assert_eq!(config.attempt_budget, 3);
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.config_root, PathBuf::from("/work/.config"));
        assert_eq!(config.workspace_root, PathBuf::from("/work"));
    }

    #[test]
    fn test_attempt_budget_at_least_one() {
        let config = ExecutionConfig::new("/w", "/l").with_attempts(0);
        assert_eq!(config.attempt_budget, 1);
    }

    #[test]
    fn test_attempt_log_path() {
        let config = ExecutionConfig::new("/w", "/results/logs");
        assert_eq!(
            config.attempt_log("create-file_opus_goose", 2),
            PathBuf::from("/results/logs/create-file_opus_goose/attempt-2.log")
        );
    }
}
