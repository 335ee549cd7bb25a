//! Validation rule engine.
//!
//! Evaluates a scenario's postconditions against the workspace an agent left
//! behind. Evaluation never returns an error: filesystem failures, bad
//! regexes, unknown rule kinds and unimplemented rules all become failed
//! [`ValidationOutcome`]s carrying a message, so one broken rule cannot abort
//! the rest of the pass.

pub mod rules;
pub mod tool_log;

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::runner::process::isolate_process_group;
use crate::utils::tail;
pub use rules::ValidationRule;
pub use tool_log::{read_tool_calls, tool_log_path, ArgMatcher, ToolCall, TOOL_LOG_ENV};

/// Default bound on a `command-succeeds` rule.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Outcome of a single rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub rule: ValidationRule,
    pub passed: bool,
    pub message: Option<String>,
}

impl ValidationOutcome {
    pub fn pass(rule: &ValidationRule) -> Self {
        Self {
            rule: rule.clone(),
            passed: true,
            message: None,
        }
    }

    pub fn fail(rule: &ValidationRule, message: impl Into<String>) -> Self {
        Self {
            rule: rule.clone(),
            passed: false,
            message: Some(message.into()),
        }
    }
}

/// Overall pass: logical AND over all outcomes.
pub fn all_passed(outcomes: &[ValidationOutcome]) -> bool {
    outcomes.iter().all(|o| o.passed)
}

/// The rule interpreter.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    command_timeout: Duration,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets the timeout applied to `command-succeeds` rules.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Evaluates every rule in order.
    pub async fn evaluate_all(
        &self,
        rules: &[ValidationRule],
        workspace: &Path,
    ) -> Vec<ValidationOutcome> {
        let mut outcomes = Vec::with_capacity(rules.len());
        for rule in rules {
            let outcome = self.evaluate(rule, workspace).await;
            debug!(
                "Rule {}: {}",
                rule.describe(),
                if outcome.passed { "PASS" } else { "FAIL" }
            );
            outcomes.push(outcome);
        }

        info!(
            "Validation of {}: {}/{} rules passed",
            workspace.display(),
            outcomes.iter().filter(|o| o.passed).count(),
            outcomes.len()
        );
        outcomes
    }

    /// Evaluates a single rule against the workspace.
    pub async fn evaluate(&self, rule: &ValidationRule, workspace: &Path) -> ValidationOutcome {
        match rule {
            ValidationRule::FileExists { path } => check_file_exists(rule, path, workspace),
            ValidationRule::FileNotEmpty { path } => check_file_not_empty(rule, path, workspace),
            ValidationRule::FileContains { path, pattern } => {
                check_file_contains(rule, path, pattern, workspace)
            }
            ValidationRule::FileMatches { path, regex } => {
                check_file_matches(rule, path, regex, workspace)
            }
            ValidationRule::CommandSucceeds { command } => {
                self.check_command_succeeds(rule, command, workspace).await
            }
            ValidationRule::ToolCalled { tool, args } => {
                check_tool_called(rule, tool, args, workspace)
            }
            ValidationRule::Custom { reference } => ValidationOutcome::fail(
                rule,
                format!("Custom validation not implemented: {}", reference),
            ),
            ValidationRule::Unknown { kind } => {
                ValidationOutcome::fail(rule, format!("Unknown validation rule type: {}", kind))
            }
            ValidationRule::Malformed { kind, reason } => {
                ValidationOutcome::fail(rule, format!("Malformed {} rule: {}", kind, reason))
            }
        }
    }

    async fn check_command_succeeds(
        &self,
        rule: &ValidationRule,
        command: &str,
        workspace: &Path,
    ) -> ValidationOutcome {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = isolate_process_group(&mut cmd).spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return ValidationOutcome::fail(rule, format!("Command failed: {} ({})", command, e))
            }
        };

        match tokio::time::timeout(self.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) if output.status.success() => ValidationOutcome::pass(rule),
            Ok(Ok(output)) => {
                let code = output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                let stderr = String::from_utf8_lossy(&output.stderr);
                let detail = if stderr.trim().is_empty() {
                    String::from_utf8_lossy(&output.stdout).to_string()
                } else {
                    stderr.to_string()
                };
                let detail = tail(detail.trim(), 500);
                if detail.is_empty() {
                    ValidationOutcome::fail(
                        rule,
                        format!("Command failed: {} (exit {})", command, code),
                    )
                } else {
                    ValidationOutcome::fail(
                        rule,
                        format!("Command failed: {} (exit {}): {}", command, code, detail),
                    )
                }
            }
            Ok(Err(e)) => ValidationOutcome::fail(rule, format!("Command failed: {} ({})", command, e)),
            Err(_) => ValidationOutcome::fail(
                rule,
                format!(
                    "Command failed: {} (timed out after {}s)",
                    command,
                    self.command_timeout.as_secs()
                ),
            ),
        }
    }
}

/// Joins a rule path onto the workspace, refusing paths that leave it.
fn resolve_in_workspace(workspace: &Path, path: &str) -> Result<PathBuf, String> {
    let relative = Path::new(path);
    let escapes = relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(format!("Path escapes workspace: {}", path));
    }
    Ok(workspace.join(relative))
}

/// Reads a workspace file, mapping every failure to a rule message.
fn read_workspace_file(workspace: &Path, path: &str) -> Result<String, String> {
    let full = resolve_in_workspace(workspace, path)?;
    match fs::read_to_string(&full) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(format!("File not found: {}", path)),
        Err(e) => Err(format!("Failed to read {}: {}", path, e)),
    }
}

fn check_file_exists(rule: &ValidationRule, path: &str, workspace: &Path) -> ValidationOutcome {
    match resolve_in_workspace(workspace, path) {
        Ok(full) if full.exists() => ValidationOutcome::pass(rule),
        Ok(_) => ValidationOutcome::fail(rule, format!("File not found: {}", path)),
        Err(message) => ValidationOutcome::fail(rule, message),
    }
}

fn check_file_not_empty(rule: &ValidationRule, path: &str, workspace: &Path) -> ValidationOutcome {
    let full = match resolve_in_workspace(workspace, path) {
        Ok(full) => full,
        Err(message) => return ValidationOutcome::fail(rule, message),
    };
    match fs::metadata(&full) {
        Ok(meta) if meta.len() > 0 => ValidationOutcome::pass(rule),
        Ok(_) => ValidationOutcome::fail(rule, format!("File is empty: {}", path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            ValidationOutcome::fail(rule, format!("File not found: {}", path))
        }
        Err(e) => ValidationOutcome::fail(rule, format!("Failed to stat {}: {}", path, e)),
    }
}

fn check_file_contains(
    rule: &ValidationRule,
    path: &str,
    pattern: &str,
    workspace: &Path,
) -> ValidationOutcome {
    match read_workspace_file(workspace, path) {
        Ok(content) if content.contains(pattern) => ValidationOutcome::pass(rule),
        Ok(_) => ValidationOutcome::fail(rule, format!("{} does not contain: {}", path, pattern)),
        Err(message) => ValidationOutcome::fail(rule, message),
    }
}

fn check_file_matches(
    rule: &ValidationRule,
    path: &str,
    regex: &str,
    workspace: &Path,
) -> ValidationOutcome {
    let re = match Regex::new(regex) {
        Ok(re) => re,
        Err(e) => return ValidationOutcome::fail(rule, format!("Invalid regex {}: {}", regex, e)),
    };
    match read_workspace_file(workspace, path) {
        Ok(content) if re.is_match(&content) => ValidationOutcome::pass(rule),
        Ok(_) => ValidationOutcome::fail(rule, format!("{} does not match regex: {}", path, regex)),
        Err(message) => ValidationOutcome::fail(rule, message),
    }
}

fn check_tool_called(
    rule: &ValidationRule,
    tool: &str,
    args: &std::collections::BTreeMap<String, String>,
    workspace: &Path,
) -> ValidationOutcome {
    let mut matchers = Vec::with_capacity(args.len());
    for (name, pattern) in args {
        match ArgMatcher::compile(pattern) {
            Ok(matcher) => matchers.push((name.as_str(), matcher)),
            Err(e) => {
                return ValidationOutcome::fail(
                    rule,
                    format!("Invalid regex for argument {}: {}", name, e),
                )
            }
        }
    }

    let calls = match read_tool_calls(workspace) {
        Ok(Some(calls)) => calls,
        Ok(None) => {
            return ValidationOutcome::fail(
                rule,
                format!("Tool-call log not found: {}", tool_log::TOOL_LOG_RELATIVE_PATH),
            )
        }
        Err(e) => {
            return ValidationOutcome::fail(rule, format!("Failed to read tool-call log: {}", e))
        }
    };

    let candidates: Vec<&ToolCall> = calls.iter().filter(|c| c.tool == tool).collect();
    if candidates.is_empty() {
        return ValidationOutcome::fail(rule, format!("Tool not called: {}", tool));
    }

    let matched = candidates.iter().any(|call| {
        matchers.iter().all(|(name, matcher)| {
            call.argument_text(name)
                .map(|text| matcher.matches(&text))
                .unwrap_or(false)
        })
    });

    if matched {
        ValidationOutcome::pass(rule)
    } else {
        let names: Vec<&str> = matchers.iter().map(|(name, _)| *name).collect();
        ValidationOutcome::fail(
            rule,
            format!(
                "Tool {} called {} time(s) but no call matched arguments: {}",
                tool,
                candidates.len(),
                names.join(", ")
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn workspace_with(files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = temp.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, content).unwrap();
        }
        temp
    }

    fn file_exists(path: &str) -> ValidationRule {
        ValidationRule::FileExists { path: path.into() }
    }

    #[tokio::test]
    async fn test_file_exists() {
        let ws = workspace_with(&[("a.txt", "x")]);
        let engine = RuleEngine::new();

        let outcome = engine.evaluate(&file_exists("a.txt"), ws.path()).await;
        assert!(outcome.passed);
        assert_eq!(outcome.message, None);

        let outcome = engine.evaluate(&file_exists("b.txt"), ws.path()).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.message.as_deref(), Some("File not found: b.txt"));
    }

    #[tokio::test]
    async fn test_file_not_empty() {
        let ws = workspace_with(&[("full.txt", "data"), ("empty.txt", "")]);
        let engine = RuleEngine::new();

        let rule = ValidationRule::FileNotEmpty { path: "full.txt".into() };
        assert!(engine.evaluate(&rule, ws.path()).await.passed);

        let rule = ValidationRule::FileNotEmpty { path: "empty.txt".into() };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert_eq!(outcome.message.as_deref(), Some("File is empty: empty.txt"));

        let rule = ValidationRule::FileNotEmpty { path: "gone.txt".into() };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert_eq!(outcome.message.as_deref(), Some("File not found: gone.txt"));
    }

    #[tokio::test]
    async fn test_file_contains_is_literal() {
        let ws = workspace_with(&[("hello.rs", "fn debug_args() {}\nfn main() {}\n")]);
        let engine = RuleEngine::new();

        let rule = ValidationRule::FileContains {
            path: "hello.rs".into(),
            pattern: "debug_args".into(),
        };
        assert!(engine.evaluate(&rule, ws.path()).await.passed);

        let rule = ValidationRule::FileContains {
            path: "hello.rs".into(),
            pattern: "fn .*".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        assert!(outcome.message.unwrap().contains("does not contain: fn .*"));

        let rule = ValidationRule::FileContains {
            path: "missing.rs".into(),
            pattern: "debug_args".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.message.as_deref(), Some("File not found: missing.rs"));
    }

    #[tokio::test]
    async fn test_file_matches() {
        let ws = workspace_with(&[("hello.rs", "fn main() {\n    debug_args();\n}\n")]);
        let engine = RuleEngine::new();

        let rule = ValidationRule::FileMatches {
            path: "hello.rs".into(),
            regex: r"fn\s+main\(\)".into(),
        };
        assert!(engine.evaluate(&rule, ws.path()).await.passed);

        let rule = ValidationRule::FileMatches {
            path: "hello.rs".into(),
            regex: r"println!".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(outcome.message.unwrap().contains("does not match regex: println!"));

        let rule = ValidationRule::FileMatches {
            path: "hello.rs".into(),
            regex: "(unclosed".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        assert!(outcome.message.unwrap().starts_with("Invalid regex (unclosed"));

        let rule = ValidationRule::FileMatches {
            path: "missing.rs".into(),
            regex: r"fn\s+main".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        assert_eq!(outcome.message.as_deref(), Some("File not found: missing.rs"));
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let ws = workspace_with(&[]);
        let engine = RuleEngine::new();

        let outcome = engine.evaluate(&file_exists("../etc/passwd"), ws.path()).await;
        assert!(!outcome.passed);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Path escapes workspace: ../etc/passwd")
        );

        let outcome = engine.evaluate(&file_exists("/etc/passwd"), ws.path()).await;
        assert!(!outcome.passed);
    }

    #[tokio::test]
    async fn test_command_succeeds() {
        let ws = workspace_with(&[("marker", "")]);
        let engine = RuleEngine::new();

        let rule = ValidationRule::CommandSucceeds {
            command: "test -f marker".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(outcome.passed);
        assert_eq!(outcome.message, None);

        let rule = ValidationRule::CommandSucceeds {
            command: "echo boom >&2; exit 3".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        let message = outcome.message.unwrap();
        assert!(message.starts_with("Command failed: echo boom >&2; exit 3"));
        assert!(message.contains("exit 3"));
        assert!(message.ends_with("boom"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_command_runs_in_own_process_group() {
        let ws = workspace_with(&[]);
        let rule = ValidationRule::CommandSucceeds {
            command: "test \"$(cut -d' ' -f5 /proc/$$/stat)\" = \"$$\"".into(),
        };
        let outcome = RuleEngine::new().evaluate(&rule, ws.path()).await;
        assert!(outcome.passed, "{:?}", outcome.message);
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let ws = workspace_with(&[]);
        let engine = RuleEngine::new().with_command_timeout(Duration::from_millis(200));

        let rule = ValidationRule::CommandSucceeds {
            command: "sleep 5".into(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        assert!(outcome.message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_tool_called() {
        let ws = workspace_with(&[(
            tool_log::TOOL_LOG_RELATIVE_PATH,
            "{\"tool\":\"developer__shell\",\"arguments\":{\"command\":\"cargo run -- a b\"}}\n",
        )]);
        let engine = RuleEngine::new();

        let rule = ValidationRule::ToolCalled {
            tool: "developer__shell".into(),
            args: BTreeMap::new(),
        };
        assert!(engine.evaluate(&rule, ws.path()).await.passed);

        let rule = ValidationRule::ToolCalled {
            tool: "developer__shell".into(),
            args: BTreeMap::from([("command".to_string(), "/^cargo run/".to_string())]),
        };
        assert!(engine.evaluate(&rule, ws.path()).await.passed);

        let rule = ValidationRule::ToolCalled {
            tool: "developer__shell".into(),
            args: BTreeMap::from([("command".to_string(), "cargo test".to_string())]),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        assert!(outcome
            .message
            .unwrap()
            .contains("called 1 time(s) but no call matched arguments: command"));

        let rule = ValidationRule::ToolCalled {
            tool: "github__create_issue".into(),
            args: BTreeMap::new(),
        };
        let outcome = engine.evaluate(&rule, ws.path()).await;
        assert_eq!(
            outcome.message.as_deref(),
            Some("Tool not called: github__create_issue")
        );
    }

    #[tokio::test]
    async fn test_tool_called_without_log() {
        let ws = workspace_with(&[]);
        let rule = ValidationRule::ToolCalled {
            tool: "shell".into(),
            args: BTreeMap::new(),
        };
        let outcome = RuleEngine::new().evaluate(&rule, ws.path()).await;
        assert!(!outcome.passed);
        assert!(outcome.message.unwrap().starts_with("Tool-call log not found"));
    }

    #[tokio::test]
    async fn test_custom_and_unknown_fail_closed() {
        let ws = workspace_with(&[]);
        let engine = RuleEngine::new();

        let custom = ValidationRule::Custom {
            reference: "checks/lint.py".into(),
        };
        let outcome = engine.evaluate(&custom, ws.path()).await;
        assert!(!outcome.passed);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Custom validation not implemented: checks/lint.py")
        );

        let unknown = ValidationRule::Unknown {
            kind: "pixel-diff".into(),
        };
        let outcome = engine.evaluate(&unknown, ws.path()).await;
        assert!(!outcome.passed);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Unknown validation rule type: pixel-diff")
        );
    }

    #[tokio::test]
    async fn test_evaluate_all_preserves_order() {
        let ws = workspace_with(&[("a.txt", "x")]);
        let rules = vec![
            file_exists("b.txt"),
            ValidationRule::Unknown { kind: "nope".into() },
            file_exists("a.txt"),
        ];

        let outcomes = RuleEngine::new().evaluate_all(&rules, ws.path()).await;

        assert_eq!(outcomes.len(), 3);
        let rules_back: Vec<ValidationRule> = outcomes.iter().map(|o| o.rule.clone()).collect();
        assert_eq!(rules_back, rules);
        assert_eq!(
            outcomes.iter().map(|o| o.passed).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert!(!all_passed(&outcomes));
        assert!(all_passed(&outcomes[2..]));
    }
}
