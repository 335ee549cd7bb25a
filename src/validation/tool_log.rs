//! Structured tool-call log reader.
//!
//! The backend's tool layer appends one JSON object per tool invocation to
//! `.agent-matrix/tool-calls.jsonl` inside the workspace (the path is also
//! exported to the backend as `AGENT_MATRIX_TOOL_LOG`):
//!
//! ```text
//! {"tool": "developer__shell", "arguments": {"command": "cargo run"}}
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Workspace-relative location of the tool-call log.
pub const TOOL_LOG_RELATIVE_PATH: &str = ".agent-matrix/tool-calls.jsonl";

/// Environment variable naming the absolute log path for the backend.
pub const TOOL_LOG_ENV: &str = "AGENT_MATRIX_TOOL_LOG";

/// Returns the tool-call log path for a workspace.
pub fn tool_log_path(workspace: &Path) -> PathBuf {
    workspace.join(TOOL_LOG_RELATIVE_PATH)
}

/// One recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default, alias = "args")]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolCall {
    /// Returns an argument in the form patterns are matched against.
    pub fn argument_text(&self, name: &str) -> Option<String> {
        self.arguments.get(name).map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Reads the log. `Ok(None)` when no log was written.
pub fn read_tool_calls(workspace: &Path) -> io::Result<Option<Vec<ToolCall>>> {
    let path = tool_log_path(workspace);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut calls = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ToolCall>(line) {
            Ok(call) => calls.push(call),
            Err(e) => debug!("Skipping malformed tool-call log line {}: {}", idx + 1, e),
        }
    }
    Ok(Some(calls))
}

/// A compiled argument pattern.
#[derive(Debug)]
pub enum ArgMatcher {
    Literal(String),
    Regex(Regex),
}

impl ArgMatcher {
    /// Compiles `pattern`; `/…/` denotes a regex, anything else a literal.
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        if pattern.len() >= 2 && pattern.starts_with('/') && pattern.ends_with('/') {
            Regex::new(&pattern[1..pattern.len() - 1]).map(ArgMatcher::Regex)
        } else {
            Ok(ArgMatcher::Literal(pattern.to_string()))
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            ArgMatcher::Literal(literal) => text.contains(literal.as_str()),
            ArgMatcher::Regex(re) => re.is_match(text),
        }
    }
}
