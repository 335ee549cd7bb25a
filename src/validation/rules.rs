//! Validation rule definitions.
//!
//! Rules are declared in scenario documents as a `type` tag plus fields:
//!
//! ```yaml
//! validate:
//!   - type: file-contains
//!     path: src/main.rs
//!     pattern: debug_args
//!   - type: tool-called
//!     tool: developer__shell
//!     args:
//!       command: "/cargo (build|run)/"
//! ```
//!
//! Deserialization never fails on a single rule: an unknown `type` or a rule
//! with missing/mistyped fields becomes a variant that evaluates to a failed
//! outcome, so one bad rule cannot reject a whole scenario.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Rule kinds understood by the engine, in their canonical spelling.
pub const KNOWN_KINDS: &[&str] = &[
    "file-exists",
    "file-not-empty",
    "file-contains",
    "file-matches",
    "command-succeeds",
    "tool-called",
    "custom",
];

/// A single postcondition checked against a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ValidationRule {
    FileExists {
        path: String,
    },
    FileNotEmpty {
        path: String,
    },
    /// Literal substring match.
    FileContains {
        path: String,
        pattern: String,
    },
    FileMatches {
        path: String,
        regex: String,
    },
    /// Run through `sh -c` with the workspace as working directory.
    CommandSucceeds {
        command: String,
    },
    /// Argument patterns are literal substrings, or regexes when written `/…/`.
    ToolCalled {
        tool: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        args: BTreeMap<String, String>,
    },
    Custom {
        reference: String,
    },
    Unknown {
        kind: String,
    },
    Malformed {
        kind: String,
        reason: String,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum WireRule {
    #[serde(alias = "file_exists")]
    FileExists { path: String },
    #[serde(alias = "file_not_empty")]
    FileNotEmpty { path: String },
    #[serde(alias = "file_contains")]
    FileContains { path: String, pattern: String },
    #[serde(alias = "file_matches")]
    FileMatches {
        path: String,
        #[serde(alias = "pattern")]
        regex: String,
    },
    #[serde(alias = "command_succeeds")]
    CommandSucceeds { command: String },
    #[serde(alias = "tool_called")]
    ToolCalled {
        tool: String,
        #[serde(default, alias = "arguments", deserialize_with = "scalar_patterns")]
        args: BTreeMap<String, String>,
    },
    Custom {
        #[serde(alias = "ref")]
        reference: String,
    },
}

/// Reads argument patterns, taking numbers and booleans in the same string
/// form the tool-call log renders them in.
fn scalar_patterns<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_yaml::Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|(name, value)| -> Result<(String, String), D::Error> {
            let pattern = match value {
                serde_yaml::Value::String(s) => s,
                serde_yaml::Value::Number(n) => n.to_string(),
                serde_yaml::Value::Bool(b) => b.to_string(),
                serde_yaml::Value::Null => "null".to_string(),
                _ => {
                    return Err(serde::de::Error::custom(format!(
                        "argument '{}' must be a scalar pattern",
                        name
                    )))
                }
            };
            Ok((name, pattern))
        })
        .collect()
}

impl From<WireRule> for ValidationRule {
    fn from(wire: WireRule) -> Self {
        match wire {
            WireRule::FileExists { path } => ValidationRule::FileExists { path },
            WireRule::FileNotEmpty { path } => ValidationRule::FileNotEmpty { path },
            WireRule::FileContains { path, pattern } => {
                ValidationRule::FileContains { path, pattern }
            }
            WireRule::FileMatches { path, regex } => ValidationRule::FileMatches { path, regex },
            WireRule::CommandSucceeds { command } => ValidationRule::CommandSucceeds { command },
            WireRule::ToolCalled { tool, args } => ValidationRule::ToolCalled { tool, args },
            WireRule::Custom { reference } => ValidationRule::Custom { reference },
        }
    }
}

impl ValidationRule {
    /// Builds a rule from a parsed document node, failing closed.
    pub fn from_value(value: serde_yaml::Value) -> Self {
        let kind = match value.get("type") {
            Some(serde_yaml::Value::String(kind)) => kind.clone(),
            Some(other) => {
                return ValidationRule::Malformed {
                    kind: "<invalid>".to_string(),
                    reason: format!("'type' must be a string, got {}", yaml_inline(other)),
                }
            }
            None => {
                return ValidationRule::Malformed {
                    kind: "<missing>".to_string(),
                    reason: "rule has no 'type' field".to_string(),
                }
            }
        };

        let canonical = kind.replace('_', "-");
        if !KNOWN_KINDS.contains(&canonical.as_str()) {
            return ValidationRule::Unknown { kind };
        }

        match serde_yaml::from_value::<WireRule>(value) {
            Ok(wire) => wire.into(),
            Err(e) => ValidationRule::Malformed {
                kind,
                reason: e.to_string(),
            },
        }
    }

    /// Returns the rule's kind as written in documents.
    pub fn kind(&self) -> &str {
        match self {
            ValidationRule::FileExists { .. } => "file-exists",
            ValidationRule::FileNotEmpty { .. } => "file-not-empty",
            ValidationRule::FileContains { .. } => "file-contains",
            ValidationRule::FileMatches { .. } => "file-matches",
            ValidationRule::CommandSucceeds { .. } => "command-succeeds",
            ValidationRule::ToolCalled { .. } => "tool-called",
            ValidationRule::Custom { .. } => "custom",
            ValidationRule::Unknown { kind } | ValidationRule::Malformed { kind, .. } => kind,
        }
    }

    /// One-line description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            ValidationRule::FileExists { path } | ValidationRule::FileNotEmpty { path } => {
                format!("{} {}", self.kind(), path)
            }
            ValidationRule::FileContains { path, pattern } => {
                format!("file-contains {} '{}'", path, pattern)
            }
            ValidationRule::FileMatches { path, regex } => {
                format!("file-matches {} /{}/", path, regex)
            }
            ValidationRule::CommandSucceeds { command } => format!("command-succeeds `{}`", command),
            ValidationRule::ToolCalled { tool, args } if args.is_empty() => {
                format!("tool-called {}", tool)
            }
            ValidationRule::ToolCalled { tool, args } => {
                let names: Vec<&str> = args.keys().map(String::as_str).collect();
                format!("tool-called {} ({})", tool, names.join(", "))
            }
            ValidationRule::Custom { reference } => format!("custom {}", reference),
            ValidationRule::Unknown { kind } | ValidationRule::Malformed { kind, .. } => {
                format!("{} (invalid)", kind)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ValidationRule {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_yaml::Value::deserialize(deserializer)?;
        Ok(ValidationRule::from_value(value))
    }
}

fn yaml_inline(value: &serde_yaml::Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}
