//! Legacy single-backend config shape.
//!
//! Before runners were split from models, a suite config was a flat list of
//! goose agent configurations:
//!
//! ```yaml
//! agent-config:
//!   - name: opus
//!     provider: anthropic
//!     model: claude-opus-4-5
//!     extensions: [developer]
//! ```
//!
//! Each entry becomes a [`ModelSpec`]. Entries sharing the same extension and
//! stdio settings share one goose [`RunnerSpec`]. When more than one settings
//! group exists, a wildcard-scenario matrix pins every model to its own
//! group's runner so models never run with another entry's tools.

use std::path::Path;

use serde::Deserialize;

use super::{GooseSettings, MatrixEntry, ModelSpec, RunnerSettings, RunnerSpec, StdioServer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyAgentConfig {
    pub name: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub stdio: Vec<StdioServer>,
}

pub(crate) struct Normalized {
    pub models: Vec<ModelSpec>,
    pub runners: Vec<RunnerSpec>,
    pub matrix: Option<Vec<MatrixEntry>>,
}

fn runner_name(group: usize) -> String {
    if group == 0 {
        "goose".to_string()
    } else {
        format!("goose-{}", group + 1)
    }
}

pub(crate) fn normalize(entries: Vec<LegacyAgentConfig>, origin_dir: &Path) -> Normalized {
    let mut groups: Vec<GooseSettings> = Vec::new();
    let mut models = Vec::with_capacity(entries.len());
    let mut membership = Vec::with_capacity(entries.len());

    for entry in entries {
        let settings = GooseSettings {
            extensions: entry.extensions,
            stdio: entry.stdio,
        };
        let group = match groups.iter().position(|g| *g == settings) {
            Some(idx) => idx,
            None => {
                groups.push(settings);
                groups.len() - 1
            }
        };
        membership.push((entry.name.clone(), group));
        models.push(ModelSpec::new(entry.name, entry.provider, entry.model));
    }

    let matrix = if groups.len() > 1 {
        Some(
            membership
                .iter()
                .map(|(model, group)| {
                    MatrixEntry::default()
                        .with_models(&[model.as_str()])
                        .with_runners(&[runner_name(*group).as_str()])
                })
                .collect(),
        )
    } else {
        None
    };

    let runners = groups
        .into_iter()
        .enumerate()
        .map(|(idx, settings)| {
            RunnerSpec::new(runner_name(idx), RunnerSettings::Goose(settings), origin_dir)
        })
        .collect();

    Normalized {
        models,
        runners,
        matrix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RunnerKind, SuiteConfig};

    #[test]
    fn test_legacy_single_group_is_cross_product() {
        let config = SuiteConfig::from_yaml_str(
            r#"
agent-config:
  - name: anthropic_claude-opus-4-5
    provider: anthropic
    model: claude-opus-4-5
    extensions: [developer]
  - name: ollama_qwen3-coder_64k
    provider: ollama
    model: "qwen3-coder:64k"
    extensions: [developer]
"#,
            Path::new("config.yaml"),
            Path::new("/suite"),
        )
        .unwrap();

        assert_eq!(config.registry.models.len(), 2);
        assert_eq!(config.registry.runners.len(), 1);
        assert_eq!(config.registry.runners[0].name, "goose");
        assert_eq!(config.registry.runners[0].kind(), RunnerKind::Goose);
        assert!(config.matrix.is_none());
    }

    #[test]
    fn test_legacy_distinct_settings_pin_models_to_runners() {
        let entries = vec![
            LegacyAgentConfig {
                name: "a".into(),
                provider: "anthropic".into(),
                model: "x".into(),
                extensions: vec!["developer".into()],
                stdio: vec![],
            },
            LegacyAgentConfig {
                name: "b".into(),
                provider: "ollama".into(),
                model: "y".into(),
                extensions: vec!["developer".into(), "memory".into()],
                stdio: vec![],
            },
            LegacyAgentConfig {
                name: "c".into(),
                provider: "ollama".into(),
                model: "z".into(),
                extensions: vec!["developer".into()],
                stdio: vec![],
            },
        ];

        let normalized = normalize(entries, Path::new("/suite"));

        let names: Vec<&str> = normalized.runners.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["goose", "goose-2"]);

        let matrix = normalized.matrix.unwrap();
        assert_eq!(matrix.len(), 3);
        assert!(matrix.iter().all(|e| e.scenario.is_none()));
        assert_eq!(matrix[0].runners, Some(vec!["goose".to_string()]));
        assert_eq!(matrix[1].runners, Some(vec!["goose-2".to_string()]));
        assert_eq!(matrix[2].models, Some(vec!["c".to_string()]));
        assert_eq!(matrix[2].runners, Some(vec!["goose".to_string()]));
    }
}
