//! Test-pair builder.
//!
//! Expands the registry, the scenario set and the optional matrix into the
//! ordered list of (scenario, model, runner) triples to execute. Building is
//! deterministic: the same inputs always produce the same pairs in the same
//! order, with no duplicate identity keys.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{MatrixEntry, ModelSpec, Registry, RunnerSpec};
use crate::scenario::Scenario;
use crate::utils::escape_component;

/// Identity of a test pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub scenario: String,
    pub model: String,
    pub runner: String,
}

impl PairKey {
    pub fn new(
        scenario: impl Into<String>,
        model: impl Into<String>,
        runner: impl Into<String>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            model: model.into(),
            runner: runner.into(),
        }
    }

    /// Filesystem-safe name used for workspaces and log directories.
    ///
    /// Each field is escaped before joining on `_`, so distinct keys never
    /// share a slug.
    pub fn slug(&self) -> String {
        [&self.scenario, &self.model, &self.runner]
            .iter()
            .map(|part| escape_component(part))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl std::fmt::Display for PairKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.scenario, self.model, self.runner)
    }
}

/// A fully resolved unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPair {
    pub scenario: Scenario,
    pub model: ModelSpec,
    pub runner: RunnerSpec,
}

impl TestPair {
    pub fn key(&self) -> PairKey {
        PairKey::new(&self.scenario.name, &self.model.name, &self.runner.name)
    }
}

/// Substring filter over names; comma-separated terms are OR-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    terms: Vec<String>,
}

impl NameFilter {
    /// Parses `"a,b"`; `None` or blank terms match everything.
    pub fn parse(raw: Option<&str>) -> Self {
        let terms = raw
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        Self { terms }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.terms.is_empty() || self.terms.iter().any(|t| name.contains(t.as_str()))
    }

    /// Keeps the items whose name matches.
    pub fn retain<T>(&self, items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
        if self.is_empty() {
            return items;
        }
        items.into_iter().filter(|item| self.matches(name(item))).collect()
    }
}

/// Filters applied to scenarios, models and runners before building.
#[derive(Debug, Clone, Default)]
pub struct PairFilters {
    pub scenario: NameFilter,
    pub model: NameFilter,
    pub runner: NameFilter,
}

impl PairFilters {
    pub fn apply(&self, registry: Registry, scenarios: Vec<Scenario>) -> (Registry, Vec<Scenario>) {
        let scenarios = self.scenario.retain(scenarios, |s| s.name.as_str());
        let models = self.model.retain(registry.models, |m| m.name.as_str());
        let runners = self.runner.retain(registry.runners, |r| r.name.as_str());
        (Registry::new(models, runners), scenarios)
    }
}

/// Resolves a name list against a registry slice, or takes everything.
fn resolve<'a, T>(
    names: Option<&Vec<String>>,
    all: &'a [T],
    name_of: impl Fn(&T) -> &str,
    what: &str,
) -> Vec<&'a T> {
    match names {
        None => all.iter().collect(),
        Some(names) => names
            .iter()
            .filter_map(|name| {
                let found = all.iter().find(|item| name_of(item) == name.as_str());
                if found.is_none() {
                    debug!("Matrix {} '{}' not available; dropped", what, name);
                }
                found
            })
            .collect(),
    }
}

/// Builds the ordered, de-duplicated pair list.
pub fn build(
    registry: &Registry,
    scenarios: &[Scenario],
    matrix: Option<&[MatrixEntry]>,
) -> Vec<TestPair> {
    let mut pairs = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |scenario: &Scenario, model: &ModelSpec, runner: &RunnerSpec| {
        let pair = TestPair {
            scenario: scenario.clone(),
            model: model.clone(),
            runner: runner.clone(),
        };
        // Keyed by slug: pairs sharing one would share a workspace and logs.
        if seen.insert(pair.key().slug()) {
            pairs.push(pair);
        }
    };

    match matrix.filter(|m| !m.is_empty()) {
        None => {
            for scenario in scenarios {
                for model in &registry.models {
                    for runner in &registry.runners {
                        push(scenario, model, runner);
                    }
                }
            }
        }
        Some(entries) => {
            for entry in entries {
                let selected: Vec<&Scenario> = match &entry.scenario {
                    None => scenarios.iter().collect(),
                    Some(name) => match scenarios.iter().find(|s| &s.name == name) {
                        Some(scenario) => vec![scenario],
                        None => {
                            debug!("Matrix scenario '{}' not available; entry skipped", name);
                            continue;
                        }
                    },
                };
                let models = resolve(
                    entry.models.as_ref(),
                    &registry.models,
                    |m| m.name.as_str(),
                    "model",
                );
                let runners = resolve(
                    entry.runners.as_ref(),
                    &registry.runners,
                    |r| r.name.as_str(),
                    "runner",
                );

                for scenario in selected.iter().copied() {
                    for model in models.iter().copied() {
                        for runner in runners.iter().copied() {
                            push(scenario, model, runner);
                        }
                    }
                }
            }
        }
    }

    info!("Built {} test pairs", pairs.len());
    pairs
}
