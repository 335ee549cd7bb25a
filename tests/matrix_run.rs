//! End-to-end tests for a full suite run.
//!
//! The runner is a generic backend pointing at a shell script, so these
//! tests need `sh` but no real agent.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use agent_matrix::config::SuiteConfig;
use agent_matrix::matrix::build;
use agent_matrix::report::{CellState, MatrixSnapshot};
use agent_matrix::runner::ExecutionConfig;
use agent_matrix::scenario::load_scenarios;
use agent_matrix::suite::{run_suite_until, SuiteOptions};

const AGENT_SCRIPT: &str = r#"
echo "model=$AGENT_MATRIX_MODEL prompt=$1"
echo done > out.txt
echo '{"tool": "write_file", "arguments": {"path": "out.txt", "content": "done"}}' >> "$AGENT_MATRIX_TOOL_LOG"
"#;

const CONFIG: &str = r#"
models:
  - name: opus
    provider: anthropic
    model: claude-opus-4-5
  - name: qwen
    provider: ollama
    model: qwen3-coder:64k
runners:
  - name: script
    type: generic
    binary: sh
    args: [./agent.sh]
"#;

const CREATE_SCENARIO: &str = r#"
name: create-file
description: Create a file
prompt: Create out.txt containing the word done.
validate:
  - type: file-contains
    path: out.txt
    pattern: done
  - type: tool-called
    tool: write_file
    args:
      path: /out\.txt$/
"#;

const EDIT_SCENARIO: &str = r#"
name: edit-existing-file
prompt: Add a debug_args function to hello.rs.
setup:
  hello.rs: |
    fn main() {
        println!("Hello, world!");
    }
validate:
  - type: file-exists
    path: hello.rs
  - type: file-contains
    path: hello.rs
    pattern: debug_args
  - type: shell-magic
    spell: xyzzy
"#;

fn write_suite(root: &Path, config: &str) {
    fs::create_dir_all(root.join("scenarios")).unwrap();
    fs::write(root.join("agent.sh"), AGENT_SCRIPT).unwrap();
    fs::write(root.join("agents.yaml"), config).unwrap();
    fs::write(root.join("scenarios/create.yaml"), CREATE_SCENARIO).unwrap();
    fs::write(root.join("scenarios/edit.yaml"), EDIT_SCENARIO).unwrap();
}

fn options(root: &Path) -> SuiteOptions {
    let results = root.join("results");
    let execution = ExecutionConfig::new(root.join("work"), results.join("logs"))
        .with_attempts(2)
        .with_timeout(Duration::from_secs(30));
    SuiteOptions::new(root.join("work"), results).with_execution(execution)
}

#[tokio::test]
async fn test_full_matrix_run() {
    let temp = tempfile::TempDir::new().unwrap();
    write_suite(temp.path(), CONFIG);

    let config = SuiteConfig::load(&temp.path().join("agents.yaml")).unwrap();
    let scenarios = load_scenarios(&temp.path().join("scenarios")).unwrap();
    let pairs = build(&config.registry, &scenarios, config.matrix.as_deref());
    assert_eq!(pairs.len(), 4);

    let outcome = run_suite_until(&pairs, options(temp.path()), std::future::pending())
        .await
        .unwrap();
    let snapshot = &outcome.snapshot;

    assert!(!outcome.cancelled);
    assert_eq!(snapshot.columns, vec!["create-file", "edit-existing-file"]);
    assert_eq!(snapshot.summary.total, 4);
    assert_eq!(snapshot.summary.passed, 2);
    assert_eq!(snapshot.summary.failed, 2);

    for row in &snapshot.rows {
        let create = row.cells[0].as_ref().unwrap();
        assert_eq!(create.state, CellState::Passed);
        assert_eq!(create.detail.as_ref().unwrap().attempts_run, 2);

        let edit = row.cells[1].as_ref().unwrap();
        assert_eq!(edit.state, CellState::Failed);
        let detail = edit.detail.as_ref().unwrap();
        assert_eq!(detail.attempts_run, 1);
        assert_eq!(detail.rules_passed, 1);
        let messages: Vec<&str> = detail
            .validations
            .iter()
            .filter_map(|v| v.message.as_deref())
            .collect();
        assert_eq!(
            messages,
            vec![
                "hello.rs does not contain: debug_args",
                "Unknown validation rule type: shell-magic",
            ]
        );
    }

    let written: MatrixSnapshot = serde_json::from_str(
        &fs::read_to_string(temp.path().join("results/results.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(written.summary, snapshot.summary);
    assert!(temp.path().join("results/report.html").is_file());

    let log = fs::read_to_string(
        temp.path()
            .join("results/logs/create-file_qwen_script/attempt-2.log"),
    )
    .unwrap();
    assert!(log.starts_with("model=qwen3-coder:64k prompt="));
}

#[tokio::test]
async fn test_matrix_selects_subset_and_tolerates_unknown_names() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = format!(
        "{}matrix:\n  - scenario: create-file\n    models: [qwen, gpt-9]\n  - scenario: deleted-scenario\n",
        CONFIG
    );
    write_suite(temp.path(), &config);

    let config = SuiteConfig::load(&temp.path().join("agents.yaml")).unwrap();
    let scenarios = load_scenarios(&temp.path().join("scenarios")).unwrap();
    let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(config.unresolved_references(&names).len(), 2);

    let pairs = build(&config.registry, &scenarios, config.matrix.as_deref());
    assert_eq!(pairs.len(), 1);

    let outcome = run_suite_until(&pairs, options(temp.path()), std::future::pending())
        .await
        .unwrap();
    assert!(outcome.all_passed());
    assert_eq!(outcome.snapshot.rows.len(), 1);
    assert_eq!(outcome.snapshot.rows[0].model, "qwen");
}

#[test]
fn test_legacy_config_lists_goose_pairs() {
    let temp = tempfile::TempDir::new().unwrap();
    let legacy = r#"
agent-config:
  - name: opus
    provider: anthropic
    model: claude-opus-4-5
    extensions: [developer]
  - name: qwen
    provider: ollama
    model: qwen3-coder:64k
    extensions: [developer]
"#;
    write_suite(temp.path(), legacy);

    let config = SuiteConfig::load(&temp.path().join("agents.yaml")).unwrap();
    let scenarios = load_scenarios(&temp.path().join("scenarios")).unwrap();
    let pairs = build(&config.registry, &scenarios, config.matrix.as_deref());

    let keys: Vec<String> = pairs.iter().map(|p| p.key().to_string()).collect();
    assert_eq!(
        keys,
        vec![
            "create-file / opus / goose",
            "create-file / qwen / goose",
            "edit-existing-file / opus / goose",
            "edit-existing-file / qwen / goose",
        ]
    );
}

#[tokio::test]
async fn test_underscored_names_keep_separate_workspaces_and_logs() {
    let temp = tempfile::TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("scenarios")).unwrap();
    fs::write(
        root.join("agent.sh"),
        "echo \"model=$AGENT_MATRIX_MODEL\"\necho done > out.txt\n",
    )
    .unwrap();
    fs::write(
        root.join("agents.yaml"),
        r#"
models:
  - name: c
    provider: p
    model: FIRST
  - name: b_c
    provider: p
    model: SECOND
runners:
  - name: r
    type: generic
    binary: sh
    args: [./agent.sh]
matrix:
  - scenario: a_b
    models: [c]
  - scenario: a
    models: [b_c]
"#,
    )
    .unwrap();
    for name in ["a_b", "a"] {
        fs::write(
            root.join(format!("scenarios/{}.yaml", name)),
            format!(
                "name: {}\nprompt: Create out.txt\nvalidate:\n  - type: file-exists\n    path: out.txt\n",
                name
            ),
        )
        .unwrap();
    }

    let config = SuiteConfig::load(&root.join("agents.yaml")).unwrap();
    let scenarios = load_scenarios(&root.join("scenarios")).unwrap();
    let pairs = build(&config.registry, &scenarios, config.matrix.as_deref());
    assert_eq!(pairs.len(), 2);

    let outcome = run_suite_until(&pairs, options(root), std::future::pending())
        .await
        .unwrap();
    assert!(outcome.all_passed());

    let logs: Vec<String> = outcome
        .snapshot
        .rows
        .iter()
        .flat_map(|row| row.cells.iter().flatten())
        .map(|cell| cell.detail.as_ref().unwrap().log_path.clone())
        .collect();
    assert_eq!(logs.len(), 2);
    assert_ne!(logs[0], logs[1]);

    let mut outputs: Vec<String> = logs
        .iter()
        .map(|path| fs::read_to_string(path).unwrap())
        .collect();
    outputs.sort();
    assert_eq!(outputs, vec!["model=FIRST\n", "model=SECOND\n"]);
}
