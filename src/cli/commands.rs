//! CLI command definitions for agent-matrix.
//!
//! `run` executes the selected test pairs and writes the report; `list`
//! shows which pairs a run would execute without touching any backend.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::SuiteConfig;
use crate::matrix::{build, NameFilter, PairFilters, PairKey, TestPair};
use crate::report::{open_report, CellState, MatrixSnapshot};
use crate::runner::{ExecutionConfig, DEFAULT_ATTEMPTS};
use crate::scenario::load_scenarios;
use crate::suite::{run_suite, SuiteOptions};
use crate::utils::truncate;

const DEFAULT_CONFIG: &str = "agents.yaml";
const DEFAULT_SCENARIOS_DIR: &str = "scenarios";
const DEFAULT_WORKDIR: &str = ".workdir";
const DEFAULT_RESULTS_DIR: &str = "results";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Longest failure message printed per line in the summary.
const MAX_DETAIL_LEN: usize = 200;

/// Evaluate coding agents across scenarios, models and runners.
#[derive(Parser)]
#[command(name = "agent-matrix")]
#[command(about = "Run agent scenarios across a matrix of models and runners")]
#[command(version)]
#[command(
    long_about = "agent-matrix runs every scenario against every selected (model, runner) pair, retries each pair, keeps the worst attempt and writes an HTML matrix report.\n\nExample usage:\n  agent-matrix run --config agents.yaml --scenarios scenarios --model opus --attempts 3"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the selected test pairs and write the report.
    Run(RunArgs),

    /// Print the test pairs a run would execute.
    #[command(alias = "ls")]
    List(ListArgs),
}

/// Inputs and filters shared by every command.
#[derive(clap::Args, Debug)]
pub struct SuiteArgs {
    /// Config document naming models, runners and the optional matrix.
    #[arg(short = 'c', long, env = "AGENT_MATRIX_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Directory searched recursively for scenario documents.
    #[arg(short = 's', long, env = "AGENT_MATRIX_SCENARIOS", default_value = DEFAULT_SCENARIOS_DIR)]
    pub scenarios: PathBuf,

    /// Comma-separated substrings; only matching scenarios run.
    #[arg(long)]
    pub scenario: Option<String>,

    /// Comma-separated substrings; only matching models run.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Comma-separated substrings; only matching runners run.
    #[arg(short = 'r', long)]
    pub runner: Option<String>,
}

/// Arguments for `agent-matrix run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Attempts per pair; the worst attempt is reported.
    #[arg(short = 'n', long, env = "AGENT_MATRIX_ATTEMPTS", default_value_t = DEFAULT_ATTEMPTS)]
    pub attempts: u32,

    /// Timeout in seconds for one backend invocation.
    #[arg(short = 't', long, env = "AGENT_MATRIX_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Directory holding per-pair workspaces and the backend config root.
    #[arg(long, env = "AGENT_MATRIX_WORKDIR", default_value = DEFAULT_WORKDIR)]
    pub workdir: PathBuf,

    /// Directory receiving results.json, report.html and attempt logs.
    #[arg(short = 'o', long, env = "AGENT_MATRIX_RESULTS", default_value = DEFAULT_RESULTS_DIR)]
    pub results: PathBuf,

    /// Do not open the HTML report when the run finishes.
    #[arg(long)]
    pub no_open: bool,

    /// Print the final snapshot as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `agent-matrix list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Print the pairs as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_run_command(args).await,
        Commands::List(args) => run_list_command(args),
    }
}

/// Loads config and scenarios, applies filters and builds the pair list.
fn plan(args: &SuiteArgs) -> anyhow::Result<Vec<TestPair>> {
    let config = SuiteConfig::load(&args.config)
        .with_context(|| format!("Loading config {}", args.config.display()))?;
    let scenarios = load_scenarios(&args.scenarios)
        .with_context(|| format!("Loading scenarios from {}", args.scenarios.display()))?;

    let names: Vec<&str> = scenarios.iter().map(|s| s.name.as_str()).collect();
    config.unresolved_references(&names);

    let filters = PairFilters {
        scenario: NameFilter::parse(args.scenario.as_deref()),
        model: NameFilter::parse(args.model.as_deref()),
        runner: NameFilter::parse(args.runner.as_deref()),
    };
    let (registry, scenarios) = filters.apply(config.registry, scenarios);
    let pairs = build(&registry, &scenarios, config.matrix.as_deref());

    if pairs.is_empty() {
        anyhow::bail!("No test pairs selected; check the matrix and the --scenario/--model/--runner filters");
    }
    Ok(pairs)
}

/// Makes a path absolute against the current directory.
///
/// Backends run with the workspace as their working directory, so every
/// path handed to them must not depend on ours.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

async fn run_run_command(args: RunArgs) -> anyhow::Result<()> {
    let pairs = plan(&args.suite)?;

    let workdir = absolute(&args.workdir)?;
    let results = absolute(&args.results)?;
    let execution = ExecutionConfig::new(&workdir, results.join("logs"))
        .with_attempts(args.attempts)
        .with_timeout(Duration::from_secs(args.timeout));
    let options = SuiteOptions::new(&workdir, &results).with_execution(execution);

    info!(
        "Running {} pairs, {} attempts each, {}s timeout",
        pairs.len(),
        args.attempts.max(1),
        args.timeout
    );
    let outcome = run_suite(&pairs, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome.snapshot)?);
    } else {
        print_summary(&outcome.snapshot);
        println!("Report: {}", outcome.report_path.display());
    }

    if !args.no_open {
        open_report(&outcome.report_path);
    }

    let summary = outcome.snapshot.summary;
    if outcome.cancelled {
        anyhow::bail!("Interrupted: {}", summary);
    }
    if !summary.all_passed() {
        anyhow::bail!("{} of {} pairs failed", summary.failed, summary.total);
    }
    Ok(())
}

fn print_summary(snapshot: &MatrixSnapshot) {
    println!("\n=== Agent Matrix Results ===");
    println!("Pairs:   {}", snapshot.summary.total);
    println!("Passed:  {}", snapshot.summary.passed);
    println!("Failed:  {}", snapshot.summary.failed);
    println!("Not run: {}", snapshot.summary.pending);
    println!();

    for row in &snapshot.rows {
        for (scenario, cell) in snapshot.columns.iter().zip(&row.cells) {
            let Some(cell) = cell else { continue };
            let key = PairKey::new(scenario, &row.model, &row.runner);
            match &cell.detail {
                Some(detail) => println!(
                    "  {} [{}] rules={}/{} attempt={}/{} {:.1}s",
                    key,
                    cell.state,
                    detail.rules_passed,
                    detail.rules_total,
                    detail.attempt_index,
                    detail.attempts_run,
                    detail.duration_secs
                ),
                None => println!("  {} [{}]", key, cell.state),
            }
            if cell.state == CellState::Failed {
                if let Some(detail) = &cell.detail {
                    if let Some(error) = &detail.transport_error {
                        println!("      {}", truncate(error, MAX_DETAIL_LEN));
                    }
                    for line in detail.validations.iter().filter(|v| !v.passed) {
                        let message = line.message.as_deref().unwrap_or(&line.rule);
                        println!("      {}", truncate(message, MAX_DETAIL_LEN));
                    }
                }
            }
        }
    }
    println!();
}

fn run_list_command(args: ListArgs) -> anyhow::Result<()> {
    let pairs = plan(&args.suite)?;
    let keys: Vec<PairKey> = pairs.iter().map(TestPair::key).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
    } else {
        for (pair, key) in pairs.iter().zip(&keys) {
            println!(
                "  {} ({} via {}, {} rules)",
                key,
                pair.model.qualified(),
                pair.runner.kind(),
                pair.scenario.validate.len()
            );
        }
        println!("{} pairs", keys.len());
    }
    Ok(())
}
