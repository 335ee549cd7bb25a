//! Suite driver.
//!
//! Runs every test pair in order, keeping `results.json` and `report.html`
//! current after each state change so a long run can be watched from the
//! browser. Ctrl-C stops the pair in flight and leaves a report of what
//! completed.

use std::future::Future;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::SuiteError;
use crate::matrix::TestPair;
use crate::report::{MatrixSnapshot, ReportWriter, ResultMatrix};
use crate::runner::{ExecutionConfig, Executor};

/// Where and how a suite runs.
#[derive(Debug, Clone)]
pub struct SuiteOptions {
    pub execution: ExecutionConfig,
    pub results_dir: PathBuf,
}

impl SuiteOptions {
    /// Options with logs under `{results_dir}/logs`.
    pub fn new(workdir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        let results_dir = results_dir.into();
        Self {
            execution: ExecutionConfig::new(workdir, results_dir.join("logs")),
            results_dir,
        }
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }
}

/// Final state of a suite run.
#[derive(Debug, Clone)]
pub struct SuiteOutcome {
    pub snapshot: MatrixSnapshot,
    pub report_path: PathBuf,
    /// True when the run was interrupted before every pair completed.
    pub cancelled: bool,
}

impl SuiteOutcome {
    pub fn all_passed(&self) -> bool {
        !self.cancelled && self.snapshot.summary.all_passed()
    }
}

/// Runs the suite until every pair is done or Ctrl-C is pressed.
pub async fn run_suite(pairs: &[TestPair], options: SuiteOptions) -> Result<SuiteOutcome, SuiteError> {
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; never interrupt.
            std::future::pending::<()>().await;
        }
    };
    run_suite_until(pairs, options, interrupted).await
}

/// Runs the suite until every pair is done or `shutdown` resolves.
pub async fn run_suite_until<F>(
    pairs: &[TestPair],
    options: SuiteOptions,
    shutdown: F,
) -> Result<SuiteOutcome, SuiteError>
where
    F: Future<Output = ()>,
{
    let mut matrix = ResultMatrix::new(pairs);
    let writer = ReportWriter::new(&options.results_dir);
    writer.write(&matrix.snapshot())?;

    info!(
        run_id = %matrix.run_id(),
        "Running {} pairs ({} scenarios x {} model/runner rows); report at {}",
        pairs.len(),
        matrix.columns().len(),
        matrix.rows().len(),
        writer.html_path().display()
    );

    let mut executor = Executor::new(options.execution);
    let mut cancelled = false;
    tokio::pin!(shutdown);

    for (i, pair) in pairs.iter().enumerate() {
        let key = pair.key();
        matrix.mark_running(&key)?;
        writer.write(&matrix.snapshot())?;
        info!(pair = %key, "[{}/{}] Starting", i + 1, pairs.len());

        // Shutdown is polled first so an interrupted pair is never recorded.
        let result = tokio::select! {
            biased;
            _ = &mut shutdown => {
                warn!(pair = %key, "Interrupted; {} of {} pairs completed", i, pairs.len());
                cancelled = true;
                break;
            }
            result = executor.execute(pair) => result?,
        };

        info!(
            pair = %key,
            "[{}/{}] {} (attempt {} of {})",
            i + 1,
            pairs.len(),
            result.attempt.status,
            result.attempt.attempt_index,
            result.attempts_run
        );
        matrix.record(result)?;
        writer.write(&matrix.snapshot())?;
    }

    if cancelled {
        matrix.clear_in_flight();
        writer.write(&matrix.snapshot())?;
    }

    let snapshot = matrix.snapshot();
    info!(run_id = %matrix.run_id(), "Suite finished: {}", snapshot.summary);
    Ok(SuiteOutcome {
        snapshot,
        report_path: writer.html_path(),
        cancelled,
    })
}
