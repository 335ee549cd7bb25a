//! Result aggregator.
//!
//! Tracks the state of every test pair and projects it into a matrix with
//! one row per (model, runner) and one column per scenario. Rows and columns
//! are fixed from the pair list when the aggregator is built, so the report
//! keeps its shape while results arrive.

pub mod render;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ReportError;
use crate::matrix::{PairKey, TestPair};
use crate::runner::RepresentativeResult;

pub use render::{open_report, render_html, ReportWriter, REPORT_HTML, RESULTS_JSON};

/// State of one matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellState {
    Pending,
    Running,
    Passed,
    Failed,
}

impl std::fmt::Display for CellState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellState::Pending => write!(f, "pending"),
            CellState::Running => write!(f, "running"),
            CellState::Passed => write!(f, "passed"),
            CellState::Failed => write!(f, "failed"),
        }
    }
}

/// One validation line shown in a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationLine {
    pub rule: String,
    pub passed: bool,
    pub message: Option<String>,
}

/// Details of a completed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDetail {
    pub attempt_index: u32,
    pub attempts_run: u32,
    pub duration_secs: f64,
    pub rules_passed: usize,
    pub rules_total: usize,
    pub validations: Vec<ValidationLine>,
    pub transport_error: Option<String>,
    pub log_path: String,
}

impl From<&RepresentativeResult> for CellDetail {
    fn from(result: &RepresentativeResult) -> Self {
        let attempt = &result.attempt;
        Self {
            attempt_index: attempt.attempt_index,
            attempts_run: result.attempts_run,
            duration_secs: attempt.duration.as_secs_f64(),
            rules_passed: attempt.rules_passed(),
            rules_total: attempt.validations.len(),
            validations: attempt
                .validations
                .iter()
                .map(|v| ValidationLine {
                    rule: v.rule.describe(),
                    passed: v.passed,
                    message: v.message.clone(),
                })
                .collect(),
            transport_error: attempt.transport_error.clone(),
            log_path: attempt.log_path.to_string_lossy().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub state: CellState,
    pub detail: Option<CellDetail>,
}

/// One (model, runner) row. Cells align with the snapshot's columns; a
/// `None` cell is a combination the matrix never selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub model: String,
    pub runner: String,
    pub cells: Vec<Option<Cell>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub total: usize,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} passed", self.passed, self.total)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if !self.is_complete() {
            write!(f, ", {} not run", self.pending)?;
        }
        Ok(())
    }
}

/// Serializable view of the whole matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSnapshot {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub summary: Summary,
}

#[derive(Debug, Clone)]
enum Entry {
    Pending,
    Completed(RepresentativeResult),
}

/// Aggregates representative results for a fixed pair list.
#[derive(Debug, Clone)]
pub struct ResultMatrix {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    columns: Vec<String>,
    rows: Vec<(String, String)>,
    order: Vec<PairKey>,
    entries: HashMap<PairKey, Entry>,
    in_flight: Option<PairKey>,
}

impl ResultMatrix {
    /// Creates an all-pending matrix for `pairs`.
    pub fn new(pairs: &[TestPair]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<(String, String)> = Vec::new();
        let mut order = Vec::with_capacity(pairs.len());
        let mut entries = HashMap::with_capacity(pairs.len());

        for pair in pairs {
            let key = pair.key();
            if !columns.contains(&key.scenario) {
                columns.push(key.scenario.clone());
            }
            let row = (key.model.clone(), key.runner.clone());
            if !rows.contains(&row) {
                rows.push(row);
            }
            if entries.insert(key.clone(), Entry::Pending).is_none() {
                order.push(key);
            }
        }

        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            columns,
            rows,
            order,
            entries,
            in_flight: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[(String, String)] {
        &self.rows
    }

    /// Current state of a pair, if it belongs to the matrix.
    pub fn state(&self, key: &PairKey) -> Option<CellState> {
        let entry = self.entries.get(key)?;
        Some(match entry {
            Entry::Completed(result) if result.passed() => CellState::Passed,
            Entry::Completed(_) => CellState::Failed,
            Entry::Pending if self.in_flight.as_ref() == Some(key) => CellState::Running,
            Entry::Pending => CellState::Pending,
        })
    }

    /// Marks a pending pair as in flight, replacing any previous marker.
    pub fn mark_running(&mut self, key: &PairKey) -> Result<(), ReportError> {
        match self.entries.get(key) {
            None => Err(ReportError::UnknownPair(key.to_string())),
            Some(Entry::Completed(_)) => Err(ReportError::AlreadyRecorded(key.to_string())),
            Some(Entry::Pending) => {
                self.in_flight = Some(key.clone());
                Ok(())
            }
        }
    }

    /// Drops the in-flight marker; committed cells are untouched.
    pub fn clear_in_flight(&mut self) {
        if let Some(key) = self.in_flight.take() {
            debug!("Cleared in-flight marker for {}", key);
        }
    }

    /// Commits the representative result of a pair.
    pub fn record(&mut self, result: RepresentativeResult) -> Result<(), ReportError> {
        let key = result.key.clone();
        match self.entries.get_mut(&key) {
            None => Err(ReportError::UnknownPair(key.to_string())),
            Some(Entry::Completed(_)) => Err(ReportError::AlreadyRecorded(key.to_string())),
            Some(entry) => {
                *entry = Entry::Completed(result);
                if self.in_flight.as_ref() == Some(&key) {
                    self.in_flight = None;
                }
                Ok(())
            }
        }
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            total: self.order.len(),
            ..Summary::default()
        };
        for key in &self.order {
            match self.state(key) {
                Some(CellState::Passed) => summary.passed += 1,
                Some(CellState::Failed) => summary.failed += 1,
                _ => summary.pending += 1,
            }
        }
        summary
    }

    pub fn snapshot(&self) -> MatrixSnapshot {
        let rows = self
            .rows
            .iter()
            .map(|(model, runner)| Row {
                model: model.clone(),
                runner: runner.clone(),
                cells: self
                    .columns
                    .iter()
                    .map(|scenario| {
                        let key = PairKey::new(scenario, model, runner);
                        let state = self.state(&key)?;
                        let detail = match self.entries.get(&key) {
                            Some(Entry::Completed(result)) => Some(CellDetail::from(result)),
                            _ => None,
                        };
                        Some(Cell { state, detail })
                    })
                    .collect(),
            })
            .collect();

        MatrixSnapshot {
            run_id: self.run_id.to_string(),
            started_at: self.started_at,
            updated_at: Utc::now(),
            columns: self.columns.clone(),
            rows,
            summary: self.summary(),
        }
    }
}
