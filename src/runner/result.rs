//! Attempts, scoring, and representative results.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matrix::PairKey;
use crate::validation::{all_passed, ValidationOutcome};

/// Status of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Running,
    Passed,
    Failed,
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptStatus::Running => write!(f, "running"),
            AttemptStatus::Passed => write!(f, "passed"),
            AttemptStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Coarse rank of an attempt, worst first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTier {
    TransportError,
    Failed,
    Passed,
}

/// Total order over attempts: tier first, then passed rule count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptScore {
    pub tier: ScoreTier,
    pub rules_passed: usize,
}

/// One execution of a test pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number.
    pub attempt_index: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration: Duration,
    pub raw_output: String,
    pub status: AttemptStatus,
    pub validations: Vec<ValidationOutcome>,
    pub transport_error: Option<String>,
    pub log_path: PathBuf,
}

impl Attempt {
    /// Starts a fresh attempt whose log will be written to `log_path`.
    pub fn start(attempt_index: u32, log_path: impl Into<PathBuf>) -> Self {
        Self {
            attempt_index,
            started_at: Utc::now(),
            ended_at: None,
            duration: Duration::ZERO,
            raw_output: String::new(),
            status: AttemptStatus::Running,
            validations: Vec::new(),
            transport_error: None,
            log_path: log_path.into(),
        }
    }

    /// Completes the attempt as a transport failure.
    pub fn fail_transport(mut self, error: impl Into<String>, output: impl Into<String>) -> Self {
        self.raw_output = output.into();
        self.transport_error = Some(error.into());
        self.status = AttemptStatus::Failed;
        self.stamp_end();
        self
    }

    /// Completes the attempt from the validation outcomes.
    pub fn complete(mut self, output: impl Into<String>, validations: Vec<ValidationOutcome>) -> Self {
        self.raw_output = output.into();
        self.status = if all_passed(&validations) {
            AttemptStatus::Passed
        } else {
            AttemptStatus::Failed
        };
        self.validations = validations;
        self.stamp_end();
        self
    }

    fn stamp_end(&mut self) {
        let now = Utc::now();
        self.duration = (now - self.started_at).to_std().unwrap_or_default();
        self.ended_at = Some(now);
    }

    pub fn rules_passed(&self) -> usize {
        self.validations.iter().filter(|v| v.passed).count()
    }

    pub fn is_transport_error(&self) -> bool {
        self.transport_error.is_some()
    }

    pub fn score(&self) -> AttemptScore {
        let tier = if self.is_transport_error() {
            ScoreTier::TransportError
        } else if self.status == AttemptStatus::Passed {
            ScoreTier::Passed
        } else {
            ScoreTier::Failed
        };
        let rules_passed = if tier == ScoreTier::TransportError {
            0
        } else {
            self.rules_passed()
        };
        AttemptScore { tier, rules_passed }
    }

    /// Text persisted to the attempt's log artifact.
    pub fn log_text(&self) -> String {
        match &self.transport_error {
            Some(error) if self.raw_output.is_empty() => format!("[transport error] {}\n", error),
            Some(error) => {
                let sep = if self.raw_output.ends_with('\n') { "" } else { "\n" };
                format!("{}{}[transport error] {}\n", self.raw_output, sep, error)
            }
            None => self.raw_output.clone(),
        }
    }
}

/// Keeps the lowest-scoring attempt offered so far; ties keep the earlier one.
#[derive(Debug, Clone)]
pub struct WorstAttempt {
    current: Attempt,
}

impl WorstAttempt {
    pub fn new(first: Attempt) -> Self {
        Self { current: first }
    }

    pub fn offer(&mut self, attempt: Attempt) {
        if attempt.score() < self.current.score() {
            self.current = attempt;
        }
    }

    pub fn into_inner(self) -> Attempt {
        self.current
    }
}

/// The attempt standing for a test pair after all retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentativeResult {
    pub key: PairKey,
    pub attempt: Attempt,
    /// How many attempts actually ran (early stop may cut the budget short).
    pub attempts_run: u32,
}

impl RepresentativeResult {
    pub fn passed(&self) -> bool {
        self.attempt.status == AttemptStatus::Passed
    }
}
