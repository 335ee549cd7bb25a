//! agent-matrix: evaluation harness for coding agents.
//!
//! Runs a set of scenarios against every selected (model, runner) pair,
//! retries each pair, keeps the worst attempt and reports the results as a
//! matrix of rows (model, runner) by columns (scenario).

// Core modules
pub mod cli;
pub mod config;
pub mod error;
pub mod matrix;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod suite;
pub mod utils;
pub mod validation;

// Re-export commonly used error types
pub use error::{ArtifactError, ConfigError, ReportError, ScenarioError, SuiteError};
