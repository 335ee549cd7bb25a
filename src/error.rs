//! Error types for agent-matrix operations.
//!
//! Defines error types for the subsystems that can fail loudly:
//! - Config document loading and normalization
//! - Scenario document loading
//! - Log artifact persistence
//! - Report persistence
//!
//! Backend invocation failures and rule evaluation failures are not errors in
//! this sense: they become recorded attempt outcomes (see `runner` and
//! `validation`).

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the config document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config mixes 'agent-config' with 'models'/'runners'; use one shape")]
    MixedShapes,

    #[error("Config defines no models")]
    NoModels,

    #[error("Config defines no runners")]
    NoRunners,

    #[error("Duplicate model name '{0}'")]
    DuplicateModel(String),

    #[error("Duplicate runner name '{0}'")]
    DuplicateRunner(String),

    #[error("Runner '{0}' of type generic requires a 'binary' path")]
    MissingBinary(String),
}

/// Errors that can occur while loading scenario documents.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario directory '{0}' does not exist")]
    MissingDirectory(PathBuf),

    #[error("Failed to walk scenario directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to read scenario '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Duplicate scenario name '{name}' in '{path}'")]
    DuplicateName { name: String, path: PathBuf },

    #[error("Scenario '{name}' has an invalid setup path '{path}'")]
    InvalidSetupPath { name: String, path: String },
}

/// Errors writing per-attempt log artifacts. Always fatal to the run.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to create log directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write log artifact '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors writing or rendering the report. Always fatal to the run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("No such pair in the result matrix: {0}")]
    UnknownPair(String),

    #[error("Result already recorded for pair: {0}")]
    AlreadyRecorded(String),

    #[error("Failed to render report: {0}")]
    Render(#[from] tera::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write report '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a suite run.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Report(#[from] ReportError),
}
