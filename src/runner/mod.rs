//! Execution engine.
//!
//! Runs one test pair at a time against its runner backend and reduces the
//! attempts to a single representative result.
//!
//! # Architecture
//!
//! ```text
//! TestPair → Workspace (setup files) → Backend projection (config root)
//!          → Backend process (prompt file) → Rule engine → Attempt log
//! ```
//!
//! Each attempt:
//! 1. Recreates the workspace from the scenario's setup files
//! 2. Projects model and runner settings into the backend's config files
//! 3. Runs the backend with a timeout, capturing stdout and stderr
//! 4. Validates the workspace and writes the attempt log
//!
//! A failed attempt ends the retry loop. The lowest scoring attempt is kept.
//!
//! # Example
//!
//! ```ignore
//! use agent_matrix::runner::{ExecutionConfig, Executor};
//!
//! let config = ExecutionConfig::new(".workdir", "results/logs").with_attempts(3);
//! let mut executor = Executor::new(config);
//! let result = executor.execute(&pair).await?;
//! println!("{}: {}", result.key, result.attempt.status);
//! ```

pub mod backends;
pub mod config;
pub mod config_root;
pub mod executor;
pub mod process;
pub mod result;
pub mod workspace;

pub use backends::{create_backend, CommandLine, Projection, ProjectionError, RunnerBackend};
pub use config::{ExecutionConfig, DEFAULT_ATTEMPTS, DEFAULT_TIMEOUT};
pub use config_root::{ConfigLease, ConfigRoot};
pub use executor::Executor;
pub use process::{ProcessOutput, TransportError};
pub use result::{
    Attempt, AttemptScore, AttemptStatus, RepresentativeResult, ScoreTier, WorstAttempt,
};
pub use workspace::Workspace;
