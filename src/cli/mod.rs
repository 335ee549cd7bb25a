//! Command-line interface for agent-matrix.
//!
//! Provides commands for running a suite and previewing its test pairs.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
