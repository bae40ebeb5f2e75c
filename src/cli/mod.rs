//! Command-line interface

pub mod commands;
pub mod output;

use crate::core::ExecutionStatus;
use crate::execution::EngineError;
use clap::{Parser, Subcommand};
use commands::{ListCommand, PlanCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Process exit status for success and for a skipped run
pub const EXIT_OK: i32 = 0;
/// Process exit status for a failed step or an invalid workflow
pub const EXIT_FAILED: i32 = 1;

/// Runs push-triggered build and publish pipelines
#[derive(Debug, Parser, Clone)]
#[command(name = "pipeline-runner")]
#[command(version)]
#[command(about = "Run a push-triggered CI pipeline locally or on a worker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report step results, not step output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Print the resolved step sequence
    Plan(PlanCommand),

    /// List discovered workflow files
    List(ListCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

/// Exit status for the outcome of `run`
pub fn run_exit_code(result: &Result<ExecutionStatus, EngineError>) -> i32 {
    match result {
        Ok(ExecutionStatus::Completed) | Ok(ExecutionStatus::Skipped) => EXIT_OK,
        _ => EXIT_FAILED,
    }
}
