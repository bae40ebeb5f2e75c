//! pipeline-runner - a sequential CI pipeline runner for push-triggered builds

pub mod cli;
pub mod core;
pub mod execution;
pub mod runner;

// Re-export commonly used types
pub use core::{ExecutionStatus, Pipeline, PipelineConfig, RunContext, Step, StepState, TriggerEvent};
pub use execution::{EngineError, ExecutionEngine, ExecutionEvent, StepOutcome};
pub use runner::{CommandRunner, CommandSpec, DryRunRunner, ShellRunner};
