//! Core domain models for the pipeline runner
//!
//! This module defines the workflow configuration, the ordered pipeline
//! and its steps, trigger matching and the per-run context.

pub mod config;
pub mod context;
pub mod loader;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod trigger;

pub use context::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
pub use trigger::*;
pub use config::{PipelineConfig, StepConfig};
pub use loader::{find_git_root, load_workflow, WorkflowLoader};
