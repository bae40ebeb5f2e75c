//! Pipeline domain model

use crate::core::{
    config::{PipelineConfig, DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS},
    context::{parse_expressions, Expression},
    state::{ExecutionStatus, PipelineState, StepState},
    step::{Step, StepDefaults},
    trigger::TriggerConfig,
};
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};

/// A pipeline definition: a fixed, ordered list of steps
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Events that start a run
    pub trigger: TriggerConfig,

    /// Environment visible to every step
    pub env: HashMap<String, String>,

    /// Steps in declared order
    steps: Vec<Step>,

    /// Execution state
    pub state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let defaults = StepDefaults {
            timeout_secs: config.default_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            shell: config
                .shell
                .clone()
                .unwrap_or_else(|| DEFAULT_SHELL.to_string()),
        };

        let steps = config
            .steps
            .iter()
            .enumerate()
            .map(|(index, step_config)| Step::from_config(step_config, index, &defaults))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(&config.name, config.trigger.clone(), steps).with_env(config.env()))
    }

    /// Create a pipeline from already-built steps
    pub fn new(name: &str, trigger: TriggerConfig, steps: Vec<Step>) -> Self {
        Pipeline {
            name: name.to_string(),
            trigger,
            env: HashMap::new(),
            steps,
            state: PipelineState::new(),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Steps in declared order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Get a mutable step by ID
    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Step IDs in execution order
    pub fn execution_order(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.id.clone()).collect()
    }

    /// The first step that has not run yet
    pub fn next_pending(&self) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| matches!(s.state, StepState::Pending))
    }

    /// Step IDs that actually ran, in order
    pub fn executed_steps(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.state.has_run())
            .map(|s| s.id.clone())
            .collect()
    }

    /// Mark every step that has not run as skipped
    pub fn skip_pending(&mut self, reason: &str) -> Vec<String> {
        let mut skipped = Vec::new();
        for step in self.steps.iter_mut() {
            if matches!(step.state, StepState::Pending) {
                step.state = StepState::Skipped {
                    reason: reason.to_string(),
                };
                skipped.push(step.id.clone());
            }
        }
        skipped
    }

    /// Check if every step reached a terminal state
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.state.is_terminal())
    }

    /// Check if pipeline has failed
    pub fn has_failed(&self) -> bool {
        self.state.status == ExecutionStatus::Failed
    }

    /// Recount completed/failed/skipped steps into the pipeline state
    pub fn refresh_counts(&mut self) {
        let mut completed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for step in &self.steps {
            match &step.state {
                StepState::Completed { .. } => completed += 1,
                StepState::Failed { .. } => failed += 1,
                StepState::Skipped { .. } => skipped += 1,
                _ => {}
            }
        }

        self.state.update_counts(completed, failed, skipped);
    }

    /// Names of every secret the pipeline references
    pub fn referenced_secrets(&self) -> BTreeSet<String> {
        let mut secrets: BTreeSet<String> = self
            .env
            .values()
            .filter_map(|v| parse_expressions(v).ok())
            .flatten()
            .filter_map(|e| match e {
                Expression::Secret(name) => Some(name),
                _ => None,
            })
            .collect();

        for step in &self.steps {
            secrets.extend(step.referenced_secrets());
        }

        secrets
    }
}
