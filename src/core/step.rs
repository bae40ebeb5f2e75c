//! Step domain model

use crate::core::{
    config::{StepConfig, DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS},
    context::{parse_expressions, Expression, ExpressionError, RunContext},
    state::StepState,
};
use crate::runner::actions::BuiltinAction;
use anyhow::Result;
use std::collections::{BTreeSet, HashMap};

/// What a step does
#[derive(Debug, Clone)]
pub enum StepKind {
    /// A shell command
    Run { command: String },
    /// A built-in action with its inputs
    Action {
        reference: String,
        action: BuiltinAction,
        inputs: HashMap<String, String>,
    },
}

/// A single step in a pipeline
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    pub kind: StepKind,

    /// Step environment bindings (unrendered)
    pub env: HashMap<String, String>,

    /// Shell used to run the step script
    pub shell: String,

    /// Directory relative to the workspace
    pub working_directory: Option<String>,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Runtime state
    pub state: StepState,
}

/// Workflow-wide defaults applied to each step
#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
    pub shell: String,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            shell: DEFAULT_SHELL.to_string(),
        }
    }
}

impl Step {
    /// Create a step from a step config
    pub fn from_config(config: &StepConfig, index: usize, defaults: &StepDefaults) -> Result<Self> {
        let kind = match (&config.run, &config.uses) {
            (Some(command), None) => StepKind::Run {
                command: command.clone(),
            },
            (None, Some(reference)) => StepKind::Action {
                reference: reference.clone(),
                action: BuiltinAction::resolve(reference)?,
                inputs: config.inputs(),
            },
            _ => anyhow::bail!("Step '{}' needs exactly one of 'run' or 'uses'", config.name),
        };

        Ok(Step {
            id: config.resolved_id(index),
            name: config.name.clone(),
            kind,
            env: config.env(),
            shell: config.shell.clone().unwrap_or_else(|| defaults.shell.clone()),
            working_directory: config.working_directory.clone(),
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            state: StepState::Pending,
        })
    }

    /// A shell step, mostly useful in tests
    pub fn run(id: &str, command: &str) -> Self {
        let defaults = StepDefaults::default();
        Step {
            id: id.to_string(),
            name: id.to_string(),
            kind: StepKind::Run {
                command: command.to_string(),
            },
            env: HashMap::new(),
            shell: defaults.shell,
            working_directory: None,
            timeout_secs: defaults.timeout_secs,
            state: StepState::Pending,
        }
    }

    /// Build the script for this step with every expression rendered
    pub fn render_script(&self, context: &RunContext) -> Result<String, ExpressionError> {
        match &self.kind {
            StepKind::Run { command } => context.render(command),
            StepKind::Action { action, inputs, .. } => {
                let rendered = context.render_map(inputs)?;
                Ok(action.script(&rendered, context))
            }
        }
    }

    /// Environment for the child process
    ///
    /// `context.env` is taken as already rendered; only the step's own env is
    /// rendered here.
    pub fn render_env(&self, context: &RunContext) -> Result<HashMap<String, String>, ExpressionError> {
        let mut env = context.env.clone();
        env.extend(context.render_map(&self.env)?);
        Ok(env)
    }

    /// Names of secrets referenced anywhere in this step
    pub fn referenced_secrets(&self) -> BTreeSet<String> {
        let mut texts: Vec<&String> = self.env.values().collect();
        match &self.kind {
            StepKind::Run { command } => texts.push(command),
            StepKind::Action { inputs, .. } => texts.extend(inputs.values()),
        }

        texts
            .into_iter()
            .filter_map(|t| parse_expressions(t).ok())
            .flatten()
            .filter_map(|e| match e {
                Expression::Secret(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// One-line description for plans and listings
    pub fn describe(&self) -> String {
        match &self.kind {
            StepKind::Run { command } => {
                let first = command.lines().next().unwrap_or_default();
                if command.lines().count() > 1 {
                    format!("run: {} ...", first)
                } else {
                    format!("run: {}", first)
                }
            }
            StepKind::Action {
                reference, inputs, ..
            } => {
                if inputs.is_empty() {
                    format!("uses: {}", reference)
                } else {
                    let mut keys: Vec<&String> = inputs.keys().collect();
                    keys.sort();
                    let with = keys
                        .iter()
                        .map(|k| format!("{}={}", k, inputs[*k]))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("uses: {} ({})", reference, with)
                }
            }
        }
    }
}
