//! Workflow configuration from YAML

use crate::core::{
    context::parse_expressions,
    trigger::TriggerConfig,
    Pipeline,
};
use crate::runner::actions::BuiltinAction;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Default step timeout (one hour)
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Default shell for `run` steps
pub const DEFAULT_SHELL: &str = "sh";

/// Top-level workflow configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Workflow name
    pub name: String,

    /// Events that start a run
    #[serde(rename = "on", default)]
    pub trigger: TriggerConfig,

    /// Environment visible to every step
    #[serde(default)]
    env: HashMap<String, Value>,

    /// Steps, run in declared order
    pub steps: Vec<StepConfig>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Default shell for `run` steps
    #[serde(default)]
    pub shell: Option<String>,
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step identifier (derived from the name when absent)
    #[serde(default)]
    pub id: Option<String>,

    /// Human-readable step name
    pub name: String,

    /// Shell command to run
    #[serde(default)]
    pub run: Option<String>,

    /// Action reference, e.g. `actions/checkout@v2`
    #[serde(default)]
    pub uses: Option<String>,

    /// Action inputs
    #[serde(default)]
    with: HashMap<String, Value>,

    /// Step environment (may reference secrets)
    #[serde(default)]
    env: HashMap<String, Value>,

    /// Shell override for this step
    #[serde(default)]
    pub shell: Option<String>,

    /// Directory relative to the workspace
    #[serde(default)]
    pub working_directory: Option<String>,

    /// Timeout for this step (overrides the workflow default)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Render a scalar YAML value as the string a child process would see
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        // Fallback: serialize compound values
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn string_map(values: &HashMap<String, Value>) -> HashMap<String, String> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect()
}

/// Lowercase, dash-separated identifier from a step name
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

impl StepConfig {
    /// Resolved step ID
    pub fn resolved_id(&self, index: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => {
                let slug = slugify(&self.name);
                if slug.is_empty() {
                    format!("step-{}", index + 1)
                } else {
                    slug
                }
            }
        }
    }

    /// Action inputs as strings
    pub fn inputs(&self) -> HashMap<String, String> {
        string_map(&self.with)
    }

    /// Step environment as strings
    pub fn env(&self) -> HashMap<String, String> {
        string_map(&self.env)
    }
}

impl PipelineConfig {
    /// Load workflow configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid workflow {}", path.display()))
    }

    /// Parse workflow configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the workflow configuration
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            anyhow::bail!("Workflow '{}' has no steps", self.name);
        }

        let branches = self
            .trigger
            .push
            .as_ref()
            .map(|p| p.branches.len())
            .unwrap_or(0);
        if branches == 0 {
            anyhow::bail!("Workflow '{}' has no push branches to trigger on", self.name);
        }
        self.trigger
            .branch_patterns()
            .context("Invalid branch pattern in trigger")?;

        for (key, value) in self.env() {
            parse_expressions(&value)
                .with_context(|| format!("Workflow env '{}' has an invalid expression", key))?;
        }

        let mut seen_ids = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            let id = step.resolved_id(index);
            if !seen_ids.insert(id.clone()) {
                anyhow::bail!("Duplicate step ID: {}", id);
            }

            match (&step.run, &step.uses) {
                (Some(_), Some(_)) => {
                    anyhow::bail!("Step '{}' has both 'run' and 'uses'", id)
                }
                (None, None) => anyhow::bail!("Step '{}' needs either 'run' or 'uses'", id),
                (Some(run), None) => {
                    if run.trim().is_empty() {
                        anyhow::bail!("Step '{}' has an empty 'run' command", id);
                    }
                    if !step.with.is_empty() {
                        anyhow::bail!("Step '{}' has 'with' inputs but no 'uses' action", id);
                    }
                    parse_expressions(run)
                        .with_context(|| format!("Step '{}' command has an invalid expression", id))?;
                }
                (None, Some(uses)) => {
                    let action = BuiltinAction::resolve(uses)
                        .with_context(|| format!("Step '{}' uses an unknown action", id))?;
                    let inputs = step.inputs();
                    for required in action.required_inputs() {
                        if !inputs.contains_key(*required) {
                            anyhow::bail!(
                                "Step '{}' action '{}' is missing required input '{}'",
                                id,
                                action.name(),
                                required
                            );
                        }
                    }
                    for (key, value) in &inputs {
                        if !action.accepts_input(key) {
                            anyhow::bail!(
                                "Step '{}' action '{}' has no input named '{}'",
                                id,
                                action.name(),
                                key
                            );
                        }
                        parse_expressions(value).with_context(|| {
                            format!("Step '{}' input '{}' has an invalid expression", id, key)
                        })?;
                    }
                }
            }

            for (key, value) in step.env() {
                parse_expressions(&value).with_context(|| {
                    format!("Step '{}' env '{}' has an invalid expression", id, key)
                })?;
            }
        }

        Ok(())
    }

    /// Workflow environment as strings
    pub fn env(&self) -> HashMap<String, String> {
        string_map(&self.env)
    }

    /// Convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline> {
        Pipeline::from_config(self)
    }
}
