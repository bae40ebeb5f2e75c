//! Run context - environment, secrets and expression rendering

use crate::core::trigger::TriggerEvent;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// Replacement for secret values in reported output
pub const REDACTED: &str = "***";

/// Errors raised while rendering `${{ ... }}` expressions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Malformed expression '{0}': expected '<scope>.<name>'")]
    Malformed(String),

    #[error("Unknown expression scope '{0}' (expected secrets, env or trigger)")]
    UnknownScope(String),

    #[error("Unknown trigger field '{0}'")]
    UnknownTriggerField(String),

    #[error("Secret '{0}' is not set")]
    MissingSecret(String),
}

/// A parsed `${{ scope.name }}` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Secret(String),
    Env(String),
    Trigger(TriggerField),
}

/// Trigger fields usable in expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerField {
    Event,
    Ref,
    Branch,
    Sha,
}

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{\{\s*([^}]*?)\s*\}\}").expect("expression regex is valid")
    })
}

impl Expression {
    /// Parse the inside of a `${{ ... }}` placeholder
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let (scope, name) = source
            .split_once('.')
            .filter(|(scope, name)| !scope.is_empty() && !name.is_empty())
            .ok_or_else(|| ExpressionError::Malformed(source.to_string()))?;

        match scope {
            "secrets" => Ok(Expression::Secret(name.to_string())),
            "env" => Ok(Expression::Env(name.to_string())),
            "trigger" => {
                let field = match name {
                    "event" => TriggerField::Event,
                    "ref" => TriggerField::Ref,
                    "branch" => TriggerField::Branch,
                    "sha" => TriggerField::Sha,
                    other => return Err(ExpressionError::UnknownTriggerField(other.to_string())),
                };
                Ok(Expression::Trigger(field))
            }
            other => Err(ExpressionError::UnknownScope(other.to_string())),
        }
    }
}

/// Collect every expression in a text, failing on the first bad one
pub fn parse_expressions(text: &str) -> Result<Vec<Expression>, ExpressionError> {
    expression_regex()
        .captures_iter(text)
        .map(|caps| Expression::parse(&caps[1]))
        .collect()
}

/// Context shared by every step of a single run
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    /// Workspace the steps run in
    pub workspace: PathBuf,

    /// Workflow-level environment plus CLI overrides
    pub env: HashMap<String, String>,

    /// The event that started the run
    pub trigger: TriggerEvent,

    /// Secret values, never serialized
    #[serde(skip)]
    secrets: HashMap<String, String>,
}

impl RunContext {
    pub fn new(workspace: impl Into<PathBuf>, trigger: TriggerEvent) -> Self {
        Self {
            workspace: workspace.into(),
            env: HashMap::new(),
            trigger,
            secrets: HashMap::new(),
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }

    pub fn with_secrets(mut self, secrets: HashMap<String, String>) -> Self {
        self.secrets.extend(secrets);
        self
    }

    /// Look up a secret by name
    pub fn secret(&self, name: &str) -> Option<String> {
        self.secrets.get(name).cloned()
    }

    /// Names of all secrets this context can resolve
    pub fn secret_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.secrets.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    fn trigger_field(&self, field: TriggerField) -> String {
        match field {
            TriggerField::Event => self.trigger.kind.to_string(),
            TriggerField::Ref => self.trigger.git_ref.clone(),
            TriggerField::Branch => self.trigger.branch().unwrap_or_default().to_string(),
            TriggerField::Sha => self.trigger.sha.clone().unwrap_or_default(),
        }
    }

    fn evaluate(&self, expression: &Expression) -> Result<String, ExpressionError> {
        match expression {
            Expression::Secret(name) => self
                .secret(name)
                .ok_or_else(|| ExpressionError::MissingSecret(name.clone())),
            Expression::Env(name) => Ok(self.env.get(name).cloned().unwrap_or_default()),
            Expression::Trigger(field) => Ok(self.trigger_field(*field)),
        }
    }

    /// Replace every `${{ ... }}` in `text`
    pub fn render(&self, text: &str) -> Result<String, ExpressionError> {
        let mut rendered = String::with_capacity(text.len());
        let mut last = 0;

        for caps in expression_regex().captures_iter(text) {
            let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((last, last));
            let expression = Expression::parse(&caps[1])?;
            rendered.push_str(&text[last..whole.0]);
            rendered.push_str(&self.evaluate(&expression)?);
            last = whole.1;
        }
        rendered.push_str(&text[last..]);

        Ok(rendered)
    }

    /// Render every value of a map
    pub fn render_map(
        &self,
        values: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, ExpressionError> {
        values
            .iter()
            .map(|(k, v)| Ok((k.clone(), self.render(v)?)))
            .collect()
    }

    /// Mask every known secret value in `text`
    ///
    /// Only whole occurrences are masked. Live output is redacted one line at
    /// a time, so a secret spanning several lines is masked in the collected
    /// step output but not in the streamed lines.
    pub fn redact(&self, text: &str) -> String {
        let mut values: Vec<&String> = self.secrets.values().filter(|v| !v.is_empty()).collect();
        // Longest first so a secret containing another is masked whole
        values.sort_by_key(|v| std::cmp::Reverse(v.len()));

        values
            .into_iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}
