//! Trigger conditions and trigger events

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const HEADS_PREFIX: &str = "refs/heads/";

/// Trigger section of a workflow (`on:` in YAML)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Push trigger
    #[serde(default)]
    pub push: Option<PushTrigger>,
}

/// Push trigger: which branches start a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushTrigger {
    /// Branch names or `*` / `**` globs
    #[serde(default)]
    pub branches: Vec<String>,
}

/// Kind of external event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Push,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
        }
    }
}

/// An event that may start a pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub kind: EventKind,

    /// Fully qualified ref, e.g. `refs/heads/master`
    pub git_ref: String,

    /// Commit the event points at, if known
    #[serde(default)]
    pub sha: Option<String>,
}

impl TriggerEvent {
    /// A push to the given branch (short name or full ref)
    pub fn push(branch: &str) -> Self {
        Self {
            kind: EventKind::Push,
            git_ref: qualify_ref(branch),
            sha: None,
        }
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    /// Short branch name, if the ref points at a branch
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix(HEADS_PREFIX)
    }
}

fn qualify_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("{}{}", HEADS_PREFIX, branch)
    }
}

/// Compiled branch filter
#[derive(Debug, Clone)]
pub enum BranchPattern {
    /// Exact branch name
    Exact(String),
    /// Glob compiled to a regex
    Glob(Regex),
}

impl BranchPattern {
    /// Compile a branch filter from its configured form
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = pattern.strip_prefix(HEADS_PREFIX).unwrap_or(pattern);
        if !pattern.contains('*') {
            return Ok(BranchPattern::Exact(pattern.to_string()));
        }

        let mut source = String::from("^");
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '*' {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    source.push_str(".*");
                } else {
                    source.push_str("[^/]*");
                }
            } else {
                source.push_str(&regex::escape(&c.to_string()));
            }
        }
        source.push('$');

        Ok(BranchPattern::Glob(Regex::new(&source)?))
    }

    pub fn matches(&self, branch: &str) -> bool {
        match self {
            BranchPattern::Exact(name) => name == branch,
            BranchPattern::Glob(regex) => regex.is_match(branch),
        }
    }
}

impl TriggerConfig {
    /// Push trigger on the given branches
    pub fn on_push<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            push: Some(PushTrigger {
                branches: branches.into_iter().map(Into::into).collect(),
            }),
        }
    }

    /// Compile the configured branch filters
    pub fn branch_patterns(&self) -> Result<Vec<BranchPattern>, regex::Error> {
        self.push
            .as_ref()
            .map(|p| p.branches.iter().map(|b| BranchPattern::parse(b)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    /// Check whether an event should start a run
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        match event.kind {
            EventKind::Push => {
                let Some(branch) = event.branch() else {
                    return false;
                };
                match self.branch_patterns() {
                    Ok(patterns) => patterns.iter().any(|p| p.matches(branch)),
                    Err(_) => false,
                }
            }
        }
    }
}
