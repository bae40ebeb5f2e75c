//! CLI command definitions

use crate::core::{find_git_root, EventKind, TriggerEvent};
use anyhow::{Context, Result};
use clap::Args;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Run a pipeline for a trigger event
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file (discovered when omitted)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Branch the push went to (defaults to the checked-out branch)
    #[arg(long, conflicts_with = "git_ref")]
    pub branch: Option<String>,

    /// Fully qualified ref the event points at
    #[arg(long = "ref")]
    pub git_ref: Option<String>,

    /// Commit SHA the event points at
    #[arg(long)]
    pub sha: Option<String>,

    /// Event kind
    #[arg(long, value_enum, default_value_t = EventKindArg::Push)]
    pub event: EventKindArg,

    /// Secret values (key=value); missing ones are read from the environment
    #[arg(long, value_parser = parse_key_value)]
    pub secret: Vec<(String, String)>,

    /// Environment overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Workspace directory steps run in
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// Print the commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the resolved step sequence without running it
#[derive(Debug, Args, Clone)]
pub struct PlanCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List discoverable workflow files
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Directory to search from (defaults to the current directory)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

/// Event kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventKindArg {
    Push,
}

impl From<EventKindArg> for EventKind {
    fn from(arg: EventKindArg) -> Self {
        match arg {
            EventKindArg::Push => EventKind::Push,
        }
    }
}

impl RunCommand {
    /// Workspace directory, defaulting to the current one
    pub fn workspace(&self) -> Result<PathBuf> {
        match &self.workdir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("Failed to read current directory"),
        }
    }

    /// The event this run simulates
    pub fn trigger_event(&self, workspace: &Path) -> Result<TriggerEvent> {
        let mut event = match (&self.branch, &self.git_ref) {
            (Some(branch), _) => TriggerEvent::push(branch),
            (None, Some(git_ref)) => TriggerEvent::push(git_ref),
            (None, None) => {
                let (branch, sha) = current_branch(workspace).context(
                    "No --branch or --ref given and the checked-out branch could not be determined",
                )?;
                let event = TriggerEvent::push(&branch);
                match sha {
                    Some(sha) => event.with_sha(sha),
                    None => event,
                }
            }
        };

        event.kind = self.event.into();
        if let Some(sha) = &self.sha {
            event.sha = Some(sha.clone());
        }
        Ok(event)
    }

    /// Resolve each referenced secret from `--secret`, then the environment
    pub fn resolve_secrets(&self, referenced: &BTreeSet<String>) -> HashMap<String, String> {
        resolve_secrets(&self.secret, referenced, |name| std::env::var(name).ok())
    }
}

/// Explicit values win; referenced names fall back to `lookup`
pub fn resolve_secrets<F>(
    explicit: &[(String, String)],
    referenced: &BTreeSet<String>,
    lookup: F,
) -> HashMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut secrets: HashMap<String, String> = explicit.iter().cloned().collect();
    for name in referenced {
        if !secrets.contains_key(name) {
            if let Some(value) = lookup(name) {
                secrets.insert(name.clone(), value);
            }
        }
    }
    secrets
}

/// Branch and commit checked out in the repository holding `dir`
pub fn current_branch(dir: &Path) -> Option<(String, Option<String>)> {
    let git_dir = find_git_root(dir)?.join(".git");
    let head = std::fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let git_ref = head.trim().strip_prefix("ref: ")?;
    let branch = git_ref.strip_prefix("refs/heads/")?.to_string();

    // Packed refs leave the loose file missing; the sha is optional
    let sha = std::fs::read_to_string(git_dir.join(git_ref))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some((branch, sha))
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
