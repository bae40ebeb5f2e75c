//! Workflow file discovery

use crate::core::config::PipelineConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File names searched in each directory, in priority order
pub const WORKFLOW_FILES: &[&str] = &[
    "pipeline.yml",
    "pipeline.yaml",
    ".pipeline.yml",
    ".pipeline.yaml",
];

/// Finds and loads a workflow file when none is given explicitly
#[derive(Debug, Clone)]
pub struct WorkflowLoader {
    start_dir: PathBuf,
    config_dir: Option<PathBuf>,
}

impl WorkflowLoader {
    /// Search starting at `start_dir`
    pub fn new(start_dir: impl Into<PathBuf>) -> Self {
        Self {
            start_dir: start_dir.into(),
            config_dir: dirs::config_dir().map(|d| d.join("pipeline-runner")),
        }
    }

    /// Override the user config directory
    pub fn with_config_dir(mut self, config_dir: Option<PathBuf>) -> Self {
        self.config_dir = config_dir;
        self
    }

    /// Directories to search, most specific first
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.start_dir.clone()];

        if let Some(root) = find_git_root(&self.start_dir) {
            if !dirs.contains(&root) {
                dirs.push(root);
            }
        }

        if let Some(config_dir) = &self.config_dir {
            if !dirs.contains(config_dir) {
                dirs.push(config_dir.clone());
            }
        }

        dirs
    }

    /// Every existing workflow file, in search order
    pub fn candidates(&self) -> Vec<PathBuf> {
        self.search_dirs()
            .iter()
            .flat_map(|dir| WORKFLOW_FILES.iter().map(move |name| dir.join(name)))
            .filter(|path| path.is_file())
            .collect()
    }

    /// Load the first workflow that parses and validates
    pub fn load(&self) -> Result<(PathBuf, PipelineConfig)> {
        let candidates = self.candidates();

        for path in &candidates {
            debug!("Trying workflow file {}", path.display());
            match PipelineConfig::from_file(path) {
                Ok(config) => return Ok((path.clone(), config)),
                Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
            }
        }

        anyhow::bail!(
            "No usable workflow file found (searched {} for {})",
            self.search_dirs()
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            WORKFLOW_FILES.join(", ")
        )
    }
}

/// Load an explicit file, or discover one from the current directory
pub fn load_workflow(file: Option<&Path>) -> Result<(PathBuf, PipelineConfig)> {
    match file {
        Some(path) => {
            let config = PipelineConfig::from_file(path)?;
            Ok((path.to_path_buf(), config))
        }
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            WorkflowLoader::new(cwd).load()
        }
    }
}

/// Walk up from `start` to the directory holding `.git`
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}
