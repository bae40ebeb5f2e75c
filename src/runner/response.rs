//! Command specs, outputs and runner errors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to start '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A single child process invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute (e.g. `sh`)
    pub program: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Environment added on top of the inherited one
    pub env: HashMap<String, String>,

    /// Working directory
    pub cwd: Option<PathBuf>,

    /// Timeout in seconds
    pub timeout_secs: u64,
}

impl CommandSpec {
    /// Run `script` with `shell`, exiting on the first failing command
    pub fn shell_script(shell: &str, script: &str, timeout_secs: u64) -> Self {
        Self {
            program: shell.to_string(),
            args: vec!["-e".to_string(), "-c".to_string(), script.to_string()],
            env: HashMap::new(),
            cwd: None,
            timeout_secs,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The script body for `shell -e -c <script>` invocations
    pub fn script(&self) -> Option<&str> {
        match self.args.as_slice() {
            [.., flag, script] if flag == "-c" => Some(script.as_str()),
            _ => None,
        }
    }
}

/// Which stream a line of output came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Result of a finished child process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code (`None` when killed by a signal)
    pub exit_code: Option<i32>,

    /// Interleaved stdout and stderr, line by line
    pub output: String,
}

impl CommandOutput {
    /// Create a new command output
    pub fn new(exit_code: Option<i32>, output: String) -> Self {
        Self { exit_code, output }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}
