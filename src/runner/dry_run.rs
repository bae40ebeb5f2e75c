//! Dry-run runner - reports commands instead of executing them

use crate::runner::quote::quote_args;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, OutputCallback, OutputStream, RunnerError};
use async_trait::async_trait;
use std::sync::Mutex;

/// Runner that records every command and pretends it succeeded
#[derive(Debug, Default)]
pub struct DryRunRunner {
    recorded: Mutex<Vec<CommandSpec>>,
}

impl DryRunRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands seen so far, in order
    pub fn recorded(&self) -> Vec<CommandSpec> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        let mut output = String::new();
        let body = match spec.script() {
            Some(script) => script.to_string(),
            None => {
                let mut argv = vec![spec.program.as_str()];
                argv.extend(spec.args.iter().map(String::as_str));
                quote_args(&argv)
            }
        };

        for line in body.lines() {
            let line = format!("[dry-run] {}", line);
            if let Some(cb) = callback {
                cb.on_line(OutputStream::Stdout, &line);
            }
            output.push_str(&line);
            output.push('\n');
        }

        self.recorded
            .lock()
            .map_err(|_| RunnerError::Internal("dry-run recorder poisoned".to_string()))?
            .push(spec.clone());

        Ok(CommandOutput::new(Some(0), output))
    }
}
