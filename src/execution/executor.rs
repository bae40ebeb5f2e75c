//! Step executor - runs individual steps with a command runner

use crate::{
    core::{RunContext, Step},
    runner::{CommandRunner, CommandSpec, OutputCallback, OutputStream},
};
use tracing::{debug, error, info};

/// Result of executing a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step exited successfully
    Success { output: String },
    /// Step failed; the run must stop
    Failed { error: String, output: String },
}

/// Forwards output lines with secret values masked
///
/// Works per line: a multi-line secret is only masked in the collected output.
struct RedactingCallback<'a> {
    context: &'a RunContext,
    inner: &'a dyn OutputCallback,
}

impl OutputCallback for RedactingCallback<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        self.inner.on_line(stream, &self.context.redact(line));
    }
}

/// Executes a single step
pub struct StepExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> StepExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Build the child process invocation for a step
    pub fn command_for(&self, step: &Step, context: &RunContext) -> Result<CommandSpec, String> {
        let script = step
            .render_script(context)
            .map_err(|e| format!("Step '{}': {}", step.id, e))?;
        let mut env = step
            .render_env(context)
            .map_err(|e| format!("Step '{}': {}", step.id, e))?;

        env.insert("CI".to_string(), "true".to_string());
        env.insert("PIPELINE_STEP".to_string(), step.id.clone());
        env.insert("PIPELINE_REF".to_string(), context.trigger.git_ref.clone());
        env.insert(
            "PIPELINE_WORKSPACE".to_string(),
            context.workspace.display().to_string(),
        );
        if let Some(sha) = &context.trigger.sha {
            env.insert("PIPELINE_SHA".to_string(), sha.clone());
        }

        let cwd = match &step.working_directory {
            Some(dir) => context.workspace.join(dir),
            None => context.workspace.clone(),
        };

        Ok(CommandSpec::shell_script(&step.shell, &script, step.timeout_secs)
            .with_env(env)
            .with_cwd(cwd))
    }

    /// Execute a step and return the outcome
    pub async fn execute(
        &self,
        step: &Step,
        context: &RunContext,
        callback: Option<&dyn OutputCallback>,
    ) -> StepOutcome {
        info!("Executing step: {}", step.id);

        let spec = match self.command_for(step, context) {
            Ok(spec) => spec,
            Err(error) => {
                error!("{}", error);
                return StepOutcome::Failed {
                    error,
                    output: String::new(),
                };
            }
        };
        debug!("Command for step {}: {} {:?}", step.id, spec.program, spec.cwd);
        debug!("Secrets known to this run: {}", context.secret_names().join(", "));

        let redacting = callback.map(|inner| RedactingCallback { context, inner });
        let result = self
            .runner
            .run(&spec, redacting.as_ref().map(|cb| cb as &dyn OutputCallback))
            .await;

        match result {
            Ok(output) if output.success() => {
                info!("Step {} completed successfully", step.id);
                StepOutcome::Success {
                    output: context.redact(&output.output),
                }
            }
            Ok(output) => {
                let error = match output.exit_code {
                    Some(code) => format!("Process exited with code {}", code),
                    None => "Process was terminated by a signal".to_string(),
                };
                error!("Step {} failed: {}", step.id, error);
                StepOutcome::Failed {
                    error,
                    output: context.redact(&output.output),
                }
            }
            Err(e) => {
                error!("Step {} could not run: {}", step.id, e);
                StepOutcome::Failed {
                    error: context.redact(&e.to_string()),
                    output: String::new(),
                }
            }
        }
    }
}
