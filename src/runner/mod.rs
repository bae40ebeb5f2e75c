//! Command runners for pipeline steps

pub mod actions;
pub mod dry_run;
pub mod quote;
pub mod response;
pub mod shell;
pub mod streaming;

use async_trait::async_trait;
pub use actions::{ActionError, BuiltinAction};
pub use dry_run::DryRunRunner;
pub use response::{CommandOutput, CommandSpec, OutputStream, RunnerError};
pub use shell::ShellRunner;
pub use streaming::{CollectingCallback, OutputCallback};

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run one command to completion, streaming output lines to `callback`
    async fn run(
        &self,
        spec: &CommandSpec,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError>;
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        self.execute(spec, callback).await
    }
}
