//! Subprocess runner - executes command specs as child processes

use crate::runner::{CommandOutput, CommandSpec, OutputCallback, OutputStream, RunnerError};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs commands as local child processes
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    /// Start children with an empty environment plus the command's env
    clear_env: bool,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not inherit the parent environment (PATH is still passed through)
    pub fn with_clear_env(mut self, clear_env: bool) -> Self {
        self.clear_env = clear_env;
        self
    }

    /// Execute a command spec, streaming lines to `callback`
    ///
    /// # Errors
    /// Returns `RunnerError` if:
    /// - The program cannot be spawned
    /// - The command does not finish within `timeout_secs` (its process group is killed)
    /// - Reading the output pipes fails
    ///
    /// Output that is not valid UTF-8 is decoded lossily.
    ///
    /// A non-zero exit status is not an error; check `CommandOutput::success`.
    pub async fn execute(
        &self,
        spec: &CommandSpec,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning {} {:?}", spec.program, spec.args.first());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Children of the script share its group, so a timeout can reach them
        #[cfg(unix)]
        command.process_group(0);

        if self.clear_env {
            command.env_clear();
            if let Ok(path) = std::env::var("PATH") {
                command.env("PATH", path);
            }
        }
        command.envs(&spec.env);

        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| RunnerError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id();

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::Internal("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::Internal("stderr was not captured".to_string()))?;

        // The child moves into the future so dropping it kills the shell
        let run = async move {
            let mut out_lines = BufReader::new(stdout).split(b'\n');
            let mut err_lines = BufReader::new(stderr).split(b'\n');
            let mut output = String::new();
            let (mut out_done, mut err_done) = (false, false);

            while !(out_done && err_done) {
                let (stream, line) = tokio::select! {
                    line = out_lines.next_segment(), if !out_done => (OutputStream::Stdout, line?),
                    line = err_lines.next_segment(), if !err_done => (OutputStream::Stderr, line?),
                };

                match line {
                    Some(bytes) => {
                        let line = decode_line(bytes);
                        if let Some(cb) = callback {
                            cb.on_line(stream, &line);
                        }
                        output.push_str(&line);
                        output.push('\n');
                    }
                    None => match stream {
                        OutputStream::Stdout => out_done = true,
                        OutputStream::Stderr => err_done = true,
                    },
                }
            }

            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, output))
        };

        tokio::pin!(run);
        let (status, output) = match timeout(Duration::from_secs(spec.timeout_secs), &mut run).await {
            Ok(result) => result
                .map_err(|e| RunnerError::Internal(format!("Failed to read process output: {}", e)))?,
            Err(_) => {
                warn!("{} timed out after {}s", spec.program, spec.timeout_secs);
                kill_process_group(pid);
                return Err(RunnerError::Timeout(spec.timeout_secs));
            }
        };

        if !status.success() {
            warn!("{} exited with {}", spec.program, status);
        }
        debug!("{} returned {} bytes of output", spec.program, output.len());

        Ok(CommandOutput::new(status.code(), output))
    }
}

/// One output line without its terminator, invalid UTF-8 replaced
fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// SIGKILL every process in the step's group
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

// kill_on_drop still stops the direct child
#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
