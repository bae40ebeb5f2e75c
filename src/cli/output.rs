//! CLI output formatting

use crate::{
    core::{ExecutionStatus, Pipeline, StepState},
    execution::ExecutionEvent,
    runner::OutputStream,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a spinner for a running step
pub fn create_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format a duration given in milliseconds
pub fn format_duration(millis: i64) -> String {
    let millis = millis.max(0);
    let secs = millis / 1000;
    if secs < 1 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{}s", secs, (millis % 1000) / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({} steps, {})",
            ROCKET,
            style(pipeline_name).bold(),
            total_steps,
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::PipelineSkipped {
            pipeline_name,
            git_ref,
            ..
        } => format!(
            "{} {} is not triggered by {}",
            SKIP,
            style(pipeline_name).bold(),
            style(git_ref).cyan()
        ),
        ExecutionEvent::StepStarted {
            name,
            position,
            total,
            ..
        } => format!(
            "{} {} {}",
            SPINNER,
            style(format!("[{}/{}]", position, total)).dim(),
            style(name).cyan()
        ),
        ExecutionEvent::StepOutput { line, stream, .. } => match stream {
            OutputStream::Stdout => format!("  {} {}", style("│").dim(), line),
            OutputStream::Stderr => format!("  {} {}", style("│").dim(), style(line).yellow()),
        },
        ExecutionEvent::StepCompleted {
            step_id,
            duration_ms,
        } => format!(
            "{} {} {}",
            CHECK,
            style(step_id).green(),
            style(format_duration(*duration_ms)).dim()
        ),
        ExecutionEvent::StepFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped { step_id, reason } => {
            format!("{} {} ({})", SKIP, style(step_id).dim(), reason)
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => format!(
            "{} Pipeline ({}) {}",
            INFO,
            style(&execution_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[lines.len() - max_lines..].join("\n");
        format!(
            "{}... ({} earlier lines)\n{}",
            style("[truncated]").dim(),
            lines.len() - max_lines,
            truncated
        )
    }
}

/// One line per step for `plan`
pub fn format_plan(pipeline: &Pipeline) -> String {
    let mut out = format!("{} {}\n", INFO, style(&pipeline.name).bold());
    for (index, step) in pipeline.steps().iter().enumerate() {
        out.push_str(&format!(
            "  {}. {} {}\n     {}\n",
            index + 1,
            style(&step.id).cyan(),
            style(format!("({})", step.name)).dim(),
            step.describe()
        ));
    }
    out
}

/// Per-step states after a run
pub fn format_run_summary(pipeline: &Pipeline) -> String {
    let state = &pipeline.state;
    let mut out = format!(
        "{} {} {}/{} steps finished ({:.0}%)\n",
        INFO,
        format_status(state.status),
        state.completed_steps + state.failed_steps + state.skipped_steps,
        state.total_steps,
        state.progress() * 100.0
    );
    for step in pipeline.steps() {
        out.push_str(&format!("  {:<12} {}\n", format_step_state(&step.state), step.id));
    }
    if state.status.is_finished() {
        if let (Some(started), Some(completed)) = (state.started_at, state.completed_at) {
            out.push_str(&format!(
                "  {}\n",
                style(format!(
                    "took {}",
                    format_duration((completed - started).num_milliseconds())
                ))
                .dim()
            ));
        }
    }
    out
}

/// Renders engine events to the terminal with a spinner per running step
pub struct RunReporter {
    show_output: bool,
    spinner: Mutex<Option<ProgressBar>>,
}

impl RunReporter {
    pub fn new(show_output: bool) -> Self {
        Self {
            show_output,
            spinner: Mutex::new(None),
        }
    }

    pub fn handle(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::StepStarted { .. } => {
                self.println(&format_execution_event(event));
                self.set_spinner(Some(create_spinner(format_execution_event(event))));
            }
            ExecutionEvent::StepOutput { .. } => {
                if self.show_output {
                    self.println(&format_execution_event(event));
                }
            }
            ExecutionEvent::StepCompleted { .. } | ExecutionEvent::StepFailed { .. } => {
                self.set_spinner(None);
                self.println(&format_execution_event(event));
            }
            _ => self.println(&format_execution_event(event)),
        }
    }

    fn set_spinner(&self, next: Option<ProgressBar>) {
        if let Ok(mut current) = self.spinner.lock() {
            if let Some(previous) = current.take() {
                previous.finish_and_clear();
            }
            *current = next;
        }
    }

    fn println(&self, line: &str) {
        match self.spinner.lock() {
            Ok(current) => match current.as_ref() {
                Some(spinner) => spinner.println(line),
                None => println!("{}", line),
            },
            Err(_) => println!("{}", line),
        }
    }
}
