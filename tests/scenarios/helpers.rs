//! Test utility functions for pipeline-runner

use async_trait::async_trait;
use pipeline_runner::core::{ExecutionStatus, Pipeline, RunContext, StepState, TriggerEvent};
use pipeline_runner::execution::{EngineError, ExecutionEngine, ExecutionEvent};
use pipeline_runner::runner::{
    CommandOutput, CommandRunner, CommandSpec, OutputCallback, OutputStream, RunnerError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Workflow shaped like a typical docs site deployment
pub const DOCS_WORKFLOW: &str = r#"
name: "Publish docs"
on:
  push:
    branches: [master]
env:
  SITE_DIR: site
steps:
  - name: Checkout
    uses: actions/checkout@v2
  - name: Set up Python
    uses: actions/setup-python@v1
    with:
      python-version: "3.x"
  - name: Install generator
    run: python -m pip install mkdocs mkdocs-material
  - name: Build docs
    run: mkdocs build --site-dir "$SITE_DIR"
  - name: Publish
    uses: peaceiris/actions-gh-pages@v3
    with:
      publish_dir: ./site
      publish_branch: gh-pages
    env:
      PUBLISH_TOKEN: ${{ secrets.PERSONAL_TOKEN }}
"#;

/// What the mock runner answers for one command
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl MockResponse {
    pub fn ok(output: &str) -> Self {
        Self {
            exit_code: Some(0),
            output: output.to_string(),
        }
    }

    pub fn exit(code: i32, output: &str) -> Self {
        Self {
            exit_code: Some(code),
            output: output.to_string(),
        }
    }
}

/// Mock runner that returns predefined responses in order
pub struct MockRunner {
    responses: Arc<Vec<MockResponse>>,
    index: Arc<AtomicUsize>,
    recorded: Arc<Mutex<Vec<CommandSpec>>>,
}

impl MockRunner {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(responses),
            index: Arc::new(AtomicUsize::new(0)),
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of the commands the runner received
    pub fn recorder(&self) -> Arc<Mutex<Vec<CommandSpec>>> {
        self.recorded.clone()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        callback: Option<&dyn OutputCallback>,
    ) -> Result<CommandOutput, RunnerError> {
        self.recorded.lock().unwrap().push(spec.clone());

        let idx = self.index.fetch_add(1, Ordering::SeqCst);
        let response = self.responses.get(idx).ok_or_else(|| {
            RunnerError::Internal(format!(
                "MockRunner: No response available for command {}",
                idx + 1
            ))
        })?;

        if let Some(cb) = callback {
            for line in response.output.lines() {
                cb.on_line(OutputStream::Stdout, line);
            }
        }

        Ok(CommandOutput::new(response.exit_code, response.output.clone()))
    }
}

/// Test result from running a pipeline
#[derive(Debug, Clone)]
pub struct PipelineTestResult {
    pub pipeline: Pipeline,
    pub result: Result<ExecutionStatus, EngineError>,
    pub commands: Vec<CommandSpec>,
    pub events: Vec<ExecutionEvent>,
}

impl PipelineTestResult {
    /// Scripts the runner received, in order
    pub fn scripts(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| c.script().map(str::to_string))
            .collect()
    }

    /// Every streamed output line, in order
    pub fn output_lines(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ExecutionEvent::StepOutput { line, .. } => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn step_state(&self, step_id: &str) -> &StepState {
        &self
            .pipeline
            .step(step_id)
            .unwrap_or_else(|| panic!("Step '{}' not found in result", step_id))
            .state
    }
}

/// Context for a push to `branch` with the given secrets
pub fn push_context(branch: &str, secrets: &[(&str, &str)]) -> RunContext {
    let mut context = RunContext::new("/tmp/workspace", TriggerEvent::push(branch).with_sha("abc123"));
    for (name, value) in secrets {
        context = context.with_secret(*name, *value);
    }
    context
}

/// Run a pipeline with a mock runner that returns predefined responses
pub async fn run_pipeline_with_mock(
    pipeline: &mut Pipeline,
    context: RunContext,
    responses: Vec<MockResponse>,
) -> PipelineTestResult {
    let runner = MockRunner::new(responses);
    let recorder = runner.recorder();
    let engine = ExecutionEngine::new(runner);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let event = context.trigger.clone();
    let result = engine.execute(pipeline, &event, context).await;

    let commands = recorder.lock().unwrap().clone();
    let events = events.lock().unwrap().clone();
    PipelineTestResult {
        pipeline: pipeline.clone(),
        result,
        commands,
        events,
    }
}

/// Assert the run completed successfully
pub fn assert_pipeline_completed(result: &PipelineTestResult) {
    assert_eq!(
        result.result,
        Ok(ExecutionStatus::Completed),
        "pipeline should have completed"
    );
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Completed);
}

/// Assert the run failed at `step_id`
pub fn assert_pipeline_failed_at(result: &PipelineTestResult, step_id: &str) {
    match &result.result {
        Err(EngineError::StepFailed { step_id: failed, .. }) => assert_eq!(failed, step_id),
        other => panic!("pipeline should have failed at '{}', got {:?}", step_id, other),
    }
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Failed);
}

/// Assert a step completed and its output contains `expected_output`
pub fn assert_step_executed(result: &PipelineTestResult, step_id: &str, expected_output: &str) {
    match result.step_state(step_id) {
        StepState::Completed { output, .. } => assert!(
            output.contains(expected_output),
            "Step '{}' output:\n{}\n\ndoes not contain:\n{}",
            step_id,
            output,
            expected_output
        ),
        other => panic!("Step '{}' should be completed, but was in state: {:?}", step_id, other),
    }
}

/// Assert a step failed with an error containing `expected_error`
pub fn assert_step_failed(result: &PipelineTestResult, step_id: &str, expected_error: &str) {
    match result.step_state(step_id) {
        StepState::Failed { error, .. } => assert!(
            error.contains(expected_error),
            "Step '{}' error '{}' does not contain '{}'",
            step_id,
            error,
            expected_error
        ),
        other => panic!("Step '{}' should have failed, but was in state: {:?}", step_id, other),
    }
}

/// Assert a step never ran
pub fn assert_step_skipped(result: &PipelineTestResult, step_id: &str) {
    assert!(
        matches!(result.step_state(step_id), StepState::Skipped { .. }),
        "Step '{}' should be skipped, but was in state: {:?}",
        step_id,
        result.step_state(step_id)
    );
}

/// Assert which steps ran, in order
pub fn assert_execution_order(result: &PipelineTestResult, expected: &[&str]) {
    assert_eq!(result.pipeline.executed_steps(), expected);
}
