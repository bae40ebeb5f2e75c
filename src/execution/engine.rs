//! Main execution engine - orchestrates the entire pipeline run

use crate::{
    core::{ExecutionStatus, Pipeline, RunContext, StepState, TriggerEvent},
    execution::{StepExecutor, StepOutcome},
    runner::{CommandRunner, OutputCallback, OutputStream},
};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a run did not complete
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Step '{step_id}' failed: {error}")]
    StepFailed { step_id: String, error: String },

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),
}

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    PipelineSkipped {
        execution_id: Uuid,
        pipeline_name: String,
        git_ref: String,
    },
    StepStarted {
        step_id: String,
        name: String,
        position: usize,
        total: usize,
    },
    StepOutput {
        step_id: String,
        stream: OutputStream,
        line: String,
    },
    StepCompleted {
        step_id: String,
        duration_ms: i64,
    },
    StepFailed {
        step_id: String,
        error: String,
    },
    StepSkipped {
        step_id: String,
        reason: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Turns output lines into `StepOutput` events
struct OutputForwarder<'a> {
    step_id: &'a str,
    handlers: &'a [EventHandler],
}

impl OutputCallback for OutputForwarder<'_> {
    fn on_line(&self, stream: OutputStream, line: &str) {
        emit(
            self.handlers,
            ExecutionEvent::StepOutput {
                step_id: self.step_id.to_string(),
                stream,
                line: line.to_string(),
            },
        );
    }
}

fn emit(handlers: &[EventHandler], event: ExecutionEvent) {
    for handler in handlers {
        handler(event.clone());
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    executor: StepExecutor<R>,
    event_handlers: RwLock<Vec<EventHandler>>,
}

impl<R: CommandRunner> ExecutionEngine<R> {
    pub fn new(runner: R) -> Self {
        Self {
            executor: StepExecutor::new(runner),
            event_handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn executor(&self) -> &StepExecutor<R> {
        &self.executor
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        match self.event_handlers.write() {
            Ok(mut handlers) => handlers.push(Arc::new(handler)),
            Err(_) => warn!("Event handler registry poisoned, handler dropped"),
        }
    }

    /// Handlers registered so far; the lock is not held while a run emits
    fn handlers(&self) -> Vec<EventHandler> {
        self.event_handlers
            .read()
            .map(|handlers| handlers.clone())
            .unwrap_or_default()
    }

    /// Run the pipeline for one trigger event
    ///
    /// Steps run strictly in declared order. The first failing step stops the
    /// run: it is marked failed, every later step is marked skipped, and
    /// `EngineError::StepFailed` is returned. An event that does not match the
    /// pipeline's trigger skips the whole run and returns `Ok(Skipped)`.
    pub async fn execute(
        &self,
        pipeline: &mut Pipeline,
        event: &TriggerEvent,
        context: RunContext,
    ) -> Result<ExecutionStatus, EngineError> {
        let handlers = self.handlers();
        let execution_id = pipeline.state.execution_id;
        let total = pipeline.steps().len();

        if !pipeline.trigger.matches(event) {
            info!(
                "Event {} {} does not match pipeline '{}', skipping",
                event.kind, event.git_ref, pipeline.name
            );
            pipeline.skip_pending(&format!("{} does not trigger this pipeline", event.git_ref));
            pipeline.state.skip(total);
            emit(
                &handlers,
                ExecutionEvent::PipelineSkipped {
                    execution_id,
                    pipeline_name: pipeline.name.clone(),
                    git_ref: event.git_ref.clone(),
                },
            );
            return Ok(ExecutionStatus::Skipped);
        }

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        pipeline.state.start(total);
        emit(
            &handlers,
            ExecutionEvent::PipelineStarted {
                execution_id,
                pipeline_name: pipeline.name.clone(),
                total_steps: total,
            },
        );

        let context = match Self::prepare_context(pipeline, event, context) {
            Ok(context) => context,
            Err(e) => {
                error!("{}", e);
                self.abort(pipeline, &handlers, "pipeline environment could not be rendered");
                return Err(e);
            }
        };

        let mut position = 0;
        while let Some(step) = pipeline.next_pending().cloned() {
            position += 1;
            let started_at = chrono::Utc::now();
            if let Some(s) = pipeline.step_mut(&step.id) {
                s.state = StepState::Running { started_at };
            }
            emit(
                &handlers,
                ExecutionEvent::StepStarted {
                    step_id: step.id.clone(),
                    name: step.name.clone(),
                    position,
                    total,
                },
            );

            let forwarder = OutputForwarder {
                step_id: &step.id,
                handlers: &handlers,
            };
            let outcome = self.executor.execute(&step, &context, Some(&forwarder)).await;
            let finished_at = chrono::Utc::now();

            match outcome {
                StepOutcome::Success { output } => {
                    if let Some(s) = pipeline.step_mut(&step.id) {
                        s.state = StepState::Completed {
                            output,
                            started_at,
                            completed_at: finished_at,
                        };
                    }
                    pipeline.refresh_counts();
                    emit(
                        &handlers,
                        ExecutionEvent::StepCompleted {
                            step_id: step.id.clone(),
                            duration_ms: (finished_at - started_at).num_milliseconds(),
                        },
                    );
                }
                StepOutcome::Failed { error, output } => {
                    if let Some(s) = pipeline.step_mut(&step.id) {
                        s.state = StepState::Failed {
                            error: error.clone(),
                            output,
                            started_at,
                            failed_at: finished_at,
                        };
                    }
                    emit(
                        &handlers,
                        ExecutionEvent::StepFailed {
                            step_id: step.id.clone(),
                            error: error.clone(),
                        },
                    );
                    self.abort(pipeline, &handlers, &format!("step '{}' failed", step.id));
                    return Err(EngineError::StepFailed {
                        step_id: step.id,
                        error,
                    });
                }
            }
        }

        pipeline.refresh_counts();
        pipeline.state.complete();
        info!("Pipeline execution finished: {} - Completed", pipeline.name);
        emit(
            &handlers,
            ExecutionEvent::PipelineCompleted {
                execution_id,
                status: ExecutionStatus::Completed,
            },
        );

        Ok(ExecutionStatus::Completed)
    }

    /// Workflow env rendered first; values already in the context win
    fn prepare_context(
        pipeline: &Pipeline,
        event: &TriggerEvent,
        mut context: RunContext,
    ) -> Result<RunContext, EngineError> {
        context.trigger = event.clone();

        let mut env = context
            .render_map(&pipeline.env)
            .map_err(|e| EngineError::InvalidPipeline(e.to_string()))?;
        env.extend(context.env.drain());
        context.env = env;

        Ok(context)
    }

    /// Skip every step that has not run and mark the run failed
    fn abort(&self, pipeline: &mut Pipeline, handlers: &[EventHandler], reason: &str) {
        for step_id in pipeline.skip_pending(reason) {
            warn!("Skipping step {}: {}", step_id, reason);
            emit(
                handlers,
                ExecutionEvent::StepSkipped {
                    step_id,
                    reason: reason.to_string(),
                },
            );
        }

        pipeline.refresh_counts();
        pipeline.state.fail();
        info!("Pipeline execution finished: {} - Failed", pipeline.name);
        emit(
            handlers,
            ExecutionEvent::PipelineCompleted {
                execution_id: pipeline.state.execution_id,
                status: ExecutionStatus::Failed,
            },
        );
    }
}
