//! Test: Failure Handling - the first failing step stops the run

use crate::helpers::*;
use pipeline_runner::core::config::PipelineConfig;
use pipeline_runner::execution::ExecutionEvent;

/// A failed docs build means the publish step never runs
#[tokio::test]
async fn test_build_failure_skips_publish() {
    let config = PipelineConfig::from_yaml(DOCS_WORKFLOW).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![
        MockResponse::ok("Checked out abc123\n"),
        MockResponse::ok("Using /usr/bin/python3 (3.11.4)\n"),
        MockResponse::ok("Successfully installed mkdocs\n"),
        MockResponse::exit(1, "ERROR - Config value 'nav': page not found\n"),
        MockResponse::ok("should never be used\n"),
    ];

    let result = run_pipeline_with_mock(
        &mut pipeline,
        push_context("master", &[("PERSONAL_TOKEN", "tok")]),
        responses,
    )
    .await;

    assert_pipeline_failed_at(&result, "build-docs");
    assert_step_failed(&result, "build-docs", "Process exited with code 1");
    assert_step_skipped(&result, "publish");
    assert_execution_order(
        &result,
        &["checkout", "set-up-python", "install-generator", "build-docs"],
    );

    // Only four commands reached the runner
    assert_eq!(result.commands.len(), 4);
    assert!(!result.scripts().iter().any(|s| s.contains("git push")));

    assert_eq!(result.pipeline.state.completed_steps, 3);
    assert_eq!(result.pipeline.state.failed_steps, 1);
    assert_eq!(result.pipeline.state.skipped_steps, 1);
}

/// A failing first step leaves every other step skipped
#[tokio::test]
async fn test_first_step_failure() {
    let config = PipelineConfig::from_yaml(DOCS_WORKFLOW).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![MockResponse::exit(128, "fatal: not a git repository\n")];
    let result = run_pipeline_with_mock(
        &mut pipeline,
        push_context("master", &[("PERSONAL_TOKEN", "tok")]),
        responses,
    )
    .await;

    assert_pipeline_failed_at(&result, "checkout");
    for step in ["set-up-python", "install-generator", "build-docs", "publish"] {
        assert_step_skipped(&result, step);
    }

    let skipped: Vec<String> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StepSkipped { step_id, .. } => Some(step_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec!["set-up-python", "install-generator", "build-docs", "publish"]);
}

/// A runner error counts as a step failure
#[tokio::test]
async fn test_runner_error_fails_step() {
    let yaml = r#"
name: "Runner error"
on:
  push:
    branches: [main]
steps:
  - name: Build
    run: make
  - name: Deploy
    run: make deploy
"#;

    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    // No responses: the mock runner errors on the first command
    let result = run_pipeline_with_mock(&mut pipeline, push_context("main", &[]), vec![]).await;

    assert_pipeline_failed_at(&result, "build");
    assert_step_failed(&result, "build", "No response available");
    assert_step_skipped(&result, "deploy");
}

/// A missing secret fails the step before anything is spawned
#[tokio::test]
async fn test_missing_secret_fails_publish() {
    let config = PipelineConfig::from_yaml(DOCS_WORKFLOW).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![
        MockResponse::ok(""),
        MockResponse::ok(""),
        MockResponse::ok(""),
        MockResponse::ok(""),
    ];
    let result = run_pipeline_with_mock(&mut pipeline, push_context("master", &[]), responses).await;

    assert_pipeline_failed_at(&result, "publish");
    assert_step_failed(&result, "publish", "Secret 'PERSONAL_TOKEN' is not set");
    assert_eq!(result.commands.len(), 4);
}
