//! Test: Success Chain - every step runs in declared order

use crate::helpers::*;
use pipeline_runner::core::config::PipelineConfig;
use pipeline_runner::execution::ExecutionEvent;

/// The docs workflow runs all five steps in order and publishes
#[tokio::test]
async fn test_docs_workflow_runs_in_order() {
    let config = PipelineConfig::from_yaml(DOCS_WORKFLOW).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![
        MockResponse::ok("Checked out abc123\n"),
        MockResponse::ok("Using /usr/bin/python3 (3.11.4)\n"),
        MockResponse::ok("Successfully installed mkdocs\n"),
        MockResponse::ok("INFO - Documentation built in 0.42 seconds\n"),
        MockResponse::ok("Published 12 files to gh-pages\n"),
    ];

    let result = run_pipeline_with_mock(
        &mut pipeline,
        push_context("master", &[("PERSONAL_TOKEN", "tok")]),
        responses,
    )
    .await;

    assert_pipeline_completed(&result);
    assert_execution_order(
        &result,
        &["checkout", "set-up-python", "install-generator", "build-docs", "publish"],
    );
    assert_step_executed(&result, "build-docs", "Documentation built");
    assert_step_executed(&result, "publish", "Published 12 files");

    let scripts = result.scripts();
    assert_eq!(scripts.len(), 5);
    assert!(scripts[0].contains("git fetch"));
    assert!(scripts[1].contains("3|3.*)"));
    assert_eq!(scripts[2], "python -m pip install mkdocs mkdocs-material");
    assert!(scripts[4].contains("HEAD:refs/heads/gh-pages"));
    assert_eq!(result.pipeline.state.completed_steps, 5);
}

/// Steps run strictly one after another
#[tokio::test]
async fn test_events_follow_step_order() {
    let yaml = r#"
name: "Three steps"
on:
  push:
    branches: [main]
steps:
  - name: One
    run: echo one
  - name: Two
    run: echo two
  - name: Three
    run: echo three
"#;

    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![
        MockResponse::ok("one\n"),
        MockResponse::ok("two\n"),
        MockResponse::ok("three\n"),
    ];
    let result = run_pipeline_with_mock(&mut pipeline, push_context("main", &[]), responses).await;

    assert_pipeline_completed(&result);

    let lifecycle: Vec<String> = result
        .events
        .iter()
        .filter_map(|e| match e {
            ExecutionEvent::StepStarted { step_id, position, .. } => {
                Some(format!("start {} #{}", step_id, position))
            }
            ExecutionEvent::StepCompleted { step_id, .. } => Some(format!("done {}", step_id)),
            _ => None,
        })
        .collect();
    assert_eq!(
        lifecycle,
        vec!["start one #1", "done one", "start two #2", "done two", "start three #3", "done three"]
    );
    assert_eq!(result.output_lines(), vec!["one", "two", "three"]);
}

/// Each step runs with the workspace as its working directory unless overridden
#[tokio::test]
async fn test_working_directory_is_relative_to_workspace() {
    let yaml = r#"
name: "Dirs"
on:
  push:
    branches: [main]
steps:
  - name: Root
    run: ls
  - name: Docs
    run: ls
    working_directory: docs
"#;

    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();
    let responses = vec![MockResponse::ok(""), MockResponse::ok("")];

    let result = run_pipeline_with_mock(&mut pipeline, push_context("main", &[]), responses).await;

    assert_pipeline_completed(&result);
    assert_eq!(
        result.commands[0].cwd.as_deref(),
        Some(std::path::Path::new("/tmp/workspace"))
    );
    assert_eq!(
        result.commands[1].cwd.as_deref(),
        Some(std::path::Path::new("/tmp/workspace/docs"))
    );
}
