//! Test: Trigger Filtering - only configured branches start a run

use crate::helpers::*;
use pipeline_runner::core::config::PipelineConfig;
use pipeline_runner::core::{ExecutionStatus, StepState};
use pipeline_runner::execution::ExecutionEvent;

/// A push to another branch runs nothing
#[tokio::test]
async fn test_push_to_other_branch_is_skipped() {
    let config = PipelineConfig::from_yaml(DOCS_WORKFLOW).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let result =
        run_pipeline_with_mock(&mut pipeline, push_context("feature/typo", &[]), vec![]).await;

    assert_eq!(result.result, Ok(ExecutionStatus::Skipped));
    assert_eq!(result.pipeline.state.status, ExecutionStatus::Skipped);
    assert!(result.commands.is_empty());
    assert!(result
        .pipeline
        .steps()
        .iter()
        .all(|s| matches!(s.state, StepState::Skipped { .. })));

    assert!(matches!(
        result.events.as_slice(),
        [ExecutionEvent::PipelineSkipped { git_ref, .. }] if git_ref == "refs/heads/feature/typo"
    ));
}

/// Glob patterns match release branches but not nested paths
#[tokio::test]
async fn test_branch_glob() {
    let yaml = r#"
name: "Releases"
on:
  push:
    branches: [master, "release/*"]
steps:
  - name: Build
    run: make
"#;

    let config = PipelineConfig::from_yaml(yaml).unwrap();

    let mut pipeline = config.to_pipeline().unwrap();
    let result = run_pipeline_with_mock(
        &mut pipeline,
        push_context("release/1.2", &[]),
        vec![MockResponse::ok("")],
    )
    .await;
    assert_pipeline_completed(&result);

    let mut pipeline = config.to_pipeline().unwrap();
    let result =
        run_pipeline_with_mock(&mut pipeline, push_context("release/1.2/hotfix", &[]), vec![]).await;
    assert_eq!(result.result, Ok(ExecutionStatus::Skipped));
}

/// A tag push is not a branch push
#[tokio::test]
async fn test_tag_ref_is_skipped() {
    let config = PipelineConfig::from_yaml(DOCS_WORKFLOW).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let result =
        run_pipeline_with_mock(&mut pipeline, push_context("refs/tags/master", &[]), vec![]).await;

    assert_eq!(result.result, Ok(ExecutionStatus::Skipped));
    assert!(result.commands.is_empty());
}
