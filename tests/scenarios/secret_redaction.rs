//! Test: Secret Redaction - secret values never reach reported output

use crate::helpers::*;
use pipeline_runner::core::config::PipelineConfig;
use pipeline_runner::core::StepState;

const LEAKY: &str = r#"
name: "Leaky"
on:
  push:
    branches: [main]
steps:
  - name: Deploy
    run: ./deploy --token "$DEPLOY_TOKEN"
    env:
      DEPLOY_TOKEN: ${{ secrets.DEPLOY_TOKEN }}
  - name: Verify
    run: ./verify
"#;

/// Output that echoes a secret is masked in step state and events
#[tokio::test]
async fn test_secret_masked_in_output() {
    let config = PipelineConfig::from_yaml(LEAKY).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![
        MockResponse::ok("using token hunter2-xyz\ndeployed\n"),
        MockResponse::ok("ok\n"),
    ];
    let result = run_pipeline_with_mock(
        &mut pipeline,
        push_context("main", &[("DEPLOY_TOKEN", "hunter2-xyz")]),
        responses,
    )
    .await;

    assert_pipeline_completed(&result);
    assert_step_executed(&result, "deploy", "using token ***");
    assert_eq!(
        result.output_lines(),
        vec!["using token ***", "deployed", "ok"]
    );

    // The child process itself still receives the real value
    assert_eq!(
        result.commands[0].env.get("DEPLOY_TOKEN"),
        Some(&"hunter2-xyz".to_string())
    );
}

/// Failure output is masked too
#[tokio::test]
async fn test_secret_masked_in_failure_output() {
    let config = PipelineConfig::from_yaml(LEAKY).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![MockResponse::exit(
        22,
        "curl: (22) 401 for https://hunter2-xyz@example.com\n",
    )];
    let result = run_pipeline_with_mock(
        &mut pipeline,
        push_context("main", &[("DEPLOY_TOKEN", "hunter2-xyz")]),
        responses,
    )
    .await;

    assert_pipeline_failed_at(&result, "deploy");
    match result.step_state("deploy") {
        StepState::Failed { output, .. } => {
            assert!(output.contains("https://***@example.com"));
            assert!(!output.contains("hunter2-xyz"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert!(result
        .output_lines()
        .iter()
        .all(|line| !line.contains("hunter2-xyz")));
}
