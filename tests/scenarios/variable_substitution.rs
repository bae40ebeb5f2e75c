//! Test: Variable Substitution - expressions rendered into commands

use crate::helpers::*;
use pipeline_runner::core::config::PipelineConfig;

/// Trigger and env expressions are rendered before the command runs
#[tokio::test]
async fn test_trigger_and_env_expressions() {
    let yaml = r#"
name: "Expressions"
on:
  push:
    branches: [master]
env:
  SITE_DIR: public
steps:
  - name: Announce
    run: echo "building ${{ trigger.branch }} at ${{ trigger.sha }} into ${{ env.SITE_DIR }}"
  - name: Publish
    uses: publish-branch
    with:
      publish_dir: ${{ env.SITE_DIR }}
      commit_message: "Docs for ${{ trigger.sha }}"
"#;

    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![MockResponse::ok(""), MockResponse::ok("")];
    let result = run_pipeline_with_mock(&mut pipeline, push_context("master", &[]), responses).await;

    assert_pipeline_completed(&result);

    let scripts = result.scripts();
    assert_eq!(scripts[0], r#"echo "building master at abc123 into public""#);
    assert!(scripts[1].starts_with("SRC=$(cd public && pwd)\n"));
    assert!(scripts[1].contains("-m 'Docs for abc123'"));
}

/// Workflow env reaches every step; step env wins on conflicts
#[tokio::test]
async fn test_env_layering() {
    let yaml = r#"
name: "Env"
on:
  push:
    branches: [main]
env:
  MODE: release
  LEVEL: info
steps:
  - name: First
    run: make
  - name: Second
    run: make
    env:
      LEVEL: debug
"#;

    let config = PipelineConfig::from_yaml(yaml).unwrap();
    let mut pipeline = config.to_pipeline().unwrap();

    let responses = vec![MockResponse::ok(""), MockResponse::ok("")];
    let result = run_pipeline_with_mock(&mut pipeline, push_context("main", &[]), responses).await;

    assert_pipeline_completed(&result);

    let first = &result.commands[0].env;
    assert_eq!(first.get("MODE"), Some(&"release".to_string()));
    assert_eq!(first.get("LEVEL"), Some(&"info".to_string()));
    assert_eq!(first.get("CI"), Some(&"true".to_string()));
    assert_eq!(first.get("PIPELINE_SHA"), Some(&"abc123".to_string()));

    let second = &result.commands[1].env;
    assert_eq!(second.get("LEVEL"), Some(&"debug".to_string()));
    assert_eq!(second.get("PIPELINE_STEP"), Some(&"second".to_string()));
}
